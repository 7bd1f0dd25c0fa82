use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub mod constants;
pub mod serializable;

/// Sketch families that can be named in a serialized descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum SketchType {
    /// Clarkson-Woodruff transform: one `+-1` per column at a uniform row.
    #[strum(serialize = "CWT")]
    #[serde(rename = "CWT")]
    Cwt,
}
