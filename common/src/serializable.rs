use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// JSON persistence for sketch descriptors, random contexts and matrices.
pub trait Serializable: Sized {
    /// Writes `self` as pretty-printed JSON, creating parent directories.
    fn serialize_to_file(&self, path: &Path) -> std::io::Result<()>;

    fn deserialize_from_file(path: &Path) -> std::io::Result<Self>;
}

impl<T> Serializable for T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn serialize_to_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    fn deserialize_from_file(path: &Path) -> std::io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
