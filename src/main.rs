use std::any::Any;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use eyre::{Result, WrapErr};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

use common::constants::{COLUMNWISE_TAG, DEFAULT_SEED, ROWWISE_TAG};
use common::serializable::Serializable;
use sketch_core::random::RandomContext;
use sketch_core::sketch::{Dimension, HashTransformDescriptor, CWT};
use sketch_core::sparse::{CompressedRowMatrix, CoordinateEntry, SparseMatrix};

/// Sketch sparse matrices with hashing transforms.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sketch a small counting matrix on both sides and print every stage
    Demo {
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Sketch a matrix stored as JSON coordinates
    Sketch(SketchArgs),
    /// Sketch a random matrix under a tracing span
    Profile(ProfileArgs),
}

#[derive(Args, Debug)]
struct SketchArgs {
    /// Input matrix (`{"nrows", "ncols", "entries": [{"row", "col", "value"}]}`)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the sketched matrix, in the same format as the input
    #[arg(short, long)]
    output: PathBuf,

    /// Target dimension of the sketch
    #[arg(short = 's', long, required_unless_present = "reuse")]
    sketch_size: Option<usize>,

    /// Which dimension of the input to reduce
    #[arg(short, long, value_enum, default_value_t = Dimension::Columnwise)]
    dim: Dimension,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Save the descriptor of the generated sketch here
    #[arg(long)]
    descriptor: Option<PathBuf>,

    /// Regenerate the sketch from a saved descriptor instead of drawing a new one
    #[arg(long, conflicts_with_all = ["sketch_size", "descriptor"])]
    reuse: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ProfileArgs {
    /// Output formats
    #[arg(short, long, value_enum)]
    format: Option<Vec<Format>>,

    #[arg(long, default_value_t = 1 << 16)]
    rows: usize,

    #[arg(long, default_value_t = 64)]
    cols: usize,

    /// Probability that an entry is stored
    #[arg(long, default_value_t = 0.05)]
    density: f64,

    #[arg(short = 's', long, default_value_t = 1024)]
    sketch_size: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

#[derive(Debug, Clone, ValueEnum, PartialEq)]
enum Format {
    Default,
    Chrome,
}

/// On-disk form of a matrix handed to or produced by `sketch`.
#[derive(Debug, Serialize, Deserialize)]
struct MatrixFile {
    nrows: usize,
    ncols: usize,
    entries: Vec<CoordinateEntry<f64>>,
}

impl MatrixFile {
    fn into_matrix(self) -> Result<SparseMatrix<f64>> {
        Ok(SparseMatrix::from_entries(self.nrows, self.ncols, self.entries)?)
    }
}

impl From<&SparseMatrix<f64>> for MatrixFile {
    fn from(matrix: &SparseMatrix<f64>) -> Self {
        Self {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            entries: matrix.entries().collect(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { seed } => {
            let _guards = init_tracing(&[]);
            demo(seed)
        }
        Commands::Sketch(args) => {
            let _guards = init_tracing(&[]);
            sketch_file(args)
        }
        Commands::Profile(args) => {
            let _guards = init_tracing(args.format.as_deref().unwrap_or_default());
            profile(args)
        }
    }
}

/// Installs the log layer plus any profiling layers in `formats`. The
/// returned guards flush the profiling output when dropped.
fn init_tracing(formats: &[Format]) -> Vec<Box<dyn Any>> {
    let mut layers = Vec::new();

    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(log_filter)
        .boxed();
    layers.push(log_layer);

    let mut guards: Vec<Box<dyn Any>> = vec![];

    if formats.contains(&Format::Default) {
        let collector_layer = tracing_subscriber::fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed();
        layers.push(collector_layer);
    }
    if formats.contains(&Format::Chrome) {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().include_args(true).build();
        layers.push(chrome_layer.boxed());
        guards.push(Box::new(guard));
        tracing::info!("Running tracing-chrome. Files will be saved as trace-<some timestamp>.json and can be viewed in https://ui.perfetto.dev/");
    }

    tracing_subscriber::registry().with(layers).init();
    guards
}

fn demo(seed: u64) -> Result<()> {
    let (nrows, ncols) = (10, 6);
    let entries = (0..nrows * ncols)
        .map(|i| CoordinateEntry::new(i / ncols, i % ncols, i as f64))
        .collect::<Vec<_>>();
    let a = SparseMatrix::from_entries(nrows, ncols, entries.clone())?;
    println!("A = {a}");

    let mut context = RandomContext::new(seed);

    let left = CWT::<f64>::new(nrows, 6, &mut context)?;
    let mut sa = SparseMatrix::zeros(6, ncols);
    left.apply_dim(&a, &mut sa, COLUMNWISE_TAG)
        .wrap_err("columnwise sketch failed")?;
    println!("S * A = {sa}");

    let right = CWT::<f64>::new(ncols, 3, &mut context)?;
    let mut sat = SparseMatrix::zeros(6, 3);
    right
        .apply_dim(&sa, &mut sat, ROWWISE_TAG)
        .wrap_err("rowwise sketch failed")?;
    println!("S * A * T^T = {sat}");

    let mut local = CompressedRowMatrix::new();
    local.ingest(entries, nrows)?;
    let mut local_sketch = CompressedRowMatrix::new();
    left.apply(&a, &mut local_sketch, Dimension::Columnwise)?;
    println!(
        "local A: {} rows, {} stored, updated = {}",
        local.num_rows(),
        local.nnz(),
        local.needs_update()
    );
    println!("local S * A row pointers: {:?}", local_sketch.row_ptr());

    tracing::info!(
        left = ?left.descriptor(),
        right = ?right.descriptor(),
        "demo complete"
    );
    Ok(())
}

fn sketch_file(args: SketchArgs) -> Result<()> {
    let input = MatrixFile::deserialize_from_file(&args.input)
        .wrap_err_with(|| format!("failed to read matrix from {}", args.input.display()))?;
    let a = input.into_matrix().wrap_err("input matrix is invalid")?;
    tracing::info!(rows = a.nrows(), cols = a.ncols(), nnz = a.nnz(), "loaded matrix");

    let source_dimension = match args.dim {
        Dimension::Columnwise => a.nrows(),
        Dimension::Rowwise => a.ncols(),
    };
    let sketch = match (&args.reuse, args.sketch_size) {
        (Some(path), _) => {
            let descriptor = HashTransformDescriptor::deserialize_from_file(path)
                .wrap_err_with(|| format!("failed to read descriptor from {}", path.display()))?;
            CWT::<f64>::from_descriptor(&descriptor)?
        }
        (None, Some(s)) => {
            CWT::<f64>::new(source_dimension, s, &mut RandomContext::new(args.seed))?
        }
        (None, None) => eyre::bail!("either --sketch-size or --reuse is required"),
    };

    let sketched = sketch
        .sketch(&a, args.dim)
        .wrap_err_with(|| format!("failed to apply {:?}", sketch.descriptor()))?;
    MatrixFile::from(&sketched)
        .serialize_to_file(&args.output)
        .wrap_err_with(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        rows = sketched.nrows(),
        cols = sketched.ncols(),
        nnz = sketched.nnz(),
        output = %args.output.display(),
        "wrote sketch"
    );

    if let Some(path) = &args.descriptor {
        sketch
            .descriptor()
            .serialize_to_file(path)
            .wrap_err_with(|| format!("failed to write descriptor to {}", path.display()))?;
    }
    Ok(())
}

fn profile(args: ProfileArgs) -> Result<()> {
    let span = tracing::info_span!("profile", rows = args.rows, cols = args.cols);
    let _enter = span.enter();
    eyre::ensure!(
        (0.0..=1.0).contains(&args.density),
        "density must lie in [0, 1], got {}",
        args.density
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut entries = Vec::new();
    for row in 0..args.rows {
        for col in 0..args.cols {
            if rng.gen_bool(args.density) {
                entries.push(CoordinateEntry::new(row, col, rng.gen_range(-1.0..1.0)));
            }
        }
    }
    let a = SparseMatrix::from_entries(args.rows, args.cols, entries)?;
    tracing::info!(nnz = a.nnz(), "generated input");

    let mut context = RandomContext::new(args.seed);
    let sketch = CWT::<f64>::new(args.rows, args.sketch_size, &mut context)?;
    let sketched = sketch.sketch(&a, Dimension::Columnwise)?;
    tracing::info!(
        rows = sketched.nrows(),
        nnz = sketched.nnz(),
        "Bench Complete"
    );
    Ok(())
}
