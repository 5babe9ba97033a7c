use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relief_cache::{
    HeadlessGpu, InlineLoader, Mercator, PlateCarree, Projection, TileCache, TileCacheConfig,
    TileCacheStats,
};
use relief_pyramid::dataset::{self, LevelFile};
use relief_pyramid::{LatLonBox, SampleOrder, SampleType};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "relief")]
#[command(about = "Relief terrain tile tools")]
pub struct Cli {
    /// Log cache activity at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a level pyramid from one level file.
    Build {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = dataset::DEFAULT_MAX_DIM)]
        max_dim: usize,
    },
    /// Print machine-readable level descriptions of a dataset.
    Inspect {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Stream a fixed view through the tile cache and report every frame.
    Simulate(SimulateArgs),
    /// Print CLI version.
    Version,
}

#[derive(Debug, clap::Args)]
struct SimulateArgs {
    #[arg(value_name = "DIR")]
    dir: PathBuf,
    #[arg(long, allow_negative_numbers = true)]
    north: f64,
    #[arg(long, allow_negative_numbers = true)]
    south: f64,
    #[arg(long, allow_negative_numbers = true)]
    west: f64,
    #[arg(long, allow_negative_numbers = true)]
    east: f64,
    /// Level to draw, 0 being the finest.
    #[arg(long, conflicts_with = "pixel_size", required_unless_present = "pixel_size")]
    level: Option<usize>,
    /// Pick the level from the size of one screen pixel in degrees.
    #[arg(long)]
    pixel_size: Option<f64>,
    #[arg(long, default_value_t = 8)]
    frames: u64,
    /// Read tiles on the IO thread instead of inline.
    #[arg(long)]
    threaded: bool,
    /// Pause between frames, mostly useful with --threaded.
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
    /// Configuration preset; defaults to the RELIEF_* environment.
    #[arg(long, allow_negative_numbers = true, conflicts_with = "config")]
    perf_level: Option<i32>,
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Place tiles in Mercator instead of plate carree coordinates.
    #[arg(long)]
    mercator: bool,
}

#[derive(Debug, Serialize)]
struct LevelOutput {
    path: String,
    rows: usize,
    cols: usize,
    cell_size_deg: f64,
    sample_type: &'static str,
    byte_order: &'static str,
    bounds: BoundsOutput,
}

#[derive(Debug, Serialize)]
struct BoundsOutput {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

#[derive(Debug, Serialize)]
struct FrameOutput {
    frame: u64,
    level: usize,
    drawn: Vec<String>,
    stats: TileCacheStats,
}

#[derive(Debug, Serialize)]
struct DisposeOutput {
    disposed: bool,
    live_textures: usize,
    live_host_buffers: usize,
    stats: TileCacheStats,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build { input, out_dir, max_dim } => run_build(&input, &out_dir, max_dim),
        Commands::Inspect { dir } => run_inspect(&dir),
        Commands::Simulate(args) => run_simulate(&args),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // Already initialized when run more than once in a process
    let _ = builder.try_init();
}

fn run_build(input: &Path, out_dir: &Path, max_dim: usize) -> Result<()> {
    if max_dim == 0 {
        anyhow::bail!("--max-dim must be >= 1");
    }
    ensure_file_exists(input)?;

    let level = dataset::read_level_file(input).context("failed to read level file")?;
    let samples = level.read_samples().context("failed to read samples")?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let files = dataset::build_pyramid(out_dir, &level.descriptor, &samples, max_dim)
        .context("failed to write pyramid")?;

    print_levels(&files)
}

fn run_inspect(dir: &Path) -> Result<()> {
    let files = dataset::open_dataset(dir).context("failed to open dataset")?;
    print_levels(&files)
}

fn print_levels(files: &[LevelFile]) -> Result<()> {
    let payload: Vec<LevelOutput> = files.iter().map(level_output).collect();
    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn level_output(file: &LevelFile) -> LevelOutput {
    let d = &file.descriptor;
    let bounds = d.bounds();
    LevelOutput {
        path: file.path.display().to_string(),
        rows: d.num_rows,
        cols: d.num_cols,
        cell_size_deg: d.cell_size_deg,
        sample_type: match d.sample_type {
            SampleType::I16 => "i16",
            SampleType::F32 => "f32",
        },
        byte_order: match d.sample_order {
            SampleOrder::LittleEndian => "little",
            SampleOrder::BigEndian => "big",
        },
        bounds: BoundsOutput {
            north: bounds.north_deg,
            south: bounds.south_deg,
            east: bounds.east_deg,
            west: bounds.west_deg,
        },
    }
}

fn simulate_config(args: &SimulateArgs) -> Result<TileCacheConfig> {
    let config = match (&args.config, args.perf_level) {
        (Some(path), _) => TileCacheConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(level)) => TileCacheConfig::for_perf_level(level),
        (None, None) => {
            TileCacheConfig::from_env().context("invalid RELIEF_* environment")?
        }
    };
    config.validate().context("invalid cache configuration")?;
    Ok(config)
}

fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let view = LatLonBox::new(args.north, args.south, args.east, args.west);
    if view.is_empty() {
        anyhow::bail!("view is empty: north must exceed south and east must exceed west");
    }
    let config = simulate_config(args)?;

    let pyramid = dataset::open_pyramid(
        &args.dir,
        config.max_rows_per_band,
        config.max_cols_per_tile,
    )
    .context("failed to open dataset")?;
    let pyramid = Arc::new(pyramid);

    let projection: Box<dyn Projection> = if args.mercator {
        Box::new(Mercator::new())
    } else {
        Box::new(PlateCarree)
    };
    let mut cache = if args.threaded {
        TileCache::new(pyramid.clone(), config, projection)?
    } else {
        let loader =
            InlineLoader::new(pyramid.clone(), config.border_cells, config.loader_queue_capacity);
        TileCache::with_loader(pyramid.clone(), config, projection, Box::new(loader))?
    };

    let mut gpu = HeadlessGpu::new();
    for frame in 0..args.frames {
        let (level, drawn) = match (args.level, args.pixel_size) {
            (Some(level), _) => (level, cache.update(&mut gpu, frame, &view, level)),
            (None, Some(pixel_size)) => (
                pyramid.level_for_pixel_size(pixel_size),
                cache.update_for_pixel_size(&mut gpu, frame, &view, pixel_size),
            ),
            (None, None) => anyhow::bail!("either --level or --pixel-size is required"),
        };
        let drawn = drawn.into_iter().map(|tile| tile.key().to_string()).collect();
        let line = FrameOutput {
            frame,
            level,
            drawn,
            stats: cache.stats(),
        };
        println!("{}", serde_json::to_string(&line)?);

        if args.interval_ms > 0 {
            thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    cache.dispose(&mut gpu);
    let summary = DisposeOutput {
        disposed: cache.is_disposed(),
        live_textures: gpu.live_textures(),
        live_host_buffers: pyramid.live_host_buffers(),
        stats: cache.stats(),
    };
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
