use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heatmap_core::ZoomLevel;
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "heatmap")]
#[command(about = "Heatmap - point-density pyramids rendered as map tiles")]
#[command(version)]
#[command(long_about = "
Heatmap aggregates geographic points into a tile pyramid and renders smoothed,
seamless heatmap overlay tiles in the Web Mercator scheme.

Examples:
  heatmap demo --out demo.hmpy --seed 42
  heatmap build --input points.csv --out points.hmpy
  heatmap render --pyramid points.hmpy --zoom 5 --out-dir tiles/
  heatmap info --pyramid points.hmpy
  heatmap config --example > heatmap.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a pyramid from random point clusters
    Demo {
        /// Output pyramid file (.json or binary)
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// Number of clusters
        #[arg(long, default_value = "6")]
        clusters: usize,

        /// Points per cluster
        #[arg(long, default_value = "31")]
        points: usize,

        /// Random seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build a pyramid from a CSV of latitude,longitude pairs
    Build {
        /// Input CSV file
        #[arg(short, long, required = true)]
        input: PathBuf,

        /// Output pyramid file (.json or binary)
        #[arg(short, long, required = true)]
        out: PathBuf,
    },

    /// Render pyramids into {z}/{x}/{y}.png tiles
    Render {
        /// Pyramid files to overlay (repeatable)
        #[arg(long = "pyramid", required = true)]
        pyramids: Vec<PathBuf>,

        /// Map zoom level to render
        #[arg(short, long)]
        zoom: ZoomLevel,

        /// Tile column (requires --y); renders the tiles covering the data if omitted
        #[arg(long)]
        x: Option<u32>,

        /// Tile row (requires --x)
        #[arg(long)]
        y: Option<u32>,

        /// Output directory
        #[arg(long, default_value = "tiles")]
        out_dir: PathBuf,
    },

    /// Show counts, depth and extent of a pyramid
    Info {
        /// Pyramid file
        #[arg(long, required = true)]
        pyramid: PathBuf,

        /// Zoom at which to compute the bounding box (defaults to the leaf zoom)
        #[arg(short, long)]
        zoom: Option<ZoomLevel>,
    },

    /// Configuration helpers
    Config {
        /// Print an example heatmap.toml
        #[arg(long)]
        example: bool,
    },
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Command line overrides the configured thread count
    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
    }

    match cli.command {
        Commands::Demo {
            out,
            clusters,
            points,
            seed,
        } => {
            commands::demo::execute(&config, out, clusters, points, seed)?;
        }

        Commands::Build { input, out } => {
            commands::build::execute(&config, input, out, cli.quiet)?;
        }

        Commands::Render {
            pyramids,
            zoom,
            x,
            y,
            out_dir,
        } => {
            commands::render::execute(&config, pyramids, zoom, x, y, out_dir)?;
        }

        Commands::Info { pyramid, zoom } => {
            commands::info::execute(pyramid, zoom)?;
        }

        Commands::Config { example } => {
            if !example {
                return Err(CliError::validation("nothing to do, pass --example").into());
            }
            print!("{}", Config::example_toml()?);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose, cli.quiet)?;

    if let Err(err) = run(cli) {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            print_error_and_exit(cli_err);
        }
        return Err(err);
    }

    Ok(())
}
