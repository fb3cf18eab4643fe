mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mosaic", about = "Assemble Kepler/K2 pixel stamps into full-detector mosaics")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stamps of one campaign and channel, or print their archive URLs
    List(commands::list::ListArgs),
    /// Show stamp or mosaic raster metadata
    Info(commands::info::InfoArgs),
    /// Composite stamps into one FITS raster per time step
    Mosaic(commands::mosaic::MosaicArgs),
    /// Turn mosaic rasters into an animation
    Movie(commands::movie::MovieArgs),
    /// Print a default configuration as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::List(args) => commands::list::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Mosaic(args) => commands::mosaic::run(args),
        Commands::Movie(args) => commands::movie::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
