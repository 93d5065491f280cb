mod commands;
mod summary;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyplot", about = "FITS image rendering tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show FITS file structure, WCS and pixel statistics
    Info(commands::info::InfoArgs),
    /// Stretch one or more FITS files to PNG
    Render(commands::render::RenderArgs),
    /// Combine red, green and blue FITS files into a color PNG
    Rgb(commands::rgb::RgbArgs),
    /// Print the default engine config as TOML
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

    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Render(args) => commands::render::run(args, config),
        Commands::Rgb(args) => commands::rgb::run(args, config),
        Commands::Config(args) => commands::config::run(args),
    }
}
