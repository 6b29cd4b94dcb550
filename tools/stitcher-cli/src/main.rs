//! Stitcher CLI: validate, plan, and render spec documents.
//!
//! Usage:
//!   stitcher render <SPEC>      Render a spec to its output artifact
//!   stitcher plan <SPEC>        Print the engine commands a render would run
//!   stitcher validate <SPEC>    Load a spec and print the resolved timeline
//!   stitcher check              Check that ffmpeg and ffprobe are available

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use stitcher_common::config::StitcherConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "stitcher",
    about = "Assemble one video from time-shifted recordings",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/stitcher/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a spec to its output artifact
    Render {
        /// Path to the spec document
        spec: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Chunks rendered concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Burn timestamps into chunks and keep the scratch directory
        #[arg(long)]
        debug: bool,
    },

    /// Print the engine commands a render would run
    Plan {
        /// Path to the spec document
        spec: PathBuf,

        /// Plan a debug render
        #[arg(long)]
        debug: bool,
    },

    /// Load a spec and print the resolved timeline
    Validate {
        /// Path to the spec document
        spec: PathBuf,

        /// Print the resolved timeline as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the media tools are available
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StitcherConfig::load_from(path)?,
        None => StitcherConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    stitcher_common::logging::init_logging(&config.logging);
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Render {
            spec,
            output,
            jobs,
            debug,
        } => commands::render::run(config, spec, output, jobs, debug).await,
        Commands::Plan { spec, debug } => commands::plan::run(config, spec, debug),
        Commands::Validate { spec, json } => commands::validate::run(config, spec, json),
        Commands::Check => commands::check::run(&config),
    }
}
