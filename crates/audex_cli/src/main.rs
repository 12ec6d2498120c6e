mod app;
mod commands;

use std::path::PathBuf;

use audex_core::extraction::{OutputFormat, Quality};
use audex_core::logging::LogLevel;
use clap::{Parser, Subcommand};

use crate::app::App;

#[derive(Parser)]
#[command(
    name = "audex",
    version,
    about = "Extract audio tracks from video and audio files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./audex.toml if present, else the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue files and extract their audio
    Extract {
        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output format (mp3, wav, aac)
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Output quality (high, medium, low)
        #[arg(short, long)]
        quality: Option<Quality>,
        /// Output directory (default: paths.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-queue failed jobs and run them again
    Retry {
        /// Output directory (default: paths.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the job queue
    Status,
    /// Show completed extractions
    History,
    /// Remove all jobs and unreferenced blobs
    Clear,
    /// Load the engine and run its self-test
    CheckEngine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (app, _log_guard) = App::open(cli.config, cli.log_level)?;

    match cli.command {
        Commands::Extract {
            files,
            format,
            quality,
            output,
        } => commands::extract::execute(&app, &files, format, quality, output).await,
        Commands::Retry { output } => commands::retry::execute(&app, output).await,
        Commands::Status => commands::status::execute(&app),
        Commands::History => commands::history::execute(&app),
        Commands::Clear => commands::clear::execute(&app),
        Commands::CheckEngine => commands::check_engine::execute(&app).await,
    }
}
