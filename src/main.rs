//! Binary entry point for postsieve.
//!
//! This binary runs scraped batches through the deduplication pipeline and
//! inspects the history database.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{RunArgs, cmd_config, cmd_run, cmd_status};
use postsieve::config::PostsieveConfig;
use postsieve::observability::{self, ObservabilityConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Postsieve - deduplicating ingestion for scraped social-media posts.
#[derive(Parser)]
#[command(name = "postsieve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a batch through the pipeline.
    Run {
        /// JSON file with the batch.
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as raw scraped records and normalize them first.
        #[arg(long)]
        raw: bool,

        /// Publish original text without calling the rewrite service.
        #[arg(long)]
        no_rewrite: bool,

        /// Write approved posts to this JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show database status and recent rejections.
    Status {
        /// Number of recent skip events to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Manage configuration.
    Config {
        /// Show the effective configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PostsieveConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let mut observability =
        match observability::init(ObservabilityConfig::from_config(&config, cli.verbose)) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("Failed to initialize observability: {e}");
                return ExitCode::FAILURE;
            },
        };

    let result = run_command(cli.command, config);
    observability.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(
    command: Commands,
    config: PostsieveConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Run {
            input,
            raw,
            no_rewrite,
            output,
        } => cmd_run(
            config,
            RunArgs {
                input,
                raw,
                no_rewrite,
                output,
            },
        ),

        Commands::Status { limit } => cmd_status(&config, limit),

        Commands::Config { show } => cmd_config(&config, show),
    }
}
