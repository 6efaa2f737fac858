//! reget CLI - resumable, verified file downloads
//!
//! Downloads a single file, picking up where a previous run stopped when
//! the server supports byte ranges.

mod commands;
mod config;
mod output;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// reget - resumable downloads with integrity checks
#[derive(Parser)]
#[command(name = "reget")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, env = "REGET_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human", global = true)]
    output: OutputFormat,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a file, resuming a partial download if possible
    Get {
        /// URL to download
        url: String,

        /// Output file path (defaults to the last URL segment)
        #[arg(short = 'O', long = "out")]
        out: Option<PathBuf>,

        /// Expected SHA-256 of the file (hex), overrides the server's checksum
        #[arg(long)]
        sha256: Option<String>,

        #[command(flatten)]
        overrides: config::Overrides,

        /// Don't draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show size, range support and checksum of remote files
    Probe {
        /// URLs to probe
        urls: Vec<String>,

        #[command(flatten)]
        overrides: config::Overrides,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the default config file location
    Path,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Get {
            url,
            out,
            sha256,
            overrides,
            no_progress,
        } => {
            let config = config::load(cli.config.as_deref())?.apply(&overrides);
            commands::get(&config, &url, out, sha256.as_deref(), !no_progress, cli.output).await?
        }

        Commands::Probe { urls, overrides } => {
            let config = config::load(cli.config.as_deref())?.apply(&overrides);
            commands::probe(&config, urls, cli.output).await?
        }

        Commands::Config { action } => {
            let config = config::load(cli.config.as_deref())?;
            commands::config_action(&config, action, cli.output)?;
            ExitCode::SUCCESS
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "reget", &mut std::io::stdout());
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
