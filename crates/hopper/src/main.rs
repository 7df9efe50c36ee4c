//! Hopper CLI - watches a drop folder and forwards described images to Slack.
//!
//! Drop an image plus a JSON descriptor naming it into the watch directory.
//! Hopper uploads the image with the descriptor's caption and moves the
//! descriptor to `processed/` (or `discard/` when it is invalid).
//!
//! # Usage
//!
//! ```bash
//! # Watch the configured directory
//! hopper watch
//!
//! # Watch a specific directory, picking up files already there
//! hopper watch ./incoming --scan-existing
//!
//! # Validate a descriptor without uploading anything
//! hopper check ./incoming/cat.json
//!
//! # View configuration
//! hopper config show
//!
//! # Use a specific config file
//! hopper --config ./hopper.toml watch
//! ```

use clap::{Parser, Subcommand};
use hopper_core::{Config, ConfigError};
use std::path::{Path, PathBuf};

mod cli;
mod logging;

/// Hopper - watches a drop folder and forwards described images to Slack.
#[derive(Parser, Debug)]
#[command(name = "hopper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the platform default
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a directory and forward new descriptors until Ctrl-C
    Watch(cli::watch::WatchArgs),

    /// Validate a descriptor file and print the parsed record
    Check(cli::check::CheckArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(Config::default_path);

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            anyhow::bail!("Failed to load config {}: {e}", config_path.display());
        }
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `hopper config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Hopper v{}", hopper_core::VERSION);

    match cli.command {
        Commands::Watch(args) => cli::watch::execute(args, config).await,
        Commands::Check(args) => cli::check::execute(args).await,
        Commands::Config(args) => cli::config::execute(args, &config_path).await,
    }
}

/// Load `path`, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        Config::load_from(path)
    } else if path == Config::default_path() {
        Ok(Config::default())
    } else {
        Err(ConfigError::ReadError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )))
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
