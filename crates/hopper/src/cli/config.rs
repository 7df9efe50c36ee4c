//! The `hopper config` command for configuration management.

use clap::{Args, Subcommand};
use hopper_core::Config;
use std::path::Path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command against the file at `path`.
pub async fn execute(args: ConfigArgs, path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", load_or_default(path)?.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            write_default(path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Ok(Config::load_from(path)?)
    } else {
        Ok(Config::default())
    }
}

fn write_default(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = Config::default().to_toml()?;
    std::fs::write(path, toml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_writes_loadable_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        write_default(&path, false).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pipeline.buffer_size, 100);
        assert_eq!(config.sink.token, "${SLACK_TOKEN}");
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nbuffer_size = 7\n").unwrap();

        let err = write_default(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(Config::load_from(&path).unwrap().pipeline.buffer_size, 7);

        write_default(&path, true).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().pipeline.buffer_size, 100);
    }

    #[test]
    fn show_reads_the_given_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        assert_eq!(load_or_default(&path).unwrap().pipeline.buffer_size, 100);

        std::fs::write(&path, "[pipeline]\nbuffer_size = 3\n").unwrap();
        assert_eq!(load_or_default(&path).unwrap().pipeline.buffer_size, 3);
    }
}
