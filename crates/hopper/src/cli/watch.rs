//! The `hopper watch` command.

use clap::{Args, ValueEnum};
use hopper_core::config::OrderingMode;
use hopper_core::{Config, Hopper};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Arguments for the `watch` command.
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Directory to watch (defaults to `watch.dir` from the config file)
    pub dir: Option<PathBuf>,

    /// Scheduling of arrival events
    #[arg(long, value_enum)]
    pub ordering: Option<Ordering>,

    /// Also process descriptors already in the directory at startup
    #[arg(long)]
    pub scan_existing: bool,
}

/// CLI names for the scheduling modes.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Ordering {
    /// One event at a time, in arrival order
    Strict,
    /// A task per event, serialized on the exclusivity token
    BestEffort,
}

impl From<Ordering> for OrderingMode {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Strict => OrderingMode::Strict,
            Ordering::BestEffort => OrderingMode::BestEffort,
        }
    }
}

/// Execute the watch command.
pub async fn execute(args: WatchArgs, config: Config) -> anyhow::Result<()> {
    let config = apply_overrides(config, &args);
    let hopper = Hopper::new(config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupt received, finishing in-flight work"),
            Err(e) => tracing::error!("Cannot listen for Ctrl-C: {e}"),
        }
        on_signal.cancel();
    });

    let stats = hopper.run(cancel).await?;
    tracing::info!(
        processed = stats.processed,
        discarded = stats.discarded,
        upload_failed = stats.upload_failed,
        unreadable = stats.unreadable,
        stranded = stats.stranded,
        ignored = stats.image_ignored + stats.skipped,
        "Stopped after {} arrivals",
        stats.total()
    );
    Ok(())
}

/// Fold CLI flags into the loaded config.
fn apply_overrides(mut config: Config, args: &WatchArgs) -> Config {
    if let Some(dir) = &args.dir {
        let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
        config.watch.dir = PathBuf::from(expanded);
    }
    if let Some(ordering) = args.ordering {
        config.pipeline.ordering = ordering.into();
    }
    if args.scan_existing {
        config.watch.scan_existing = true;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keep_config() {
        let config = apply_overrides(Config::default(), &WatchArgs::default());
        assert_eq!(config.watch.dir, Config::default().watch.dir);
        assert_eq!(config.pipeline.ordering, OrderingMode::Strict);
        assert!(!config.watch.scan_existing);
    }

    #[test]
    fn flags_override_config() {
        let args = WatchArgs {
            dir: Some(PathBuf::from("/srv/drop")),
            ordering: Some(Ordering::BestEffort),
            scan_existing: true,
        };
        let config = apply_overrides(Config::default(), &args);
        assert_eq!(config.watch.dir, PathBuf::from("/srv/drop"));
        assert_eq!(config.pipeline.ordering, OrderingMode::BestEffort);
        assert!(config.watch.scan_existing);
    }

    #[test]
    fn dir_override_expands_tilde() {
        let args = WatchArgs {
            dir: Some(PathBuf::from("~/drop")),
            ..WatchArgs::default()
        };
        let config = apply_overrides(Config::default(), &args);
        assert!(!config.watch.dir.to_string_lossy().starts_with('~'));
        assert!(config.watch.dir.ends_with("drop"));
    }
}
