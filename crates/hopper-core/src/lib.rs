//! Hopper Core - drop-folder pipeline that forwards images to a chat channel.
//!
//! Hopper watches a directory for JSON descriptor files. Each descriptor
//! names an image in the same directory plus an optional caption and author
//! key. Valid descriptors have their image uploaded to the configured sink and
//! are moved to `processed/`; invalid ones are moved to `discard/`.
//!
//! # Architecture
//!
//! ```text
//! notify → DirectoryWatcher → Pipeline queue → ArrivalHandler
//!                                               ├ classify
//!                                               ├ descriptor::validate
//!                                               ├ Uploader → MessageSink
//!                                               └ Relocator → processed/ | discard/
//! ```
//!
//! At most one handler body runs at a time per [`ExclusivityToken`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use hopper_core::{Config, Hopper};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> hopper_core::Result<()> {
//!     let hopper = Hopper::new(Config::load()?)?;
//!     let cancel = CancellationToken::new();
//!     let stats = hopper.run(cancel).await?;
//!     println!("Processed: {}", stats.processed);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod classify;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod pipeline;
pub mod relocate;
pub mod sink;
pub mod types;
pub mod watcher;

// Re-exports for convenient access
pub use classify::{classify, FileKind};
pub use config::Config;
pub use descriptor::ImageDescriptor;
pub use error::{
    ConfigError, HopperError, LookupError, RelocationError, Result, UploadError, ValidationError,
    WatchError,
};
pub use pipeline::{
    ArrivalHandler, ArrivalOutcome, DispatchStats, ExclusivityToken, Pipeline, SettleOptions,
};
pub use relocate::Relocator;
pub use sink::{AuthorDirectory, CredentialsDirectory, MessageSink, SlackSink, Uploader};
pub use types::{ArrivalEvent, Terminal, WatchTarget};
pub use watcher::DirectoryWatcher;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use sink::UploadOptions;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One fully wired watch pipeline - the main entry point.
pub struct Hopper {
    config: Config,
    target: WatchTarget,
    handler: Arc<ArrivalHandler>,
    token: ExclusivityToken,
}

impl Hopper {
    /// Wire a pipeline with the Slack sink and on-disk credentials directory.
    pub fn new(config: Config) -> Result<Self> {
        let sink = SlackSink::from_config(&config.sink)?;
        let authors = CredentialsDirectory::new(config.credentials_dir());
        Self::with_parts(config, Arc::new(sink), Arc::new(authors))
    }

    /// Wire a pipeline around caller-supplied collaborators.
    ///
    /// Validates the config and creates the watch and terminal directories.
    pub fn with_parts(
        config: Config,
        sink: Arc<dyn MessageSink>,
        authors: Arc<dyn AuthorDirectory>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::debug!("Initializing Hopper v{}", VERSION);

        let target = WatchTarget::from_config(&config).prepare()?;
        let options = UploadOptions::from_config(&config.sink)?;
        let uploader = Uploader::new(sink, authors, options);
        let relocator = Relocator::new(target.clone(), config.pipeline.collision);
        let handler = ArrivalHandler::new(
            target.clone(),
            relocator,
            uploader,
            config.pipeline.on_upload_failure,
        )
        .with_settle(SettleOptions::from_config(&config.pipeline));

        Ok(Self {
            config,
            target,
            handler: Arc::new(handler),
            token: ExclusivityToken::new(),
        })
    }

    /// Share an exclusivity token with other pipelines.
    pub fn with_token(mut self, token: ExclusivityToken) -> Self {
        self.token = token;
        self
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The prepared (canonical) watch target.
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Watch until `cancel` fires, then drain in-flight events.
    pub async fn run(&self, cancel: CancellationToken) -> Result<DispatchStats> {
        let pipeline = Pipeline::start(
            self.handler.clone(),
            self.token.clone(),
            &self.config.pipeline,
        );
        let watcher = DirectoryWatcher::new(self.target.clone())
            .scan_existing(self.config.watch.scan_existing);

        let watched = watcher.watch(pipeline.handle(), cancel).await;
        let stats = pipeline.shutdown().await;
        watched?;

        tracing::info!(
            processed = stats.processed,
            discarded = stats.discarded,
            upload_failed = stats.upload_failed,
            stranded = stats.stranded,
            "Pipeline drained"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(tmp: &Path) -> Config {
        let mut config = Config::default();
        config.watch.dir = tmp.join("incoming");
        config.watch.scan_existing = true;
        config.sink.channel = "C0HOPPER".to_string();
        config
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_with_parts_prepares_directories() {
        let tmp = TempDir::new().unwrap();
        let hopper = Hopper::with_parts(
            test_config(tmp.path()),
            Arc::new(MockSink::accepting()),
            Arc::new(StaticAuthors::default()),
        )
        .unwrap();

        assert!(hopper.target().dir().is_dir());
        assert!(tmp.path().join("processed").is_dir());
        assert!(tmp.path().join("discard").is_dir());
        assert_eq!(hopper.config().pipeline.buffer_size, 100);
    }

    #[test]
    fn test_with_parts_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.pipeline.buffer_size = 0;
        let result = Hopper::with_parts(
            config,
            Arc::new(MockSink::accepting()),
            Arc::new(StaticAuthors::default()),
        );
        assert!(matches!(result, Err(HopperError::Config(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_drains_backlog_and_stops() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        std::fs::create_dir_all(&config.watch.dir).unwrap();
        std::fs::write(config.watch.dir.join("dog.png"), PNG_BYTES).unwrap();
        std::fs::write(
            config.watch.dir.join("dog.json"),
            r#"{"ImagePath": "dog.png", "AuthorKey": "alice"}"#,
        )
        .unwrap();

        let sink = MockSink::accepting();
        let requests = sink.requests_handle();
        let hopper = Hopper::with_parts(
            config,
            Arc::new(sink),
            Arc::new(StaticAuthors::with("alice", "Alice")),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let processed = tmp.path().join("processed").join("dog.json");
        tokio::spawn(async move {
            let _ = tokio::time::timeout(Duration::from_secs(10), async {
                while !processed.exists() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await;
            stopper.cancel();
        });

        let stats = tokio::time::timeout(Duration::from_secs(15), hopper.run(cancel))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.processed, 1);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].title, "Alice");
        assert_eq!(requests[0].initial_comment, descriptor::DEFAULT_CAPTION);
    }
}
