//! Directory watcher: turns filesystem creation events into pipeline submissions.
//!
//! The `notify` backend delivers events on its own thread; they are forwarded
//! into a tokio channel and submitted to the [`PipelineHandle`]. Handling
//! happens downstream, so a slow upload never blocks event delivery beyond
//! the pipeline's queue capacity.

use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::pipeline::{pending_descriptors, PipelineHandle};
use crate::types::{ArrivalEvent, WatchTarget};

/// Capacity of the channel between the notify thread and the watch loop.
const NOTIFY_BUFFER: usize = 256;

/// Subscribes to one [`WatchTarget`] and feeds creation events to a pipeline.
pub struct DirectoryWatcher {
    target: WatchTarget,
    scan_existing: bool,
}

impl DirectoryWatcher {
    /// `target` should already be [prepared](WatchTarget::prepare).
    pub fn new(target: WatchTarget) -> Self {
        Self {
            target,
            scan_existing: false,
        }
    }

    /// Also submit descriptors already present once the subscription is live.
    pub fn scan_existing(mut self, scan: bool) -> Self {
        self.scan_existing = scan;
        self
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Watch until `cancel` fires or the pipeline closes.
    ///
    /// Only a failed subscription is returned as an error. Errors reported by
    /// the backend afterwards are logged and watching continues.
    pub async fn watch(
        &self,
        pipeline: PipelineHandle,
        cancel: CancellationToken,
    ) -> Result<(), WatchError> {
        let dir = self.target.dir();
        let (fs_tx, mut fs_rx) = mpsc::channel::<notify::Result<Event>>(NOTIFY_BUFFER);
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = fs_tx.blocking_send(res);
        })
        .map_err(|source| WatchError::Subscribe {
            path: dir.to_path_buf(),
            source,
        })?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Subscribe {
                path: dir.to_path_buf(),
                source,
            })?;
        tracing::info!(dir = %dir.display(), "Watching for arrivals");

        let result = self.run(&pipeline, &cancel, &mut fs_rx).await;

        if let Err(e) = watcher.unwatch(dir) {
            tracing::debug!("Unwatch of {} failed: {e}", dir.display());
        }
        tracing::info!(dir = %dir.display(), "Stopped watching");
        result
    }

    async fn run(
        &self,
        pipeline: &PipelineHandle,
        cancel: &CancellationToken,
        fs_rx: &mut mpsc::Receiver<notify::Result<Event>>,
    ) -> Result<(), WatchError> {
        if self.scan_existing {
            let existing = pending_descriptors(&self.target);
            if !existing.is_empty() {
                tracing::info!(count = existing.len(), "Queueing descriptors found at startup");
            }
            for path in existing {
                if forward(pipeline, cancel, path).await?.is_break() {
                    return Ok(());
                }
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                received = fs_rx.recv() => match received {
                    Some(Ok(event)) => {
                        if !is_creation(&event.kind) {
                            continue;
                        }
                        for path in event.paths {
                            if !self.is_direct_child(&path) {
                                continue;
                            }
                            if forward(pipeline, cancel, path).await?.is_break() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(dir = %self.target.dir().display(), "Watch error: {e}");
                    }
                    None => {
                        tracing::warn!("Notification backend closed its channel");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Regular files directly inside the watch directory.
    fn is_direct_child(&self, path: &Path) -> bool {
        path.parent() == Some(self.target.dir()) && !path.is_dir()
    }
}

/// Submit one arrival, giving up if `cancel` fires while the queue is full.
async fn forward(
    pipeline: &PipelineHandle,
    cancel: &CancellationToken,
    path: PathBuf,
) -> Result<ControlFlow<()>, WatchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(ControlFlow::Break(())),
        submitted = pipeline.submit(ArrivalEvent::created(path)) => {
            submitted.map(|_| ControlFlow::Continue(()))
        }
    }
}

/// Only creations count as arrivals; writes, renames and removals do not.
pub fn is_creation(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollisionPolicy, PipelineConfig, UploadFailurePolicy};
    use crate::pipeline::{ArrivalHandler, ExclusivityToken, Pipeline, SettleOptions};
    use crate::relocate::Relocator;
    use crate::sink::testing::*;
    use crate::sink::Uploader;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_only_creation_counts() {
        assert!(is_creation(&EventKind::Create(CreateKind::File)));
        assert!(is_creation(&EventKind::Create(CreateKind::Any)));
        assert!(!is_creation(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_creation(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
        assert!(!is_creation(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_creation(&EventKind::Any));
    }

    #[test]
    fn test_direct_child_filter() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        std::fs::create_dir(target.dir().join("nested")).unwrap();
        let watcher = DirectoryWatcher::new(target.clone());

        assert!(watcher.is_direct_child(&target.dir().join("a.json")));
        assert!(!watcher.is_direct_child(&target.dir().join("nested")));
        assert!(!watcher.is_direct_child(&target.dir().join("nested").join("b.json")));
        assert!(!watcher.is_direct_child(&tmp.path().join("c.json")));
    }

    fn start_pipeline(target: &WatchTarget, sink: MockSink) -> Pipeline {
        start_pipeline_with(target, sink, &PipelineConfig::default())
    }

    fn start_pipeline_with(
        target: &WatchTarget,
        sink: MockSink,
        config: &PipelineConfig,
    ) -> Pipeline {
        let uploader = Uploader::new(
            Arc::new(sink),
            Arc::new(StaticAuthors::default()),
            fast_options(),
        );
        let handler = ArrivalHandler::new(
            target.clone(),
            Relocator::new(target.clone(), CollisionPolicy::Suffix),
            uploader,
            UploadFailurePolicy::Leave,
        )
        .with_settle(SettleOptions::from_config(config));
        Pipeline::start(Arc::new(handler), ExclusivityToken::new(), config)
    }

    async fn wait_for(path: &Path) -> bool {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !path.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_created_descriptor_is_processed() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        let sink = MockSink::accepting();
        let calls = sink.call_count_handle();
        let pipeline = start_pipeline(&target, sink);

        let cancel = CancellationToken::new();
        let watcher = DirectoryWatcher::new(target.clone());
        let handle = pipeline.handle();
        let watch_cancel = cancel.clone();
        let task = tokio::spawn(async move { watcher.watch(handle, watch_cancel).await });

        // Give the backend a moment to register the subscription.
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(target.dir().join("cat.png"), PNG_BYTES).unwrap();
        std::fs::write(
            target.dir().join("cat.json"),
            r#"{"ImagePath": "cat.png", "Caption": "hello"}"#,
        )
        .unwrap();

        let processed = target.terminal_dir(crate::types::Terminal::Processed);
        assert!(wait_for(&processed.join("cat.json")).await);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let stats = pipeline.shutdown().await;

        assert_eq!(stats.processed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(target.dir().join("cat.png").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scan_existing_picks_up_backlog() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        std::fs::write(target.dir().join("old.png"), PNG_BYTES).unwrap();
        std::fs::write(
            target.dir().join("old.json"),
            r#"{"ImagePath": "old.png"}"#,
        )
        .unwrap();
        std::fs::write(target.dir().join("broken.json"), "not json").unwrap();

        let pipeline = start_pipeline(&target, MockSink::accepting());
        let cancel = CancellationToken::new();
        let watcher = DirectoryWatcher::new(target.clone()).scan_existing(true);
        let handle = pipeline.handle();
        let watch_cancel = cancel.clone();
        let task = tokio::spawn(async move { watcher.watch(handle, watch_cancel).await });

        let processed = target.terminal_dir(crate::types::Terminal::Processed);
        let discard = target.terminal_dir(crate::types::Terminal::Discard);
        assert!(wait_for(&processed.join("old.json")).await);
        assert!(wait_for(&discard.join("broken.json")).await);

        cancel.cancel();
        task.await.unwrap().unwrap();
        let stats = pipeline.shutdown().await;
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.discarded, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_existing_files_ignored_without_scan() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        std::fs::write(target.dir().join("old.json"), "{}").unwrap();

        let pipeline = start_pipeline(&target, MockSink::accepting());
        let cancel = CancellationToken::new();
        let watcher = DirectoryWatcher::new(target.clone());
        let handle = pipeline.handle();
        let watch_cancel = cancel.clone();
        let task = tokio::spawn(async move { watcher.watch(handle, watch_cancel).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
        let stats = pipeline.shutdown().await;

        assert_eq!(stats.total(), 0);
        assert!(target.dir().join("old.json").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_directory_fails_to_subscribe() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("never-created"));
        let pipeline = start_pipeline(&target, MockSink::accepting());

        let result = DirectoryWatcher::new(target)
            .watch(pipeline.handle(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(WatchError::Subscribe { .. })));
        pipeline.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_descriptor_filled_after_creation_is_processed() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        let sink = MockSink::accepting();
        let calls = sink.call_count_handle();
        let pipeline = start_pipeline(&target, sink);

        let cancel = CancellationToken::new();
        let watcher = DirectoryWatcher::new(target.clone());
        let handle = pipeline.handle();
        let watch_cancel = cancel.clone();
        let task = tokio::spawn(async move { watcher.watch(handle, watch_cancel).await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(target.dir().join("cat.png"), PNG_BYTES).unwrap();
        // The creation event fires while the descriptor is still empty.
        let desc = target.dir().join("cat.json");
        std::fs::File::create(&desc).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::write(&desc, r#"{"ImagePath":"cat.png","Caption":"hi"}"#).unwrap();

        let processed = target.terminal_dir(crate::types::Terminal::Processed);
        assert!(wait_for(&processed.join("cat.json")).await);

        cancel.cancel();
        task.await.unwrap().unwrap();
        let stats = pipeline.shutdown().await;

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.discarded, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!target
            .terminal_dir(crate::types::Terminal::Discard)
            .join("cat.json")
            .exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_is_prompt_while_queue_is_full() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        for i in 0..4 {
            std::fs::write(target.dir().join(format!("img{i}.png")), PNG_BYTES).unwrap();
            std::fs::write(
                target.dir().join(format!("img{i}.json")),
                format!(r#"{{"ImagePath":"img{i}.png"}}"#),
            )
            .unwrap();
        }
        let config = PipelineConfig {
            buffer_size: 1,
            settle_ms: 0,
            ..PipelineConfig::default()
        };
        let sink = MockSink::accepting().with_delay(Duration::from_secs(2));
        let pipeline = start_pipeline_with(&target, sink, &config);

        let cancel = CancellationToken::new();
        let watcher = DirectoryWatcher::new(target.clone()).scan_existing(true);
        let handle = pipeline.handle();
        let watch_cancel = cancel.clone();
        let task = tokio::spawn(async move { watcher.watch(handle, watch_cancel).await });

        // One event is being uploaded, one fills the queue, the scan blocks on the third.
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("watcher ignored cancellation while the queue was full")
            .unwrap()
            .unwrap();

        let stats = pipeline.shutdown().await;
        assert_eq!(stats.processed, 2);
        assert!(target.dir().join("img2.json").exists());
        assert!(target.dir().join("img3.json").exists());
    }
}
