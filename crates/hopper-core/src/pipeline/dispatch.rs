//! Single-consumer dispatch of arrival events onto the handler.
//!
//! Producers (the watcher, the startup scan) submit events through a
//! [`PipelineHandle`] into a bounded queue. One dispatcher task drains it:
//!
//! - [`OrderingMode::Strict`]: each event is handled to completion before the
//!   next is taken off the queue.
//! - [`OrderingMode::BestEffort`]: a task is spawned per event (bounded by
//!   `max_in_flight`); tasks take turns on the exclusivity token.
//!
//! Either way at most one handler body runs at a time.

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle};

use super::channel::bounded_channel;
use super::exclusive::ExclusivityToken;
use super::handler::{ArrivalOutcome, HandleArrival};
use crate::config::{OrderingMode, PipelineConfig};
use crate::error::WatchError;
use crate::types::ArrivalEvent;

/// Paths queued or being handled. Duplicate notifications for one of these
/// collapse into the run already scheduled.
type PendingSet = Arc<Mutex<HashSet<PathBuf>>>;

/// Counters per terminal state, returned when the pipeline drains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub processed: usize,
    pub discarded: usize,
    pub image_ignored: usize,
    pub skipped: usize,
    pub unreadable: usize,
    pub upload_failed: usize,
    pub stranded: usize,
    pub panicked: usize,
}

impl DispatchStats {
    fn record(&mut self, outcome: &ArrivalOutcome) {
        match outcome {
            ArrivalOutcome::ImageIgnored => self.image_ignored += 1,
            ArrivalOutcome::Skipped => self.skipped += 1,
            ArrivalOutcome::Processed { .. } => self.processed += 1,
            ArrivalOutcome::Discarded { .. } => self.discarded += 1,
            ArrivalOutcome::Unreadable { .. } => self.unreadable += 1,
            ArrivalOutcome::UploadFailed { .. } => self.upload_failed += 1,
            ArrivalOutcome::Stranded { .. } => self.stranded += 1,
        }
    }

    fn record_join(&mut self, joined: Result<ArrivalOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.record(&outcome),
            Err(e) => {
                tracing::error!("Arrival task panicked: {e}");
                self.panicked += 1;
            }
        }
    }

    /// Total number of handled events.
    pub fn total(&self) -> usize {
        self.processed
            + self.discarded
            + self.image_ignored
            + self.skipped
            + self.unreadable
            + self.upload_failed
            + self.stranded
            + self.panicked
    }
}

/// Cloneable submission side of a running pipeline.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<ArrivalEvent>,
    pending: PendingSet,
}

impl PipelineHandle {
    /// Queue an event, waiting for capacity.
    ///
    /// Returns `Ok(false)` when the same path is already queued or in flight.
    /// Cancel safe: dropping the future before it resolves queues nothing and
    /// leaves no trace in the pending set.
    pub async fn submit(&self, event: ArrivalEvent) -> Result<bool, WatchError> {
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| WatchError::PipelineClosed)?;
        if !self.mark_pending(&event) {
            return Ok(false);
        }
        permit.send(event);
        Ok(true)
    }

    /// Blocking variant of [`submit`](Self::submit) for non-async threads.
    pub fn blocking_submit(&self, event: ArrivalEvent) -> Result<bool, WatchError> {
        if !self.mark_pending(&event) {
            return Ok(false);
        }
        let path = event.path.clone();
        if self.tx.blocking_send(event).is_err() {
            unmark(&self.pending, &path);
            return Err(WatchError::PipelineClosed);
        }
        Ok(true)
    }

    fn mark_pending(&self, event: &ArrivalEvent) -> bool {
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(event.path.clone());
        if !inserted {
            tracing::debug!(path = %event.path.display(), "Duplicate arrival collapsed");
        }
        inserted
    }
}

fn unmark(pending: &PendingSet, path: &Path) {
    pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(path);
}

/// A running dispatcher plus the handle used to feed it.
pub struct Pipeline {
    handle: PipelineHandle,
    dispatcher: JoinHandle<DispatchStats>,
}

impl Pipeline {
    /// Spawn the dispatcher task.
    ///
    /// `token` is shared with anything else that must not interleave with
    /// this pipeline's handler bodies.
    pub fn start(
        handler: Arc<dyn HandleArrival>,
        token: ExclusivityToken,
        config: &PipelineConfig,
    ) -> Self {
        let (tx, rx) = bounded_channel(config);
        let pending: PendingSet = Arc::new(Mutex::new(HashSet::new()));
        let dispatcher = Dispatcher {
            rx,
            handler,
            token,
            pending: pending.clone(),
        };

        let dispatcher = match config.ordering {
            OrderingMode::Strict => tokio::spawn(dispatcher.run_strict()),
            OrderingMode::BestEffort => {
                tokio::spawn(dispatcher.run_best_effort(config.max_in_flight))
            }
        };
        tracing::debug!(ordering = ?config.ordering, "Pipeline started");

        Self {
            handle: PipelineHandle { tx, pending },
            dispatcher,
        }
    }

    /// A new submission handle.
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Stop accepting events and wait for queued and in-flight ones to finish.
    ///
    /// Only completes once every other [`PipelineHandle`] has been dropped.
    pub async fn shutdown(self) -> DispatchStats {
        drop(self.handle);
        match self.dispatcher.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Dispatcher task failed: {e}");
                DispatchStats::default()
            }
        }
    }
}

struct Dispatcher {
    rx: mpsc::Receiver<ArrivalEvent>,
    handler: Arc<dyn HandleArrival>,
    token: ExclusivityToken,
    pending: PendingSet,
}

impl Dispatcher {
    async fn run_strict(mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(event) = self.rx.recv().await {
            let outcome = {
                let _guard = self.token.acquire().await;
                self.handler.handle(&event).await
            };
            unmark(&self.pending, &event.path);
            stats.record(&outcome);
        }
        tracing::debug!(handled = stats.total(), "Dispatcher drained");
        stats
    }

    async fn run_best_effort(mut self, max_in_flight: usize) -> DispatchStats {
        let semaphore = Arc::new(Semaphore::new(max_in_flight));
        let mut in_flight = FuturesUnordered::new();
        let mut stats = DispatchStats::default();

        loop {
            tokio::select! {
                Some(joined) = in_flight.next(), if !in_flight.is_empty() => {
                    stats.record_join(joined);
                }
                event = self.rx.recv() => {
                    let Some(event) = event else { break };
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        tracing::warn!("In-flight semaphore closed unexpectedly, stopping dispatch");
                        break;
                    };

                    let handler = self.handler.clone();
                    let token = self.token.clone();
                    let pending = self.pending.clone();
                    in_flight.push(tokio::spawn(async move {
                        let outcome = {
                            let _guard = token.acquire().await;
                            handler.handle(&event).await
                        };
                        unmark(&pending, &event.path);
                        drop(permit);
                        outcome
                    }));
                }
            }
        }

        while let Some(joined) = in_flight.next().await {
            stats.record_join(joined);
        }
        tracing::debug!(handled = stats.total(), "Dispatcher drained");
        stats
    }
}
