//! The per-arrival state machine.
//!
//! ```text
//! Arrived → Classified → ImageIgnored
//!                      → Skipped
//!                      → DescriptorDiscarded ──────────────→ discard/
//!                      → DescriptorValidated → Uploaded ───→ processed/
//!                                            → UploadFailed → (left | discard/)
//! ```
//!
//! The handler owns every relocation decision. It does not serialize itself:
//! callers hold the [`ExclusivityToken`](super::ExclusivityToken) around
//! [`ArrivalHandler::handle`].

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

use super::settle::{wait_until_settled, SettleOptions, Settled};
use crate::classify::{classify, FileKind};
use crate::config::UploadFailurePolicy;
use crate::descriptor;
use crate::error::RelocationError;
use crate::relocate::Relocator;
use crate::sink::Uploader;
use crate::types::{ArrivalEvent, RelocationOutcome, Terminal, WatchTarget};

/// Terminal state of one handler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArrivalOutcome {
    /// A bare image; images are only uploaded through a descriptor
    ImageIgnored,
    /// Neither an image nor a descriptor
    Skipped,
    /// Uploaded and moved to `processed`
    Processed { relocation: RelocationOutcome },
    /// Bad descriptor moved to `discard`
    Discarded {
        reason: String,
        relocation: RelocationOutcome,
    },
    /// The descriptor could not be read (usually gone already)
    Unreadable { reason: String },
    /// Upload failed; `relocation` is set when policy moved the descriptor
    UploadFailed {
        reason: String,
        relocation: Option<RelocationOutcome>,
    },
    /// The descriptor should have moved but could not
    Stranded { reason: String },
}

impl ArrivalOutcome {
    /// Short label for logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            ArrivalOutcome::ImageIgnored => "image_ignored",
            ArrivalOutcome::Skipped => "skipped",
            ArrivalOutcome::Processed { .. } => "processed",
            ArrivalOutcome::Discarded { .. } => "discarded",
            ArrivalOutcome::Unreadable { .. } => "unreadable",
            ArrivalOutcome::UploadFailed { .. } => "upload_failed",
            ArrivalOutcome::Stranded { .. } => "stranded",
        }
    }
}

/// Classifies, validates, uploads and relocates a single arrival.
pub struct ArrivalHandler {
    target: WatchTarget,
    relocator: Relocator,
    uploader: Uploader,
    on_upload_failure: UploadFailurePolicy,
    settle: SettleOptions,
}

impl ArrivalHandler {
    pub fn new(
        target: WatchTarget,
        relocator: Relocator,
        uploader: Uploader,
        on_upload_failure: UploadFailurePolicy,
    ) -> Self {
        Self {
            target,
            relocator,
            uploader,
            on_upload_failure,
            settle: SettleOptions::immediate(),
        }
    }

    /// Wait for descriptors to finish being written before reading them.
    pub fn with_settle(mut self, settle: SettleOptions) -> Self {
        self.settle = settle;
        self
    }

    /// Run the state machine for one event.
    pub async fn handle(&self, event: &ArrivalEvent) -> ArrivalOutcome {
        let path = event.path.as_path();
        tracing::debug!(path = %path.display(), "Handling arrival");

        match classify(path) {
            FileKind::Image => {
                tracing::debug!(path = %path.display(), "Bare image, waiting for a descriptor");
                return ArrivalOutcome::ImageIgnored;
            }
            FileKind::Unknown => {
                tracing::debug!(path = %path.display(), "Not a descriptor, skipping");
                return ArrivalOutcome::Skipped;
            }
            FileKind::Descriptor => {}
        }

        if wait_until_settled(path, &self.settle).await == Settled::TimedOut {
            tracing::debug!(
                path = %path.display(),
                "Descriptor still empty or changing after {:?}, reading anyway",
                self.settle.timeout
            );
        }

        let descriptor = match descriptor::validate(path, &self.target).await {
            Ok(descriptor) => descriptor,
            Err(e) if e.is_bad_input() => {
                tracing::warn!("Unable to process {}, moving to discard: {e}", path.display());
                return match self.relocate(path, Terminal::Discard).await {
                    Ok(relocation) => ArrivalOutcome::Discarded {
                        reason: e.to_string(),
                        relocation,
                    },
                    Err(outcome) => outcome,
                };
            }
            Err(e) => {
                tracing::warn!("{e}");
                return ArrivalOutcome::Unreadable {
                    reason: e.to_string(),
                };
            }
        };

        if let Err(e) = self.uploader.upload(&descriptor).await {
            tracing::warn!(
                descriptor = %path.display(),
                image = %descriptor.image_path.display(),
                "Upload failed: {e}"
            );
            let relocation = match self.on_upload_failure {
                UploadFailurePolicy::Leave => None,
                UploadFailurePolicy::Discard => match self.relocate(path, Terminal::Discard).await {
                    Ok(relocation) => Some(relocation),
                    Err(outcome) => return outcome,
                },
            };
            return ArrivalOutcome::UploadFailed {
                reason: e.to_string(),
                relocation,
            };
        }

        match self.relocate(path, Terminal::Processed).await {
            Ok(relocation) => {
                tracing::info!(
                    image = %descriptor.image_path.display(),
                    to = %relocation.destination.display(),
                    "Uploaded and processed"
                );
                ArrivalOutcome::Processed { relocation }
            }
            Err(outcome) => outcome,
        }
    }

    async fn relocate(
        &self,
        path: &Path,
        terminal: Terminal,
    ) -> Result<RelocationOutcome, ArrivalOutcome> {
        self.relocator
            .relocate(path, terminal)
            .await
            .map_err(|e: RelocationError| {
                tracing::error!("File left in watch directory: {e}");
                ArrivalOutcome::Stranded {
                    reason: e.to_string(),
                }
            })
    }
}

/// What the dispatcher hands each arrival to.
///
/// Implemented by [`ArrivalHandler`]; the seam lets callers wrap the whole
/// handler body.
#[async_trait]
pub trait HandleArrival: Send + Sync {
    async fn handle(&self, event: &ArrivalEvent) -> ArrivalOutcome;
}

#[async_trait]
impl HandleArrival for ArrivalHandler {
    async fn handle(&self, event: &ArrivalEvent) -> ArrivalOutcome {
        ArrivalHandler::handle(self, event).await
    }
}
