//! The exclusivity token serializing handler bodies.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A single permit guarding the classify → validate → upload → relocate
/// sequence.
///
/// Cloning shares the permit. Every pipeline built from the same token is
/// serialized against every other one; independent pipelines get their own.
#[derive(Debug, Clone, Default)]
pub struct ExclusivityToken {
    inner: Arc<Mutex<()>>,
}

/// Held while a handler body runs; dropping it releases the token.
pub type ExclusiveGuard = OwnedMutexGuard<()>;

impl ExclusivityToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the token. Waiters are served in the order they asked.
    pub async fn acquire(&self) -> ExclusiveGuard {
        self.inner.clone().lock_owned().await
    }
}
