//! Bounded event queue between the watcher and the dispatcher.

use tokio::sync::mpsc;

use crate::config::PipelineConfig;

/// Create a bounded channel pair with the configured buffer size.
///
/// When the buffer is full the watcher blocks, so a slow sink throttles event
/// intake instead of growing memory.
pub fn bounded_channel<T>(config: &PipelineConfig) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(config.buffer_size)
}
