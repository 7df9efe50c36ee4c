//! Retry utilities for transient sink failures.

use crate::error::UploadError;
use std::time::Duration;

/// Determine whether an upload error is worth retrying.
///
/// Retryable: timeouts and an unreachable or overloaded sink (transport
/// errors, 429, 5xx). Everything else fails the same way on every attempt.
pub fn is_retryable(error: &UploadError) -> bool {
    match error {
        UploadError::Timeout { .. } => true,
        UploadError::SinkUnavailable { status_code, .. } => match status_code {
            Some(code) => *code == 429 || (500..=599).contains(code),
            None => true,
        },
        _ => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}
