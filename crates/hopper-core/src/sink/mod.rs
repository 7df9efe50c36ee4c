//! Upload adapter: turns a validated descriptor into a single sink upload.
//!
//! The sink itself is an opaque collaborator behind [`MessageSink`]; the
//! Slack implementation lives in [`slack`]. Author titles come from an
//! [`AuthorDirectory`].

pub mod author;
pub(crate) mod retry;
pub mod slack;
pub(crate) mod sniff;

pub use author::{AuthorDirectory, CredentialsDirectory, ANONYMOUS_AUTHOR, UNKNOWN_AUTHOR};
pub use slack::SlackSink;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{classify, FileKind};
use crate::config::{resolve_env_var, SinkConfig};
use crate::descriptor::ImageDescriptor;
use crate::error::{ConfigError, UploadError};

/// Everything the sink needs for one upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Raw image bytes
    pub content: Vec<u8>,
    /// Base file name shown in the channel
    pub filename: String,
    /// Upload title (the resolved author)
    pub title: String,
    /// Target channel identifier
    pub channel: String,
    /// Comment posted with the file
    pub initial_comment: String,
}

/// Trait that all message sinks implement.
///
/// Uses `async_trait` because the uploader holds an `Arc<dyn MessageSink>`.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sink name for logging (e.g., "slack").
    fn name(&self) -> &str;

    /// Perform one upload attempt.
    async fn upload(&self, request: &UploadRequest) -> Result<(), UploadError>;
}

/// Uploader settings.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Target channel identifier
    pub channel: String,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts for transient failures
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl UploadOptions {
    /// Build options from config, resolving the channel reference.
    pub fn from_config(config: &SinkConfig) -> Result<Self, ConfigError> {
        let channel = resolve_env_var(&config.channel).ok_or_else(|| {
            ConfigError::ValidationError(
                "Slack channel not set. Set SLACK_CHANNEL or sink.channel.".to_string(),
            )
        })?;
        Ok(Self {
            channel,
            timeout_ms: config.timeout_ms,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        })
    }
}

/// Uploads the image a descriptor points at.
pub struct Uploader {
    sink: Arc<dyn MessageSink>,
    authors: Arc<dyn AuthorDirectory>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        authors: Arc<dyn AuthorDirectory>,
        options: UploadOptions,
    ) -> Self {
        Self {
            sink,
            authors,
            options,
        }
    }

    /// Upload the image referenced by `descriptor`.
    ///
    /// The image must classify as an image, be readable and carry image
    /// content; otherwise the sink is never contacted. Transient sink failures
    /// are retried `retry_attempts` times with exponential backoff.
    pub async fn upload(&self, descriptor: &ImageDescriptor) -> Result<(), UploadError> {
        let image_path = &descriptor.image_path;
        if classify(image_path) != FileKind::Image {
            return Err(UploadError::NotAnImage(image_path.clone()));
        }

        let content =
            tokio::fs::read(image_path)
                .await
                .map_err(|e| UploadError::SourceUnreadable {
                    path: image_path.clone(),
                    message: e.to_string(),
                })?;
        if !sniff::is_image_content(&content) {
            return Err(UploadError::NotAnImage(image_path.clone()));
        }

        let title =
            author::resolve_author(self.authors.as_ref(), descriptor.author_key.as_deref()).await;
        let filename = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        let request = UploadRequest {
            content,
            filename,
            title,
            channel: self.options.channel.clone(),
            initial_comment: descriptor.comment().to_string(),
        };

        let timeout = Duration::from_millis(self.options.timeout_ms);
        let mut last_error = None;
        for attempt in 0..=self.options.retry_attempts {
            if attempt > 0 {
                let delay = retry::backoff_duration(attempt - 1, self.options.retry_delay_ms);
                tracing::debug!(
                    "Retry {attempt}/{} for {:?} after {delay:?}",
                    self.options.retry_attempts,
                    image_path
                );
                tokio::time::sleep(delay).await;
            }

            let error = match tokio::time::timeout(timeout, self.sink.upload(&request)).await {
                Ok(Ok(())) => {
                    tracing::debug!(
                        sink = self.sink.name(),
                        image = %image_path.display(),
                        title = %request.title,
                        "Upload accepted"
                    );
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_) => UploadError::Timeout {
                    path: image_path.clone(),
                    timeout_ms: self.options.timeout_ms,
                },
            };
            let retryable = retry::is_retryable(&error);
            last_error = Some(error);
            if !retryable {
                break;
            }
        }

        Err(last_error.unwrap_or_else(|| UploadError::SinkUnavailable {
            message: "no upload attempt was made".to_string(),
            status_code: None,
        }))
    }
}
