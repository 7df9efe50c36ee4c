//! Slack sink using the external upload flow.
//!
//! An upload is three calls: reserve an upload URL, POST the bytes to it, then
//! complete the upload into the target channel with a title and comment.

use super::{MessageSink, UploadRequest};
use crate::config::{resolve_env_var, SinkConfig};
use crate::error::{ConfigError, UploadError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Slack Web API sink.
pub struct SlackSink {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(token: &str, api_base: &str) -> Self {
        Self {
            token: token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a sink from config, resolving `${ENV_VAR}` references.
    pub fn from_config(config: &SinkConfig) -> Result<Self, ConfigError> {
        let token = resolve_env_var(&config.token).ok_or_else(|| {
            ConfigError::ValidationError(
                "Slack token not set. Set SLACK_TOKEN or sink.token.".to_string(),
            )
        })?;
        Ok(Self::new(&token, &config.api_base))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct CompleteUploadRequest<'a> {
    files: Vec<FileRef<'a>>,
    channel_id: &'a str,
    initial_comment: &'a str,
}

#[derive(Serialize)]
struct FileRef<'a> {
    id: &'a str,
    title: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
struct UploadUrlResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Map a non-success HTTP status to an upload error.
fn status_error(step: &str, status: StatusCode, body: &str) -> UploadError {
    let message = format!("Slack {step} HTTP {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        UploadError::SinkUnavailable {
            message,
            status_code: Some(status.as_u16()),
        }
    } else {
        UploadError::SinkRejected { message }
    }
}

/// Map an `ok: false` API answer to an upload error.
fn api_error(step: &str, error: Option<String>) -> UploadError {
    let code = error.unwrap_or_else(|| "unknown_error".to_string());
    let message = format!("Slack {step}: {code}");
    if code == "ratelimited" {
        UploadError::SinkUnavailable {
            message,
            status_code: Some(429),
        }
    } else {
        UploadError::SinkRejected { message }
    }
}

fn transport_error(step: &str, e: reqwest::Error) -> UploadError {
    UploadError::SinkUnavailable {
        message: format!("Slack {step} request failed: {e}"),
        status_code: None,
    }
}

async fn ensure_success(
    step: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, UploadError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(status_error(step, status, &text))
}

#[async_trait]
impl MessageSink for SlackSink {
    fn name(&self) -> &str {
        "slack"
    }

    async fn upload(&self, request: &UploadRequest) -> Result<(), UploadError> {
        let length = request.content.len().to_string();
        let resp = self
            .client
            .post(self.method_url("files.getUploadURLExternal"))
            .bearer_auth(&self.token)
            .form(&[
                ("filename", request.filename.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("files.getUploadURLExternal", e))?;
        let reserved: UploadUrlResponse = ensure_success("files.getUploadURLExternal", resp)
            .await?
            .json()
            .await
            .map_err(|e| UploadError::SinkRejected {
                message: format!("Failed to parse Slack upload URL response: {e}"),
            })?;
        if !reserved.ok {
            return Err(api_error("files.getUploadURLExternal", reserved.error));
        }
        let (Some(upload_url), Some(file_id)) = (reserved.upload_url, reserved.file_id) else {
            return Err(UploadError::SinkRejected {
                message: "Slack returned no upload URL".to_string(),
            });
        };

        let resp = self
            .client
            .post(&upload_url)
            .body(request.content.clone())
            .send()
            .await
            .map_err(|e| transport_error("file transfer", e))?;
        ensure_success("file transfer", resp).await?;

        let body = CompleteUploadRequest {
            files: vec![FileRef {
                id: &file_id,
                title: &request.title,
            }],
            channel_id: &request.channel,
            initial_comment: &request.initial_comment,
        };
        let resp = self
            .client
            .post(self.method_url("files.completeUploadExternal"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("files.completeUploadExternal", e))?;
        let completed: ApiResponse = ensure_success("files.completeUploadExternal", resp)
            .await?
            .json()
            .await
            .map_err(|e| UploadError::SinkRejected {
                message: format!("Failed to parse Slack completion response: {e}"),
            })?;
        if !completed.ok {
            return Err(api_error("files.completeUploadExternal", completed.error));
        }

        tracing::debug!(file_id = %file_id, "Slack upload completed");
        Ok(())
    }
}
