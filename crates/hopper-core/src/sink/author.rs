//! Author display-name lookup.
//!
//! Descriptors carry an opaque key; the display name shown as the upload
//! title comes from a credentials directory holding one `<key>.toml` file per
//! author:
//!
//! ```toml
//! display_name = "Alice Liddell"
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::LookupError;

/// Title used when the descriptor names no author.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Title used when the author lookup fails.
pub const UNKNOWN_AUTHOR: &str = "Author Unknown";

/// Resolves author keys to display names.
#[async_trait]
pub trait AuthorDirectory: Send + Sync {
    /// Look up the display name registered for `key`.
    async fn display_name(&self, key: &str) -> Result<String, LookupError>;
}

/// Resolve the upload title for an optional author key.
///
/// Lookup failures are logged and replaced by [`UNKNOWN_AUTHOR`]; they never
/// fail the upload.
pub async fn resolve_author(authors: &dyn AuthorDirectory, key: Option<&str>) -> String {
    let Some(key) = key else {
        return ANONYMOUS_AUTHOR.to_string();
    };
    match authors.display_name(key).await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!("Author lookup failed, using fallback: {e}");
            UNKNOWN_AUTHOR.to_string()
        }
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    display_name: String,
}

/// File-backed author directory.
#[derive(Debug, Clone)]
pub struct CredentialsDirectory {
    dir: PathBuf,
}

impl CredentialsDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, key: &str) -> Result<PathBuf, LookupError> {
        let malformed = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains('/')
            || key.contains('\\')
            || Path::new(key).is_absolute();
        if malformed {
            return Err(LookupError::MalformedKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.toml")))
    }
}

#[async_trait]
impl AuthorDirectory for CredentialsDirectory {
    async fn display_name(&self, key: &str) -> Result<String, LookupError> {
        let path = self.file_for(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LookupError::UnknownKey(key.to_string()));
            }
            Err(e) => {
                return Err(LookupError::Unreadable {
                    key: key.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let file: CredentialsFile =
            toml::from_str(&content).map_err(|e| LookupError::Unreadable {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let name = file.display_name.trim();
        if name.is_empty() {
            return Err(LookupError::Unreadable {
                key: key.to_string(),
                message: "display_name is empty".to_string(),
            });
        }
        Ok(name.to_string())
    }
}
