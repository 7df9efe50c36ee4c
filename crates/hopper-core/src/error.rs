//! Error types for the Hopper arrival pipeline.
//!
//! Errors are organized by stage so that every log line carries the file it
//! concerns. None of these are fatal to the process: the arrival handler turns
//! each one into a log entry and, where policy says so, a relocation.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Hopper operations.
#[derive(Error, Debug)]
pub enum HopperError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Watch subscription errors
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Descriptor validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Relocation errors
    #[error("Relocation error: {0}")]
    Relocation(#[from] RelocationError),

    /// Upload errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while reading and parsing a descriptor file.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The descriptor could not be read from disk
    #[error("Cannot read descriptor {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON or a shape that does not match the descriptor schema
    #[error("Invalid descriptor {path}: {message}")]
    InvalidDescriptor { path: PathBuf, message: String },

    /// The descriptor points at an image outside the watch directory
    #[error("Descriptor {path} references {image} outside the watch directory")]
    OutsideWatchTarget { path: PathBuf, image: PathBuf },
}

impl ValidationError {
    /// Whether this error means the descriptor content itself is bad input.
    ///
    /// Bad input is discarded; an unreadable file is left where it is.
    pub fn is_bad_input(&self) -> bool {
        !matches!(self, ValidationError::UnreadableFile { .. })
    }
}

/// Errors raised while moving a file into a terminal directory.
#[derive(Error, Debug)]
pub enum RelocationError {
    /// The source path disappeared before it could be moved
    #[error("Source no longer exists: {0}")]
    SourceMissing(PathBuf),

    /// A file with the same name already sits in the destination
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The terminal directory could not be created
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The move itself failed
    #[error("Cannot move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the upload adapter.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The referenced file is not an image (by extension or content)
    #[error("Not an image: {0}")]
    NotAnImage(PathBuf),

    /// The referenced image does not exist or cannot be opened
    #[error("Cannot read image {path}: {message}")]
    SourceUnreadable { path: PathBuf, message: String },

    /// The sink could not be reached or answered with a transient failure
    #[error("Sink unavailable: {message}")]
    SinkUnavailable {
        message: String,
        status_code: Option<u16>,
    },

    /// The sink refused the upload
    #[error("Sink rejected upload: {message}")]
    SinkRejected { message: String },

    /// The sink call exceeded the configured timeout
    #[error("Upload of {path} timed out after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },
}

/// Errors raised when the author lookup fails. Never fatal to an upload.
#[derive(Error, Debug)]
pub enum LookupError {
    /// No credentials file exists for the key
    #[error("No author registered for key {0:?}")]
    UnknownKey(String),

    /// The key contains characters that cannot name a credentials file
    #[error("Malformed author key {0:?}")]
    MalformedKey(String),

    /// The credentials file exists but could not be read or parsed
    #[error("Cannot read credentials for key {key:?}: {message}")]
    Unreadable { key: String, message: String },
}

/// Errors raised while establishing a directory subscription.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watch directory or one of its terminal siblings could not be created
    #[error("Cannot prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem notification backend refused the subscription
    #[error("Cannot subscribe to {path}: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The pipeline stopped accepting events
    #[error("Pipeline is shut down")]
    PipelineClosed,
}

/// Convenience type alias for Hopper results.
pub type Result<T> = std::result::Result<T, HopperError>;
