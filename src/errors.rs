//! Notification Log Error Hierarchy
//!
//! Error types for the notification log service, categorized by layer:
//! storage engine failures, malformed client requests, and per-session
//! streaming failures.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage engine and persistence failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Malformed client requests, surfaced as 4xx responses
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Failures scoped to one streaming session
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during volume operations
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    Db(#[from] sled::Error),

    /// Serialization failures for persisted records
    #[error("Stored record serialization failed: {0}")]
    Record(#[from] serde_json::Error),

    /// Checksum/shape validation failures on stored data
    #[error("Data corruption detected at {location}")]
    Corruption { location: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Request body is not the JSON object the append endpoint expects
    #[error("body is not a valid JSON object: {0}")]
    InvalidBody(String),

    /// Malformed numeric query parameter
    #[error("invalid '{param}': {reason}")]
    InvalidParam { param: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection closed by peer")]
    PeerClosed,

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("failed to read frame: {0}")]
    Receive(String),

    #[error("notification read failed: {0}")]
    StoreRead(String),
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Storage(StorageError::Db(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(StorageError::Record(e))
    }
}
