//! Error types for the ledger crate

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing a ledger-related file failed
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ledger file exists but is not a JSON object of strings
    #[error("ledger file is corrupt: {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An entry carries a timestamp we cannot parse
    #[error("invalid timestamp {value:?} for {}", .folder.display())]
    InvalidTimestamp { folder: PathBuf, value: String },

    /// Entries are never updated in place
    #[error("folder is already recorded: {}", .0.display())]
    AlreadyRecorded(PathBuf),

    /// Keys are stored as JSON strings, so paths must be valid UTF-8
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// Gave up waiting for the ledger lock
    #[error("timed out after {:.1}s waiting for lock {}", .waited.as_secs_f64(), .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Serializing the ledger failed
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;
