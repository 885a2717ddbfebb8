use thiserror::Error;

/// Errors that can occur while driving rclone.
///
/// A transfer that runs but exits non-zero is NOT an error here; it is
/// reported as [`CopyOutcome::Failed`](crate::CopyOutcome::Failed) so callers
/// can fall back to another drive. Errors mean the tool could not be run at all.
#[derive(Debug, Error)]
pub enum Error {
    /// rclone binary not found in PATH
    #[error("rclone not found: {0}")]
    RcloneNotFound(String),

    /// rclone could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns true if the transfer tool itself is unusable, so no drive
    /// fallback can help.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Error::RcloneNotFound(_))
    }
}

/// Result type for rclone operations
pub type Result<T> = std::result::Result<T, Error>;
