use serde::{Deserialize, Serialize};
use std::fmt;

/// A location on an rclone remote, rendered as `drive:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Remote {
    /// rclone remote name (e.g. `paula`)
    pub drive: String,
    /// Path inside the remote, usually starting with `/`
    pub path: String,
}

impl Remote {
    /// Create a remote location. A trailing `:` on the drive name is dropped.
    pub fn new(drive: impl Into<String>, path: impl Into<String>) -> Self {
        let drive = drive.into();
        let drive = drive.strip_suffix(':').map(str::to_string).unwrap_or(drive);
        Self {
            drive,
            path: path.into(),
        }
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.drive, self.path)
    }
}

/// Result of a single `rclone copy` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyOutcome {
    /// rclone exited successfully
    Copied,
    /// rclone ran but reported failure (quota hit, auth error, ...)
    Failed {
        /// Exit code, if the process was not killed by a signal
        exit_code: Option<i32>,
    },
}

impl CopyOutcome {
    /// Returns true if the copy succeeded
    pub fn is_copied(&self) -> bool {
        matches!(self, Self::Copied)
    }
}

/// Result of a single `rclone check` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckOutcome {
    /// Every local file is present and identical on the remote
    FullyPresent,
    /// The remote copy is incomplete or differs
    Mismatch {
        /// Number of `ERROR` lines reported by rclone
        differences: usize,
    },
}

impl CheckOutcome {
    /// Returns true if the remote copy is complete
    pub fn is_fully_present(&self) -> bool {
        matches!(self, Self::FullyPresent)
    }
}

/// Options for the rclone subprocess backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcloneOptions {
    /// Program to execute
    pub binary: String,
    /// Extra flags passed to `rclone copy` before the source and destination
    pub copy_flags: Vec<String>,
    /// Extra flags passed to `rclone check`
    pub check_flags: Vec<String>,
}

impl Default for RcloneOptions {
    fn default() -> Self {
        Self {
            binary: "rclone".to_string(),
            copy_flags: default_copy_flags(),
            check_flags: Vec::new(),
        }
    }
}

/// Flags that make Google Drive remotes fail fast once the daily upload
/// limit is hit instead of retrying for hours.
pub fn default_copy_flags() -> Vec<String> {
    [
        "--progress",
        "--drive-upload-cutoff",
        "1000T",
        "--drive-stop-on-upload-limit",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}
