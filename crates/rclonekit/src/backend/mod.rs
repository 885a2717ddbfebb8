use std::path::Path;

use crate::error::Result;
use crate::types::{CheckOutcome, CopyOutcome, Remote};

pub mod rclone;

/// Backend trait for transfer operations
///
/// This trait abstracts the transfer tool, allowing us to:
/// - Shell out to rclone in production
/// - Mock transfers and checks in tests
pub trait Backend: Send + Sync {
    /// Whether the tool can be run at all. Backends without an external
    /// dependency are always available.
    fn is_available(&self) -> bool {
        true
    }

    /// Copy a local folder to a remote location.
    ///
    /// A transfer that ran and failed is `Ok(CopyOutcome::Failed { .. })`.
    fn copy(&self, source: &Path, destination: &Remote) -> Result<CopyOutcome>;

    /// Check whether every file under `source` is present on the remote.
    fn check(&self, source: &Path, destination: &Remote) -> Result<CheckOutcome>;
}
