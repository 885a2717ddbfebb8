//! # rclonekit
//!
//! A small Rust client for the two rclone operations an upload pipeline needs:
//!
//! - **Copy**: push a local folder to `drive:path`. A failed transfer is a
//!   normal outcome ([`CopyOutcome::Failed`]) so callers can try another drive.
//! - **Check**: ask rclone whether every local file is present remotely.
//!
//! There is intentionally NO remote delete operation in this crate.
//!
//! ## Example
//!
//! ```no_run
//! use rclonekit::{Client, RcloneOptions, Remote};
//! use std::path::Path;
//!
//! let client = Client::new(RcloneOptions::default());
//! let remote = Remote::new("paula", "/movies/Alien (1979)");
//!
//! if client.copy(Path::new("/media/movies/Alien (1979)"), &remote)?.is_copied() {
//!     let check = client.check(Path::new("/media/movies/Alien (1979)"), &remote)?;
//!     println!("fully present: {}", check.is_fully_present());
//! }
//! # Ok::<(), rclonekit::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

/// Backend implementations for transfer operations.
pub mod backend;
/// Error types for rclone operations.
pub mod error;
/// Common types for remotes and operation outcomes.
pub mod types;

pub use backend::Backend;
pub use error::{Error, Result};
pub use types::{CheckOutcome, CopyOutcome, RcloneOptions, Remote, default_copy_flags};

use backend::rclone::RcloneBackend;
use std::path::Path;

/// High-level client for rclone operations.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a new Client backed by the rclone binary.
    pub fn new(options: RcloneOptions) -> Self {
        Self {
            backend: Box::new(RcloneBackend::new(options)),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Whether the transfer tool can be run.
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Copy a local folder to `destination`.
    pub fn copy(&self, source: impl AsRef<Path>, destination: &Remote) -> Result<CopyOutcome> {
        self.backend.copy(source.as_ref(), destination)
    }

    /// Verify a local folder against `destination`. Runs exactly one check.
    pub fn check(&self, source: impl AsRef<Path>, destination: &Remote) -> Result<CheckOutcome> {
        self.backend.check(source.as_ref(), destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Backend for Fixed {
        fn copy(&self, _source: &Path, destination: &Remote) -> Result<CopyOutcome> {
            if destination.drive == "full" {
                Ok(CopyOutcome::Failed { exit_code: Some(7) })
            } else {
                Ok(CopyOutcome::Copied)
            }
        }

        fn check(&self, _source: &Path, _destination: &Remote) -> Result<CheckOutcome> {
            Ok(CheckOutcome::Mismatch { differences: 3 })
        }
    }

    #[test]
    fn test_client_delegates_to_backend() {
        let client = Client::with_backend(Box::new(Fixed));
        let remote = Remote::new("d1", "/tv/Show");

        assert!(client.is_available());

        assert!(client.copy("/local/tv/Show", &remote).unwrap().is_copied());
        assert_eq!(
            client
                .copy("/local/tv/Show", &Remote::new("full", "/tv/Show"))
                .unwrap(),
            CopyOutcome::Failed { exit_code: Some(7) }
        );
        assert_eq!(
            client.check("/local/tv/Show", &remote).unwrap(),
            CheckOutcome::Mismatch { differences: 3 }
        );
    }
}
