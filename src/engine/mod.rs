//! Offload engine
//!
//! One upload run flows through:
//! 1. Scanning - List candidate folders under each mapped root
//! 2. Selecting - Trim the candidates to the daily quota
//! 3. Uploading - Copy each folder, falling back across drives
//!
//! A separately scheduled cleanup run drives the sweeper, which verifies and
//! deletes folders whose grace period has passed.

pub mod scanner;
pub mod selector;
pub mod sweeper;
pub mod uploader;

#[cfg(test)]
pub(crate) mod testing;

pub use scanner::{LocalProbe, ScanReport, scan};
pub use selector::{Selection, select};
pub use sweeper::{SweepEvent, SweepOptions, SweepReport, sweep};
pub use uploader::{UploadEvent, UploadOutcome, upload};
