//! Recording rclone backend for engine tests

use rclonekit::{Backend, CheckOutcome, Client, CopyOutcome, Remote};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub source: PathBuf,
    pub remote: String,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Default)]
pub struct MockBackend {
    calls: CallLog,
    failing_drives: HashSet<String>,
    failing_copies: HashSet<(PathBuf, String)>,
    mismatched: HashSet<PathBuf>,
}

impl MockBackend {
    /// Every copy to `drive` fails
    pub fn fail_drive(mut self, drive: &str) -> Self {
        self.failing_drives.insert(drive.to_string());
        self
    }

    /// Copying `folder` to `drive` fails
    pub fn fail_copy(mut self, folder: impl Into<PathBuf>, drive: &str) -> Self {
        self.failing_copies.insert((folder.into(), drive.to_string()));
        self
    }

    /// `check` reports missing files for `folder`
    pub fn mismatch(mut self, folder: impl Into<PathBuf>) -> Self {
        self.mismatched.insert(folder.into());
        self
    }

    pub fn into_client(self) -> (Client, CallLog) {
        let calls = Arc::clone(&self.calls);
        (Client::with_backend(Box::new(self)), calls)
    }

    fn log(&self, op: &'static str, source: &Path, destination: &Remote) {
        self.calls.lock().unwrap().push(Call {
            op,
            source: source.to_path_buf(),
            remote: destination.to_string(),
        });
    }
}

impl Backend for MockBackend {
    fn copy(&self, source: &Path, destination: &Remote) -> rclonekit::Result<CopyOutcome> {
        self.log("copy", source, destination);
        let fails = self.failing_drives.contains(&destination.drive)
            || self
                .failing_copies
                .contains(&(source.to_path_buf(), destination.drive.clone()));
        if fails {
            Ok(CopyOutcome::Failed { exit_code: Some(7) })
        } else {
            Ok(CopyOutcome::Copied)
        }
    }

    fn check(&self, source: &Path, destination: &Remote) -> rclonekit::Result<CheckOutcome> {
        self.log("check", source, destination);
        if self.mismatched.contains(source) {
            Ok(CheckOutcome::Mismatch { differences: 2 })
        } else {
            Ok(CheckOutcome::FullyPresent)
        }
    }
}

/// Calls of one kind, rendered as `source -> remote`
pub fn calls_of(log: &CallLog, op: &str) -> Vec<(PathBuf, String)> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|c| c.op == op)
        .map(|c| (c.source.clone(), c.remote.clone()))
        .collect()
}
