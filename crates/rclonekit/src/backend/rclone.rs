//! rclone backend implementation.
//!
//! Shells out to the `rclone` binary. `copy` inherits stdio so rclone's own
//! `--progress` output reaches the terminal; `check` captures output so it can
//! be inspected for `ERROR` lines.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};
use crate::types::{CheckOutcome, CopyOutcome, RcloneOptions, Remote};

use super::Backend;

/// Backend implementation using the rclone CLI.
pub struct RcloneBackend {
    options: RcloneOptions,
}

impl RcloneBackend {
    /// Create a backend with the given options. Does not touch the system.
    pub fn new(options: RcloneOptions) -> Self {
        Self { options }
    }

    fn map_spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RcloneNotFound(self.options.binary.clone())
        } else {
            Error::Spawn {
                program: self.options.binary.clone(),
                source: e,
            }
        }
    }

    fn run_check(&self, source: &Path, destination: &str) -> Result<Output> {
        Command::new(&self.options.binary)
            .arg("check")
            .args(&self.options.check_flags)
            .arg(source)
            .arg(destination)
            .output()
            .map_err(|e| self.map_spawn_error(e))
    }
}

/// Count the lines rclone flags as errors.
fn count_error_lines(output: &str) -> usize {
    output.lines().filter(|line| line.contains("ERROR")).count()
}

impl Backend for RcloneBackend {
    fn is_available(&self) -> bool {
        Command::new(&self.options.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn copy(&self, source: &Path, destination: &Remote) -> Result<CopyOutcome> {
        let destination = destination.to_string();

        log::debug!(
            "{} copy {} {} {}",
            self.options.binary,
            self.options.copy_flags.join(" "),
            source.display(),
            destination
        );

        let status = Command::new(&self.options.binary)
            .arg("copy")
            .args(&self.options.copy_flags)
            .arg(source)
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| self.map_spawn_error(e))?;

        if status.success() {
            Ok(CopyOutcome::Copied)
        } else {
            Ok(CopyOutcome::Failed {
                exit_code: status.code(),
            })
        }
    }

    fn check(&self, source: &Path, destination: &Remote) -> Result<CheckOutcome> {
        let destination = destination.to_string();

        let output = self.run_check(source, &destination)?;

        // rclone logs differences to stderr, older versions to stdout
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let differences = count_error_lines(&stdout) + count_error_lines(&stderr);

        log::debug!(
            "check {} -> {}: status {:?}, {} error line(s)",
            source.display(),
            destination,
            output.status.code(),
            differences
        );

        if output.status.success() && differences == 0 {
            Ok(CheckOutcome::FullyPresent)
        } else {
            Ok(CheckOutcome::Mismatch {
                differences: differences.max(1),
            })
        }
    }
}
