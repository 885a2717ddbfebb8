//! Cleanup sweeper
//!
//! Retires ledger entries whose grace period has passed. The local folder is
//! deleted only when the primary drive holds a complete copy; otherwise the
//! entry is still retired and the folder is picked up again by a later upload
//! run.
//!
//! Due entries are snapshotted under the ledger lock, then verified one at a
//! time without the lock held (a check can take hours). Each entry is retired
//! in its own transaction right after its decision.

use chrono::{DateTime, Local};
use ledger::Ledger;
use rclonekit::{CheckOutcome, Client, Remote};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::mapping::MappingTable;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("transfer tool failed: {0}")]
    Transfer(#[from] rclonekit::Error),

    #[error("ledger update failed: {0}")]
    Ledger(#[from] ledger::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    /// Minimum age of an entry before it is verified
    pub grace: Duration,
    /// Report what would be verified without checking, deleting or retiring
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub deleted: Vec<PathBuf>,
    /// Retired without deleting because the remote copy is incomplete
    pub kept_mismatch: Vec<PathBuf>,
    /// Retired without checking because the folder no longer exists
    pub already_gone: Vec<PathBuf>,
    /// Verified but could not be deleted; retired anyway
    pub delete_failed: Vec<PathBuf>,
    /// Left in the ledger because no mapping rule covers them
    pub unmapped: Vec<PathBuf>,
    /// Left in the ledger because the local folder could not be inspected
    pub unreadable: Vec<PathBuf>,
    /// Dry run only
    pub would_check: Vec<(PathBuf, Remote)>,
    /// Entries still inside their grace period
    pub not_due: usize,
}

impl SweepReport {
    /// Entries removed from the ledger
    pub fn retired(&self) -> usize {
        self.deleted.len() + self.kept_mismatch.len() + self.already_gone.len() + self.delete_failed.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SweepEvent<'a> {
    Checking {
        index: usize,
        total: usize,
        folder: &'a Path,
        remote: &'a Remote,
    },
    Deleted { folder: &'a Path },
    Mismatch { folder: &'a Path, differences: usize },
    AlreadyGone { folder: &'a Path },
    DeleteFailed { folder: &'a Path, error: &'a io::Error },
    Unreadable { folder: &'a Path, error: &'a io::Error },
    Unmapped { folder: &'a Path },
    WouldCheck { folder: &'a Path, remote: &'a Remote },
}

/// Verify and retire every ledger entry older than the grace period.
///
/// Verification always targets `primary_drive`, whichever drive actually
/// received the upload.
pub fn sweep(
    ledger: &Ledger,
    mapping: &MappingTable,
    primary_drive: &str,
    client: &Client,
    now: DateTime<Local>,
    options: SweepOptions,
    on_event: &mut dyn FnMut(SweepEvent<'_>),
) -> Result<SweepReport, SweepError> {
    let snapshot = ledger.load()?;
    let due = snapshot.due(now, options.grace);

    let mut report = SweepReport {
        not_due: snapshot.len() - due.len(),
        ..Default::default()
    };
    log::info!(
        "{} of {} ledger entries are due for cleanup",
        due.len(),
        snapshot.len()
    );

    let total = due.len();
    for (i, entry) in due.into_iter().enumerate() {
        let folder = entry.path;

        let Some(remote) = mapping.destination_for(&folder, primary_drive) else {
            log::warn!(
                "No mapping rule covers {}, leaving it in the ledger",
                folder.display()
            );
            on_event(SweepEvent::Unmapped { folder: &folder });
            report.unmapped.push(folder);
            continue;
        };

        if options.dry_run {
            on_event(SweepEvent::WouldCheck {
                folder: &folder,
                remote: &remote,
            });
            report.would_check.push((folder, remote));
            continue;
        }

        match folder.try_exists() {
            Ok(true) => {}
            Ok(false) => {
                log::info!("{} is already gone locally", folder.display());
                on_event(SweepEvent::AlreadyGone { folder: &folder });
                retire(ledger, &folder)?;
                report.already_gone.push(folder);
                continue;
            }
            Err(error) => {
                log::error!("Could not inspect {}: {}", folder.display(), error);
                on_event(SweepEvent::Unreadable {
                    folder: &folder,
                    error: &error,
                });
                report.unreadable.push(folder);
                continue;
            }
        }

        on_event(SweepEvent::Checking {
            index: i + 1,
            total,
            folder: &folder,
            remote: &remote,
        });

        match client.check(&folder, &remote)? {
            CheckOutcome::FullyPresent => match fs::remove_dir_all(&folder) {
                Ok(()) => {
                    log::info!("Deleted {}", folder.display());
                    on_event(SweepEvent::Deleted { folder: &folder });
                    retire(ledger, &folder)?;
                    report.deleted.push(folder);
                }
                Err(error) => {
                    log::error!("Could not delete {}: {}", folder.display(), error);
                    on_event(SweepEvent::DeleteFailed {
                        folder: &folder,
                        error: &error,
                    });
                    retire(ledger, &folder)?;
                    report.delete_failed.push(folder);
                }
            },
            CheckOutcome::Mismatch { differences } => {
                log::warn!(
                    "{} differs from {} ({} errors), keeping local copy",
                    folder.display(),
                    remote,
                    differences
                );
                on_event(SweepEvent::Mismatch {
                    folder: &folder,
                    differences,
                });
                retire(ledger, &folder)?;
                report.kept_mismatch.push(folder);
            }
        }
    }

    Ok(report)
}

fn retire(ledger: &Ledger, folder: &Path) -> Result<(), SweepError> {
    if !ledger.retire(folder)? {
        log::debug!("{} was already retired by another run", folder.display());
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
