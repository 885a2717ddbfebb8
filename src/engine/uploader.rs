//! Upload coordinator
//!
//! Copies selected folders one at a time. A drive that fails a copy is
//! treated as out of quota for the rest of the run, so the drive index only
//! ever moves forward. Each success is recorded in the ledger before the next
//! folder starts.

use chrono::Local;
use ledger::Ledger;
use rclonekit::{Client, CopyOutcome, Remote};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::scanner::CandidateFolder;
use crate::mapping::MappingTable;

/// Errors that abort an upload run
#[derive(Error, Debug)]
pub enum UploadError {
    /// Every scanned folder comes from a mapped root, so this is a bug
    #[error("no mapping rule covers {} (scanner and mapping disagree)", .0.display())]
    Unmapped(PathBuf),

    #[error("transfer tool failed: {0}")]
    Transfer(#[from] rclonekit::Error),

    #[error("ledger update failed: {0}")]
    Ledger(#[from] ledger::Error),
}

/// How an upload run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every selected folder was uploaded
    Completed,
    /// All drives failed while uploading `folder`
    DrivesExhausted {
        folder: PathBuf,
        /// Folders left unuploaded, `folder` included
        remaining: usize,
    },
}

/// What one upload run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: Vec<(PathBuf, Remote)>,
    pub attempts: usize,
    /// Index of the drive in use when the run ended
    pub drive_index: usize,
    pub outcome: UploadOutcome,
}

/// Progress notifications, in the order they happen
#[derive(Debug, Clone, Copy)]
pub enum UploadEvent<'a> {
    Attempt {
        index: usize,
        total: usize,
        folder: &'a Path,
        destination: &'a Remote,
    },
    Failed {
        folder: &'a Path,
        drive: &'a str,
        exit_code: Option<i32>,
    },
    Uploaded {
        folder: &'a Path,
        destination: &'a Remote,
    },
    /// The ledger already held the folder (another upload run raced us)
    AlreadyRecorded { folder: &'a Path },
}

/// Upload `selected` in order, falling back across `drives`.
pub fn upload(
    selected: &[CandidateFolder],
    mapping: &MappingTable,
    drives: &[String],
    client: &Client,
    ledger: &Ledger,
    on_event: &mut dyn FnMut(UploadEvent<'_>),
) -> Result<UploadReport, UploadError> {
    let mut report = UploadReport {
        uploaded: Vec::new(),
        attempts: 0,
        drive_index: 0,
        outcome: UploadOutcome::Completed,
    };
    let total = selected.len();

    for (i, candidate) in selected.iter().enumerate() {
        let folder = candidate.path.as_path();
        let rule = mapping
            .resolve(folder)
            .ok_or_else(|| UploadError::Unmapped(folder.to_path_buf()))?;

        let destination = loop {
            let Some(drive) = drives.get(report.drive_index) else {
                log::error!("No more drives available, stopping at {}", folder.display());
                report.outcome = UploadOutcome::DrivesExhausted {
                    folder: folder.to_path_buf(),
                    remaining: total - i,
                };
                return Ok(report);
            };

            let destination = rule
                .destination_for(folder, drive)
                .ok_or_else(|| UploadError::Unmapped(folder.to_path_buf()))?;

            on_event(UploadEvent::Attempt {
                index: i + 1,
                total,
                folder,
                destination: &destination,
            });
            report.attempts += 1;

            match client.copy(folder, &destination)? {
                CopyOutcome::Copied => break destination,
                CopyOutcome::Failed { exit_code } => {
                    log::warn!(
                        "Upload of {} to drive {} failed (exit {:?}), switching drive",
                        folder.display(),
                        drive,
                        exit_code
                    );
                    on_event(UploadEvent::Failed {
                        folder,
                        drive,
                        exit_code,
                    });
                    report.drive_index += 1;
                }
            }
        };

        match ledger.record(folder, Local::now()) {
            Ok(()) => {}
            Err(ledger::Error::AlreadyRecorded(_)) => {
                log::warn!("{} was already recorded for cleanup", folder.display());
                on_event(UploadEvent::AlreadyRecorded { folder });
            }
            Err(e) => return Err(e.into()),
        }

        on_event(UploadEvent::Uploaded {
            folder,
            destination: &destination,
        });
        report.uploaded.push((folder.to_path_buf(), destination));
    }

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{MockBackend, calls_of};
    use crate::mapping::MappingRule;

    fn folder(path: &str) -> CandidateFolder {
        CandidateFolder {
            path: PathBuf::from(path),
            size_bytes: 1,
            created_at: Local::now(),
        }
    }

    fn mapping() -> MappingTable {
        MappingTable::new(vec![
            MappingRule::new("/local/movies", "/remote/movies"),
            MappingRule::new("/local/anime", "/剧集/动漫剧"),
        ])
    }

    fn drives(names: &[&str]) -> Vec<String> {
        names.iter().map(|d| d.to_string()).collect()
    }

    fn ledger_in(dir: &tempfile::TempDir) -> Ledger {
        Ledger::open(dir.path().join("wait_cleanup.json"))
    }

    fn run(
        selected: &[CandidateFolder],
        drive_names: &[&str],
        backend: MockBackend,
        ledger: &Ledger,
    ) -> (Result<UploadReport, UploadError>, crate::engine::testing::CallLog) {
        let (client, calls) = backend.into_client();
        let result = upload(
            selected,
            &mapping(),
            &drives(drive_names),
            &client,
            ledger,
            &mut |_| {},
        );
        (result, calls)
    }

    #[test]
    fn test_uploads_all_and_records_each() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let selected = [folder("/local/movies/A"), folder("/local/anime/葬送的芙莉莲")];

        let (result, calls) = run(&selected, &["d1", "d2"], MockBackend::default(), &ledger);
        let report = result.unwrap();

        assert_eq!(report.outcome, UploadOutcome::Completed);
        assert_eq!(report.attempts, 2);
        assert_eq!(
            calls_of(&calls, "copy"),
            vec![
                (PathBuf::from("/local/movies/A"), "d1:/remote/movies/A".to_string()),
                (
                    PathBuf::from("/local/anime/葬送的芙莉莲"),
                    "d1:/剧集/动漫剧/葬送的芙莉莲".to_string()
                ),
            ]
        );

        let entries = ledger.load().unwrap();
        assert!(entries.contains(Path::new("/local/movies/A")));
        assert!(entries.contains(Path::new("/local/anime/葬送的芙莉莲")));
    }

    #[test]
    fn test_failed_drive_is_not_revisited_for_next_folder() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let selected = [folder("/local/movies/A"), folder("/local/movies/B")];
        let backend = MockBackend::default().fail_copy("/local/movies/A", "d1");

        let (result, calls) = run(&selected, &["d1", "d2"], backend, &ledger);
        let report = result.unwrap();

        assert_eq!(
            calls_of(&calls, "copy")
                .into_iter()
                .map(|(_, remote)| remote)
                .collect::<Vec<_>>(),
            vec![
                "d1:/remote/movies/A",
                "d2:/remote/movies/A",
                "d2:/remote/movies/B",
            ]
        );
        assert_eq!(report.drive_index, 1);
        assert_eq!(report.uploaded[0].1.drive, "d2");
        assert_eq!(report.outcome, UploadOutcome::Completed);
        assert_eq!(ledger.load().unwrap().len(), 2);
    }

    #[test]
    fn test_single_drive_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let selected = [folder("/local/movies/A"), folder("/local/movies/B")];
        let backend = MockBackend::default().fail_drive("d1");

        let (result, calls) = run(&selected, &["d1"], backend, &ledger);
        let report = result.unwrap();

        assert_eq!(
            report.outcome,
            UploadOutcome::DrivesExhausted {
                folder: PathBuf::from("/local/movies/A"),
                remaining: 2,
            }
        );
        // B is never attempted and nothing is recorded
        assert_eq!(calls_of(&calls, "copy").len(), 1);
        assert!(report.uploaded.is_empty());
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_exhaustion_keeps_earlier_successes() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let selected = [
            folder("/local/movies/A"),
            folder("/local/movies/B"),
            folder("/local/movies/C"),
        ];
        let backend = MockBackend::default()
            .fail_copy("/local/movies/B", "d1")
            .fail_copy("/local/movies/B", "d2");

        let (result, _) = run(&selected, &["d1", "d2"], backend, &ledger);
        let report = result.unwrap();

        assert_eq!(
            report.outcome,
            UploadOutcome::DrivesExhausted {
                folder: PathBuf::from("/local/movies/B"),
                remaining: 2,
            }
        );
        let entries = ledger.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains(Path::new("/local/movies/A")));
    }

    #[test]
    fn test_unmapped_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let selected = [folder("/somewhere/else/X")];

        let (result, calls) = run(&selected, &["d1"], MockBackend::default(), &ledger);
        assert!(matches!(result, Err(UploadError::Unmapped(_))));
        assert!(calls_of(&calls, "copy").is_empty());
    }

    #[test]
    fn test_already_recorded_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let earlier = Local::now() - chrono::Duration::hours(1);
        ledger.record(Path::new("/local/movies/A"), earlier).unwrap();

        let (result, _) = run(
            &[folder("/local/movies/A")],
            &["d1"],
            MockBackend::default(),
            &ledger,
        );
        assert_eq!(result.unwrap().outcome, UploadOutcome::Completed);

        // Original timestamp kept
        let stored = ledger.load().unwrap().get(Path::new("/local/movies/A")).unwrap();
        assert_eq!(stored.timestamp(), earlier.timestamp());
    }

    #[test]
    fn test_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let (client, _) = MockBackend::default().fail_drive("d1").into_client();

        let mut seen = Vec::new();
        upload(
            &[folder("/local/movies/A")],
            &mapping(),
            &drives(&["d1", "d2"]),
            &client,
            &ledger,
            &mut |event| {
                seen.push(match event {
                    UploadEvent::Attempt { destination, .. } => format!("try {destination}"),
                    UploadEvent::Failed { drive, .. } => format!("fail {drive}"),
                    UploadEvent::Uploaded { destination, .. } => format!("ok {destination}"),
                    UploadEvent::AlreadyRecorded { .. } => "dup".to_string(),
                })
            },
        )
        .unwrap();

        assert_eq!(
            seen,
            vec![
                "try d1:/remote/movies/A",
                "fail d1",
                "try d2:/remote/movies/A",
                "ok d2:/remote/movies/A",
            ]
        );
    }

    #[test]
    fn test_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let (result, calls) = run(&[], &["d1"], MockBackend::default(), &ledger);
        let report = result.unwrap();
        assert_eq!(report.outcome, UploadOutcome::Completed);
        assert!(calls.lock().unwrap().is_empty());
    }
}
