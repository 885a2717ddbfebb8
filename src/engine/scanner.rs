//! Folder scanner
//!
//! Lists the immediate subfolders of every mapped root, skips those already
//! waiting in the ledger, and orders each root's folders oldest first.

use chrono::{DateTime, Local};
use ledger::Entries;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::mapping::{MappingRule, MappingTable};

/// A folder eligible for upload in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFolder {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Local>,
}

/// Filesystem queries the scanner needs for each folder
pub trait FolderProbe {
    /// Total size of regular files under `path`
    fn size_of(&self, path: &Path) -> io::Result<u64>;

    /// When the folder came into existence locally
    fn created_at(&self, path: &Path) -> io::Result<DateTime<Local>>;
}

/// Probe backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProbe;

impl FolderProbe for LocalProbe {
    fn size_of(&self, path: &Path) -> io::Result<u64> {
        let mut total = 0u64;
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total = total.saturating_add(entry.metadata()?.len());
            }
        }
        Ok(total)
    }

    fn created_at(&self, path: &Path) -> io::Result<DateTime<Local>> {
        let metadata = fs::metadata(path)?;

        if let Ok(created) = metadata.created() {
            return Ok(DateTime::<Local>::from(created));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
            if let Some(ctime) = DateTime::from_timestamp(metadata.ctime(), nanos) {
                return Ok(ctime.with_timezone(&Local));
            }
        }

        Ok(DateTime::<Local>::from(metadata.modified()?))
    }
}

/// A mapped root whose folders could not be read
#[derive(Debug)]
pub struct FailedRoot {
    pub root: PathBuf,
    pub path: PathBuf,
    pub error: io::Error,
}

/// Result of scanning every mapped root
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Candidates in rule order, oldest first within each rule
    pub candidates: Vec<CandidateFolder>,
    /// Folders skipped because they are waiting for cleanup
    pub skipped_in_ledger: Vec<PathBuf>,
    /// Roots that do not exist (not an error)
    pub missing_roots: Vec<PathBuf>,
    /// Roots whose whole contribution was discarded
    pub failed_roots: Vec<FailedRoot>,
}

impl ScanReport {
    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size_bytes).sum()
    }

    pub fn has_errors(&self) -> bool {
        !self.failed_roots.is_empty()
    }
}

/// Scan every rule of `mapping`.
///
/// `on_folder` is called before each folder is measured, so a caller can
/// show progress while sizes are computed.
pub fn scan(
    mapping: &MappingTable,
    pending: &Entries,
    probe: &dyn FolderProbe,
    on_folder: &mut dyn FnMut(&Path),
) -> ScanReport {
    let mut report = ScanReport::default();

    for rule in mapping.rules() {
        let scanned = match rule.local_root.try_exists() {
            Ok(true) => scan_rule(rule, pending, probe, on_folder),
            Ok(false) => {
                log::info!("Skipping missing root {}", rule.local_root.display());
                report.missing_roots.push(rule.local_root.clone());
                continue;
            }
            Err(error) => Err((rule.local_root.clone(), error)),
        };

        match scanned {
            Ok((mut candidates, mut skipped)) => {
                log::debug!(
                    "{}: {} candidates, {} pending cleanup",
                    rule.local_root.display(),
                    candidates.len(),
                    skipped.len()
                );
                report.candidates.append(&mut candidates);
                report.skipped_in_ledger.append(&mut skipped);
            }
            Err((path, error)) => {
                log::error!(
                    "Could not scan {} ({}): {}",
                    rule.local_root.display(),
                    path.display(),
                    error
                );
                report.failed_roots.push(FailedRoot {
                    root: rule.local_root.clone(),
                    path,
                    error,
                });
            }
        }
    }

    report
}

type RuleScan = (Vec<CandidateFolder>, Vec<PathBuf>);

/// All-or-nothing scan of one root; the error names the path that failed
fn scan_rule(
    rule: &MappingRule,
    pending: &Entries,
    probe: &dyn FolderProbe,
    on_folder: &mut dyn FnMut(&Path),
) -> Result<RuleScan, (PathBuf, io::Error)> {
    let root = rule.local_root.as_path();

    let mut folders = Vec::new();
    for entry in fs::read_dir(root).map_err(at(root))? {
        let entry = entry.map_err(at(root))?;
        let path = entry.path();
        // Follows symlinks, so a linked folder counts as a folder
        if fs::metadata(&path).map_err(at(&path))?.is_dir() {
            // Remote paths and ledger keys are text
            if path.to_str().is_none() {
                return Err((
                    path,
                    io::Error::new(io::ErrorKind::InvalidData, "folder name is not valid UTF-8"),
                ));
            }
            folders.push(path);
        }
    }

    let mut candidates = Vec::new();
    let mut skipped = Vec::new();
    for path in folders {
        if pending.contains(&path) {
            log::info!("Skipping {} (waiting for cleanup)", path.display());
            skipped.push(path);
            continue;
        }

        on_folder(&path);
        let created_at = probe.created_at(&path).map_err(at(&path))?;
        let size_bytes = probe.size_of(&path).map_err(at(&path))?;
        log::debug!(
            "{} created {} ({} bytes)",
            path.display(),
            created_at.format("%y-%m-%d %H:%M:%S"),
            size_bytes
        );
        candidates.push(CandidateFolder {
            path,
            size_bytes,
            created_at,
        });
    }

    candidates.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.path.cmp(&b.path))
    });
    skipped.sort();

    Ok((candidates, skipped))
}

fn at(path: &Path) -> impl FnOnce(io::Error) -> (PathBuf, io::Error) {
    let path = path.to_path_buf();
    move |e| (path, e)
}

// ============================================================================
// Tests
// ============================================================================
