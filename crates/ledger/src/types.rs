//! Types for the ledger crate

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// One uploaded folder awaiting verified cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Absolute local path of the uploaded folder
    pub path: PathBuf,
    /// When the upload finished
    pub uploaded_at: DateTime<Local>,
}

impl LedgerEntry {
    /// Time elapsed since the upload, clamped at zero for clock skew
    pub fn age(&self, now: DateTime<Local>) -> chrono::Duration {
        (now - self.uploaded_at).max(chrono::Duration::zero())
    }
}

/// In-memory view of the ledger: folder path -> upload time.
///
/// At most one entry exists per path. Entries are only ever added or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entries {
    map: BTreeMap<PathBuf, DateTime<Local>>,
}

impl Entries {
    /// Create an empty set of entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is awaiting cleanup
    pub fn contains(&self, path: &Path) -> bool {
        self.map.contains_key(path)
    }

    /// Upload time recorded for `path`
    pub fn get(&self, path: &Path) -> Option<DateTime<Local>> {
        self.map.get(path).copied()
    }

    /// Record a new upload. Fails if the path is already present or is not
    /// valid UTF-8.
    pub fn insert(&mut self, path: impl Into<PathBuf>, uploaded_at: DateTime<Local>) -> Result<()> {
        let path = path.into();
        if path.to_str().is_none() {
            return Err(Error::NonUtf8Path(path));
        }
        if self.map.contains_key(&path) {
            return Err(Error::AlreadyRecorded(path));
        }
        self.map.insert(path, uploaded_at);
        Ok(())
    }

    /// Remove an entry, returning its upload time if it existed
    pub fn remove(&mut self, path: &Path) -> Option<DateTime<Local>> {
        self.map.remove(path)
    }

    /// Iterate over all entries in path order
    pub fn iter(&self) -> impl Iterator<Item = LedgerEntry> + '_ {
        self.map.iter().map(|(path, at)| LedgerEntry {
            path: path.clone(),
            uploaded_at: *at,
        })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries whose age is at least `grace`, oldest upload first
    pub fn due(&self, now: DateTime<Local>, grace: Duration) -> Vec<LedgerEntry> {
        let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
        let mut due: Vec<LedgerEntry> = self
            .iter()
            .filter(|entry| now - entry.uploaded_at >= grace)
            .collect();
        due.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.path.cmp(&b.path)));
        due
    }

    pub(crate) fn from_raw(raw: BTreeMap<String, String>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (path, value) in raw {
            let path = PathBuf::from(path);
            let at = parse_timestamp(&value).ok_or_else(|| Error::InvalidTimestamp {
                folder: path.clone(),
                value: value.clone(),
            })?;
            map.insert(path, at);
        }
        Ok(Self { map })
    }

    pub(crate) fn to_raw(&self) -> BTreeMap<String, String> {
        self.map
            .iter()
            .map(|(path, at)| (path.to_string_lossy().into_owned(), format_timestamp(*at)))
            .collect()
    }
}

/// Format a timestamp the way the ledger stores it (RFC 3339, local offset)
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.to_rfc3339()
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and the naive local `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// form (space or `T` separator) found in ledgers written by older tooling.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Local));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}
