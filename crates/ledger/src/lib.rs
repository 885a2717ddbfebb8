//! # Ledger
//!
//! Crash-safe record of folders that were uploaded and are awaiting a
//! verified local cleanup.
//!
//! The ledger is a JSON object on disk mapping an absolute folder path to the
//! time its upload finished. Every read-modify-write runs under an exclusive
//! lock on a sibling `<file>.lock`, always starts from a fresh read of the
//! file, and replaces the file atomically. Nothing is cached between calls.
//!
//! ## Example
//!
//! ```no_run
//! use ledger::Ledger;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let ledger = Ledger::open("/var/lib/offload/wait_cleanup.json");
//!
//! // Record a finished upload (durable before this returns)
//! ledger.record(Path::new("/media/movies/Alien (1979)"), chrono::Local::now())?;
//!
//! // Find entries past a 7 day grace period
//! let due = ledger.load()?.due(chrono::Local::now(), Duration::from_secs(7 * 86_400));
//! for entry in due {
//!     ledger.retire(&entry.path)?;
//! }
//! # Ok::<(), ledger::Error>(())
//! ```

mod error;
pub mod lock;
mod types;

pub use error::{Error, Result};
pub use lock::{LockGuard, LockOptions};
pub use types::{Entries, LedgerEntry, format_timestamp, parse_timestamp};

use chrono::{DateTime, Local};
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Handle to a ledger file. Holds no state beyond its location.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    lock_path: PathBuf,
    lock_options: LockOptions,
}

impl Ledger {
    /// Create a handle for the ledger at `path`. Performs no I/O.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, "lock");
        Self {
            path,
            lock_path,
            lock_options: LockOptions::default(),
        }
    }

    /// Override how lock contention is waited out
    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    /// Path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the lock file guarding the ledger
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Take the ledger lock. Blocks while another process holds it.
    pub fn lock(&self) -> Result<LockGuard> {
        lock::acquire(&self.lock_path, &self.lock_options)
    }

    /// Read a consistent snapshot of the ledger
    pub fn load(&self) -> Result<Entries> {
        let _guard = self.lock()?;
        read_entries(&self.path)
    }

    /// Run one read-modify-write transaction.
    ///
    /// The lock is held from before the read until after the write. The file
    /// is rewritten only if `f` changed the entries; if `f` fails nothing is
    /// written.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Entries) -> Result<T>,
    {
        let _guard = self.lock()?;
        let mut entries = read_entries(&self.path)?;
        let before = entries.clone();

        let out = f(&mut entries)?;

        if entries != before {
            write_entries(&self.path, &entries)?;
        }
        Ok(out)
    }

    /// Durably record a finished upload of `folder`
    pub fn record(&self, folder: &Path, uploaded_at: DateTime<Local>) -> Result<()> {
        self.update(|entries| entries.insert(folder, uploaded_at))?;
        log::debug!("recorded {} in {}", folder.display(), self.path.display());
        Ok(())
    }

    /// Remove `folder` from the ledger. Returns false if it was not present.
    pub fn retire(&self, folder: &Path) -> Result<bool> {
        let removed = self.update(|entries| Ok(entries.remove(folder).is_some()))?;
        if removed {
            log::debug!("retired {} from {}", folder.display(), self.path.display());
        }
        Ok(removed)
    }
}

/// `ledger.json` -> `ledger.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn read_entries(path: &Path) -> Result<Entries> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("ledger {} does not exist, starting empty", path.display());
            return Ok(Entries::new());
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    if content.trim().is_empty() {
        log::warn!("ledger {} is empty, treating as no entries", path.display());
        return Ok(Entries::new());
    }

    let raw: BTreeMap<String, String> =
        serde_json::from_str(&content).map_err(|source| Error::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    Entries::from_raw(raw)
}

fn write_entries(path: &Path, entries: &Entries) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(&entries.to_raw(), &mut ser)?;
    buf.push(b'\n');

    // Write-then-rename so a crash leaves either the old or the new ledger
    let tmp = sibling(path, "tmp");
    {
        let mut file = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
        file.write_all(&buf).map_err(|e| Error::io(&tmp, e))?;
        file.sync_all().map_err(|e| Error::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

    #[cfg(unix)]
    if let Some(parent) = parent {
        // Persist the rename itself
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    log::trace!("wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}
