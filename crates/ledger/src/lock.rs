//! Cross-process exclusive lock on a file next to the ledger.
//!
//! Uses advisory `flock`-style locks through `fs2`. Contention is resolved by
//! polling with exponential backoff; the caller blocks rather than failing.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// How to wait for a contended lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound on a single delay
    pub max_backoff: Duration,
    /// Give up after waiting this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            timeout: None,
        }
    }
}

impl LockOptions {
    /// Same backoff, bounded total wait
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before attempt `attempt + 1`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Held lock. Released when dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to release lock {}: {}", self.path.display(), e);
        } else {
            log::trace!("released lock {}", self.path.display());
        }
    }
}

/// Acquire an exclusive lock on `path`, creating the file if needed.
///
/// The lock file itself is never removed; removing it would let two processes
/// hold locks on different inodes of the same name.
pub fn acquire(path: &Path, options: &LockOptions) -> Result<LockGuard> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::io(path, e))?;

    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                log::trace!("acquired lock {} after {} retries", path.display(), attempt);
                return Ok(LockGuard {
                    file,
                    path: path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                let waited = start.elapsed();
                if let Some(timeout) = options.timeout {
                    if waited >= timeout {
                        return Err(Error::LockTimeout {
                            path: path.to_path_buf(),
                            waited,
                        });
                    }
                }
                if attempt == 0 {
                    log::info!("waiting for lock {}", path.display());
                }
                thread::sleep(options.delay_for_attempt(attempt));
                attempt = attempt.saturating_add(1);
            }
            Err(e) => return Err(Error::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn fast() -> LockOptions {
        LockOptions {
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            timeout: None,
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let options = LockOptions::default();
        assert_eq!(options.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(options.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(options.delay_for_attempt(10), Duration::from_secs(2));
        assert_eq!(options.delay_for_attempt(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json.lock");

        let guard = acquire(&path, &fast()).unwrap();
        assert!(path.exists());
        assert_eq!(guard.path(), path.as_path());
    }

    #[test]
    fn test_contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json.lock");

        let _held = acquire(&path, &fast()).unwrap();
        let err = acquire(&path, &fast().with_timeout(Some(Duration::from_millis(60)))).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json.lock");

        drop(acquire(&path, &fast()).unwrap());
        let again = acquire(&path, &fast().with_timeout(Some(Duration::from_millis(60))));
        assert!(again.is_ok());
    }

    #[test]
    fn test_waiter_blocks_until_holder_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json.lock");

        let held = acquire(&path, &fast()).unwrap();
        let (tx, rx) = mpsc::channel();

        let waiter_path = path.clone();
        let waiter = thread::spawn(move || {
            let _guard = acquire(&waiter_path, &fast()).unwrap();
            tx.send(()).unwrap();
        });

        // Still blocked while we hold the lock
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }
}
