//! File-level mutual exclusion between overlapping scheduled runs
//!
//! Two runs racing on the JSON state files would lose updates, so a run
//! takes a pid lock file for its duration. A normal run finishes in well
//! under a minute; a lock older than the staleness horizon is assumed to
//! be left over from a crashed run and is replaced.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Locks older than this are considered abandoned
const STALE_AFTER: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub enum LockError {
    /// Another run is active; holds the lock file age
    Busy(Duration),
    Io(std::io::Error),
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::Io(err)
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Busy(age) => {
                write!(f, "Another run holds the lock (age {}s)", age.as_secs())
            }
            LockError::Io(e) => write!(f, "Lock IO error: {}", e),
        }
    }
}

impl std::error::Error for LockError {}

/// Held for the duration of one run; the file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock, replacing a stale one from a crashed run
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        match Self::try_create(path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let age = Self::lock_age(path)?;
                if age < STALE_AFTER {
                    return Err(LockError::Busy(age));
                }

                log::warn!(
                    "⚠️  Replacing stale lock {} (age {}s)",
                    path.display(),
                    age.as_secs()
                );
                fs::remove_file(path)?;
                Ok(Self::try_create(path)?)
            }
            Err(e) => Err(LockError::Io(e)),
        }
    }

    fn try_create(path: &Path) -> Result<Self, std::io::Error> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        write!(file, "{}", std::process::id())?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn lock_age(path: &Path) -> Result<Duration, std::io::Error> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO))
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert!(path.exists());

        // Second acquisition fails while the first is held
        let err = RunLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::Busy(_)));

        drop(lock);
        assert!(!path.exists());

        // And succeeds again once released
        let _lock = RunLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_stale_lock_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.lock");

        fs::write(&path, "12345").unwrap();
        let stale = SystemTime::now() - Duration::from_secs(3600);
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(stale).unwrap();

        let _lock = RunLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
