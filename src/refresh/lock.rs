//! Advisory lock file serializing refresh invocations.
//!
//! Two concurrent refreshes could race on the artifact swap; the second one
//! must fail fast without touching anything.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Held for the duration of one refresh cycle. The lock file is removed on
/// drop.
pub struct RefreshLock {
    path: PathBuf,
}

impl RefreshLock {
    /// Create the lock file. Fails with `AlreadyExists` when another refresh
    /// holds it.
    pub fn acquire(path: PathBuf) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        // Owner pid, for operators staring at a stale lock.
        let _ = write!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for RefreshLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".refresh.lock");

        let _held = RefreshLock::acquire(path.clone()).unwrap();
        let second = RefreshLock::acquire(path);
        assert_eq!(
            second.err().unwrap().kind(),
            std::io::ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".refresh.lock");

        drop(RefreshLock::acquire(path.clone()).unwrap());
        assert!(!path.exists());
        let _reacquired = RefreshLock::acquire(path).unwrap();
    }
}
