//! Exclusive hook lock.
//!
//! Two hooks of the same unit must not reconcile concurrently. The lock is an
//! advisory `flock` on a file in the charm directory, released when the
//! guard drops. The file itself is left in place.

use std::fs::{self, File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

pub const LOCK_FILE: &str = ".neutron-api-hook.lock";

const POLL_MS: u64 = 50;

#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!(path = %self.path.display(), "released hook lock");
    }
}

/// Take the lock, polling until `timeout_ms` has passed.
pub fn acquire(lock_path: &Path, timeout_ms: u64) -> Result<LockGuard, String> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| format!("cannot open lock file {}: {}", lock_path.display(), e))?;

    let fd = file.as_raw_fd();
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if ret == 0 {
            debug!(path = %lock_path.display(), "acquired hook lock");
            return Ok(LockGuard {
                file,
                path: lock_path.to_path_buf(),
            });
        }
        if Instant::now() >= deadline {
            return Err(format!(
                "timed out acquiring lock {} after {}ms",
                lock_path.display(),
                timeout_ms
            ));
        }
        thread::sleep(Duration::from_millis(POLL_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOCK_FILE);
        let guard = acquire(&path, 100).unwrap();
        assert_eq!(guard.path(), path.as_path());

        let err = acquire(&path, 100).unwrap_err();
        assert!(err.contains("timed out"));

        drop(guard);
        assert!(acquire(&path, 100).is_ok());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("charm").join(LOCK_FILE);
        assert!(acquire(&path, 0).is_ok());
        assert!(path.exists());
    }
}
