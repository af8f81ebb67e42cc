// Cross-process exclusive lock on a sidecar file
//
// Unix: flock(2) on `<queue file>.lock`, released when the descriptor closes.
// Elsewhere: a sentinel file created with `create_new`, removed on drop.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

#[cfg(not(unix))]
use std::time::{Duration, SystemTime};

/// Sentinel age after which a lock holder is presumed dead (non-Unix only)
#[cfg(not(unix))]
pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(30);

#[cfg(not(unix))]
const RETRY_SLEEP: Duration = Duration::from_millis(10);

/// Held exclusive lock. Dropping it releases the lock.
pub struct FileLock {
    path: PathBuf,
    #[cfg(unix)]
    _flock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl FileLock {
    /// Block until the exclusive lock on `path` is held
    ///
    /// The lock file is created if missing and never deleted on Unix, so every
    /// process locks the same inode.
    #[cfg(unix)]
    pub fn acquire(path: &Path) -> io::Result<Self> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let mut file = open_lock_file(path)?;
        loop {
            match Flock::lock(file, FlockArg::LockExclusive) {
                Ok(flock) => {
                    trace!(path = %path.display(), "Queue lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        _flock: flock,
                    });
                }
                Err((returned, Errno::EINTR)) => file = returned,
                Err((_, errno)) => return Err(io::Error::from(errno)),
            }
        }
    }

    #[cfg(not(unix))]
    pub fn acquire(path: &Path) -> io::Result<Self> {
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(file) => {
                    trace!(path = %path.display(), "Queue lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        _file: file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        tracing::warn!(path = %path.display(), "Recovering stale queue lock");
                        let _ = std::fs::remove_file(path);
                        continue;
                    }
                    std::thread::sleep(RETRY_SLEEP);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(not(unix))]
impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(not(unix))]
fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_lock_is_exclusive_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json.lock");

        let first = FileLock::acquire(&path).unwrap();
        let acquired = Arc::new(AtomicBool::new(false));

        let flag = acquired.clone();
        let contender_path = path.clone();
        let contender = std::thread::spawn(move || {
            let _second = FileLock::acquire(&contender_path).unwrap();
            flag.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst), "second holder got in early");

        drop(first);
        contender.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reacquire_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json.lock");

        let lock = FileLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
        drop(lock);
        FileLock::acquire(&path).unwrap();
    }
}
