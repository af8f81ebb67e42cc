// JSON file QueueStore Implementation

use crate::lock::FileLock;
use async_trait::async_trait;
use mapqueue_core::domain::Queue;
use mapqueue_core::error::{AppError, Result};
use mapqueue_core::port::{QueueMutation, QueueStore, Updated};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// Queue persisted as a JSON array of strings in one file.
///
/// Every operation runs under an exclusive lock on `<file>.lock`, so
/// read-modify-write cycles from different processes never interleave.
/// Writes go to a temp file in the same directory and are renamed over the
/// target, so readers see either the old or the new queue, never a torn one.
#[derive(Clone)]
pub struct JsonFileQueueStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");
        Self {
            inner: Arc::new(Inner {
                path,
                lock_path: PathBuf::from(lock_name),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.inner.lock_path
    }

    // Filesystem work blocks; keep it off the async workers
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| AppError::Internal(format!("queue file task failed: {}", e)))?
    }
}

impl Inner {
    fn lock(&self) -> Result<FileLock> {
        self.ensure_parent()?;
        Ok(FileLock::acquire(&self.lock_path)?)
    }

    fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }

    /// Caller must hold the lock
    fn read(&self, force_reset: bool) -> Result<Queue> {
        if force_reset {
            debug!(path = %self.path.display(), "Queue will be reset");
            self.write(&Queue::new())?;
            return Ok(Queue::new());
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Queue file missing, creating empty queue");
                self.write(&Queue::new())?;
                return Ok(Queue::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::corrupt(self.path.display().to_string(), e))
    }

    /// Caller must hold the lock
    fn write(&self, queue: &Queue) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, queue)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;

        debug!(path = %self.path.display(), queue = %queue, "Queue set");
        Ok(())
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
    async fn load(&self, force_reset: bool) -> Result<Queue> {
        self.blocking(move |inner| {
            let _lock = inner.lock()?;
            inner.read(force_reset)
        })
        .await
    }

    async fn save(&self, queue: &Queue) -> Result<()> {
        let queue = queue.clone();
        self.blocking(move |inner| {
            let _lock = inner.lock()?;
            inner.write(&queue)
        })
        .await
    }

    async fn update(&self, mutation: QueueMutation) -> Result<Updated> {
        self.blocking(move |inner| {
            let _lock = inner.lock()?;
            let mut queue = inner.read(false)?;
            let changed = mutation(&mut queue);
            if changed {
                inner.write(&queue)?;
            }
            Ok(Updated { queue, changed })
        })
        .await
    }

    fn location(&self) -> String {
        self.inner.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapqueue_core::domain::SessionId;
    use tokio_test::{assert_err, assert_ok};

    fn sid(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    fn setup() -> (tempfile::TempDir, JsonFileQueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileQueueStore::new(dir.path().join("queue.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_file_is_created_empty() {
        let (_dir, store) = setup();
        assert!(!store.path().exists());

        let q = store.load(false).await.unwrap();
        assert!(q.is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_save_writes_plain_json_array() {
        let (_dir, store) = setup();
        let q: Queue = vec![sid("a"), sid("b")].into();
        store.save(&q).await.unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec!["a", "b"]);
        assert_eq!(store.load(false).await.unwrap(), q);
    }

    #[tokio::test]
    async fn test_force_reset_truncates() {
        let (_dir, store) = setup();
        assert_ok!(store.save(&vec![sid("a")].into()).await);

        assert!(store.load(true).await.unwrap().is_empty());
        assert!(store.load(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported_not_healed() {
        let (_dir, store) = setup();
        fs::write(store.path(), r#"{"not": "a list"}"#).unwrap();

        let err = store.load(false).await.unwrap_err();
        match err {
            AppError::CorruptState { path, .. } => assert!(path.ends_with("queue.json")),
            other => panic!("expected CorruptState, got {other:?}"),
        }
        // File left untouched for inspection
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            r#"{"not": "a list"}"#
        );

        assert!(store.load(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_string_entries_are_corrupt() {
        let (_dir, store) = setup();
        fs::write(store.path(), "[1, 2]").unwrap();
        assert!(matches!(
            store.load(false).await,
            Err(AppError::CorruptState { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_skips_write_when_unchanged() {
        let (_dir, store) = setup();
        store.save(&vec![sid("a")].into()).await.unwrap();
        let before = fs::metadata(store.path()).unwrap().modified().unwrap();

        let updated = store.update(Box::new(|_: &mut Queue| false)).await.unwrap();
        assert!(!updated.changed);
        assert_eq!(updated.queue.len(), 1);
        assert_eq!(fs::metadata(store.path()).unwrap().modified().unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_on_corrupt_file_fails_without_writing() {
        let (_dir, store) = setup();
        fs::write(store.path(), "garbage").unwrap();

        let res = store
            .update(Box::new(|q: &mut Queue| {
                q.push(SessionId::new("x").unwrap());
                true
            }))
            .await;
        assert_err!(res);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "garbage");
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileQueueStore::new(dir.path().join("nested/deeper/queue.json"));
        store.load(false).await.unwrap();
        assert!(store.path().is_file());
        assert!(store.lock_path().ends_with("queue.json.lock"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (dir, store) = setup();
        for i in 0..5 {
            store.save(&vec![sid(&format!("s{i}"))].into()).await.unwrap();
        }
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["queue.json", "queue.json.lock"]);
    }
}
