// Queue Store Port (Interface)

use crate::domain::Queue;
use crate::error::Result;
use async_trait::async_trait;

/// One in-place edit of the queue. Returns true if it changed anything.
pub type QueueMutation = Box<dyn FnOnce(&mut Queue) -> bool + Send + 'static>;

/// Result of a read-modify-write cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updated {
    /// Queue as it stands after the cycle
    pub queue: Queue,
    /// Whether the mutation changed the queue (and it was saved)
    pub changed: bool,
}

/// Persisted FIFO of session ids shared by independent processes.
///
/// Every call reads the backing store afresh; nothing is cached between calls.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Load the full queue.
    ///
    /// A missing store, or `force_reset`, (re)initializes it to empty.
    ///
    /// # Errors
    /// - `AppError::CorruptState` if stored content is not a JSON array of strings
    /// - `AppError::Io` if the store cannot be read or written
    async fn load(&self, force_reset: bool) -> Result<Queue>;

    /// Replace the full stored queue (last writer wins)
    async fn save(&self, queue: &Queue) -> Result<()>;

    /// Load, apply `mutation`, and save if it changed anything, all under the
    /// store's exclusive lock
    async fn update(&self, mutation: QueueMutation) -> Result<Updated>;

    /// Human-readable location of the backing store
    fn location(&self) -> String;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store. `None` models a missing backing file.
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        state: Mutex<Option<Queue>>,
        corrupt: AtomicBool,
        save_count: AtomicUsize,
        load_count: AtomicUsize,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_queue(queue: Queue) -> Self {
            Self {
                state: Mutex::new(Some(queue)),
                ..Self::default()
            }
        }

        /// Make the next loads fail as if the file held garbage.
        /// A forced reset clears the flag.
        pub fn corrupt(&self) {
            self.corrupt.store(true, Ordering::SeqCst);
        }

        /// Overwrite state behind the service's back (another process writing)
        pub fn replace(&self, queue: Queue) {
            *self.state.lock().unwrap() = Some(queue);
        }

        pub fn snapshot(&self) -> Option<Queue> {
            self.state.lock().unwrap().clone()
        }

        pub fn save_count(&self) -> usize {
            self.save_count.load(Ordering::SeqCst)
        }

        pub fn load_count(&self) -> usize {
            self.load_count.load(Ordering::SeqCst)
        }

        fn load_locked(&self, state: &mut Option<Queue>, force_reset: bool) -> Result<Queue> {
            self.load_count.fetch_add(1, Ordering::SeqCst);
            if state.is_none() || force_reset {
                self.corrupt.store(false, Ordering::SeqCst);
                *state = Some(Queue::new());
                self.save_count.fetch_add(1, Ordering::SeqCst);
                return Ok(Queue::new());
            }
            if self.corrupt.load(Ordering::SeqCst) {
                return Err(AppError::corrupt("memory", "injected corruption"));
            }
            Ok(state.clone().unwrap_or_default())
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn load(&self, force_reset: bool) -> Result<Queue> {
            let mut state = self.state.lock().unwrap();
            self.load_locked(&mut state, force_reset)
        }

        async fn save(&self, queue: &Queue) -> Result<()> {
            *self.state.lock().unwrap() = Some(queue.clone());
            self.corrupt.store(false, Ordering::SeqCst);
            self.save_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn update(&self, mutation: QueueMutation) -> Result<Updated> {
            let mut state = self.state.lock().unwrap();
            let mut queue = self.load_locked(&mut state, false)?;
            let changed = mutation(&mut queue);
            if changed {
                *state = Some(queue.clone());
                self.save_count.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Updated { queue, changed })
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }
}
