// mapqueue Infrastructure - Filesystem Adapter
// Implements: QueueStore over a single JSON file shared by many processes

mod json_file_store;
mod lock;

pub use json_file_store::JsonFileQueueStore;
pub use lock::FileLock;
