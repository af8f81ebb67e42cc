// Queue constants (no magic values)
use std::time::Duration;

/// Default seconds between position checks (QUEUE_INTERVAL)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default seconds before a waiter gives up (QUEUE_TIMEOUT)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Default backing file (QUEUE_FILE), tilde-expanded at load
pub const DEFAULT_QUEUE_FILE: &str = "~/.mapqueue/queue.json";
