// Application Layer - Use Cases

pub mod cancel;
pub mod constants;
pub mod queue_service;
pub mod waiter;

// Re-exports
pub use cancel::{cancel_channel, CancelHandle, CancelToken};
pub use queue_service::{Exclusive, QueueService};
pub use waiter::QueueWaiter;
