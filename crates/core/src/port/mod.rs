// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod queue_store;

// Re-exports
pub use id_provider::IdProvider;
pub use queue_store::{QueueMutation, QueueStore, Updated};
