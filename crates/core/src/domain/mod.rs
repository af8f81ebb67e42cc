// Domain Layer - Pure queue semantics

pub mod error;
pub mod queue;
pub mod wait;

// Re-exports
pub use error::DomainError;
pub use queue::{Queue, ResetPolicy, SessionId};
pub use wait::{WaitEvent, WaitOutcome, WaitPolicy};
