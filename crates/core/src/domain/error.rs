// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Invalid wait policy: {0}")]
    InvalidWaitPolicy(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
