// Queue Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token naming one waiting client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id, rejecting empty or whitespace-only tokens
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(DomainError::InvalidSessionId(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// What to do with an existing backing store at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Truncate to an empty queue
    Reset,
    /// Keep existing entries (create an empty queue if none exists)
    Preserve,
}

impl ResetPolicy {
    pub fn force_reset(self) -> bool {
        matches!(self, ResetPolicy::Reset)
    }
}

/// FIFO of waiting sessions. Position 0 holds the resource.
///
/// Serialized as a plain JSON array of strings. Duplicates are kept as-is;
/// lookups and removal act on the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Queue(Vec<SessionId>);

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail, returning the new entry's position
    pub fn push(&mut self, session: SessionId) -> usize {
        self.0.push(session);
        self.0.len() - 1
    }

    /// Zero-based index of the first occurrence
    pub fn position(&self, session: &SessionId) -> Option<usize> {
        self.0.iter().position(|s| s == session)
    }

    /// Remove the first occurrence. Returns false if absent.
    pub fn remove(&mut self, session: &SessionId) -> bool {
        match self.position(session) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn front(&self) -> Option<&SessionId> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionId> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<SessionId> {
        self.0
    }
}

impl From<Vec<SessionId>> for Queue {
    fn from(sessions: Vec<SessionId>) -> Self {
        Self(sessions)
    }
}

impl FromIterator<SessionId> for Queue {
    fn from_iter<I: IntoIterator<Item = SessionId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}
