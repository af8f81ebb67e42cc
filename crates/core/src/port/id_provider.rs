// ID Provider Port (for deterministic testing)

use std::sync::atomic::{AtomicU64, Ordering};

/// ID provider interface (allows deterministic session ids in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique session token
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential provider: `<prefix>-1`, `<prefix>-2`, ...
pub struct SequentialIdProvider {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdProvider for SequentialIdProvider {
    fn generate_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_provider_unique() {
        let p = UuidProvider;
        assert_ne!(p.generate_id(), p.generate_id());
    }

    #[test]
    fn test_sequential_provider() {
        let p = SequentialIdProvider::new("sess");
        assert_eq!(p.generate_id(), "sess-1");
        assert_eq!(p.generate_id(), "sess-2");
    }
}
