//! Persistence-key ownership.
//!
//! Exactly one engine instance may own a persistence key at a time.
//! Keys are derived from session identifiers, so a duplicate acquisition
//! means two timers would clobber each other's snapshots; the registry
//! rejects the second one instead.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::TimerError;

/// Process-wide registry of owned persistence keys. Cheap to clone; all
/// clones share the same ownership set.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    owned: Arc<Mutex<HashSet<String>>>,
}

/// Exclusive ownership of one persistence key, released on drop.
#[derive(Debug)]
pub struct KeyLease {
    key: String,
    owned: Arc<Mutex<HashSet<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive ownership of `key`.
    pub fn acquire(&self, key: &str) -> Result<KeyLease, TimerError> {
        let mut owned = self.owned.lock().expect("registry lock poisoned");
        if !owned.insert(key.to_string()) {
            return Err(TimerError::KeyAlreadyOwned {
                key: key.to_string(),
            });
        }
        Ok(KeyLease {
            key: key.to_string(),
            owned: self.owned.clone(),
        })
    }

    pub fn is_owned(&self, key: &str) -> bool {
        self.owned
            .lock()
            .expect("registry lock poisoned")
            .contains(key)
    }
}

impl KeyLease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        if let Ok(mut owned) = self.owned.lock() {
            owned.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let registry = SessionRegistry::new();
        let lease = registry.acquire("exam_timer:s1").unwrap();
        assert_eq!(lease.key(), "exam_timer:s1");
        assert!(registry.is_owned("exam_timer:s1"));
        drop(lease);
        assert!(!registry.is_owned("exam_timer:s1"));
    }

    #[test]
    fn duplicate_acquisition_is_rejected() {
        let registry = SessionRegistry::new();
        let _lease = registry.acquire("exam_timer:s1").unwrap();
        match registry.acquire("exam_timer:s1") {
            Err(TimerError::KeyAlreadyOwned { key }) => assert_eq!(key, "exam_timer:s1"),
            other => panic!("expected KeyAlreadyOwned, got {other:?}"),
        }
        // Different key is fine.
        assert!(registry.acquire("exam_timer:s2").is_ok());
    }

    #[test]
    fn key_is_reusable_after_release() {
        let registry = SessionRegistry::new();
        drop(registry.acquire("exam_timer:s1").unwrap());
        assert!(registry.acquire("exam_timer:s1").is_ok());
    }
}
