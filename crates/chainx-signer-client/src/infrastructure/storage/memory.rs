//! In-memory [`KeyStore`].

use std::sync::Mutex;

use crate::application::ports::{KeyStore, KeyStoreError};

/// Keeps the persisted key in process memory only.
///
/// Share it through an `Arc` when a test needs to inspect what the client
/// wrote.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    value: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `value`, as if a previous session
    /// had paired.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, value: &str) -> Result<(), KeyStoreError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(value.to_string());
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        assert_eq!(MemoryKeyStore::new().get(), None);
    }

    #[test]
    fn test_set_then_get_returns_value_and_counts_write() {
        let store = MemoryKeyStore::new();
        store.set("abc123").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc123"));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_with_value_prefills_without_counting_a_write() {
        let store = MemoryKeyStore::with_value("persisted");
        assert_eq!(store.get().as_deref(), Some("persisted"));
        assert_eq!(store.write_count(), 0);
    }
}
