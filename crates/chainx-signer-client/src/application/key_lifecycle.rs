//! Application key lifecycle: load, rotate, promote.
//!
//! ```text
//!   load ──▶ Persisted(hash)            (store had a key)
//!        └─▶ Ephemeral("appkey:…")      (first run)
//!
//!   paired(true) ──▶ promote: Ephemeral ──sha256──▶ Persisted, written to store
//!   rekey        ──▶ rotate:  anything  ──────────▶ fresh Ephemeral
//! ```
//!
//! The key is only ever replaced wholesale; it is never empty once loaded.

use std::sync::Arc;

use chainx_signer_core::domain::AppKey;
use chainx_signer_core::protocol::correlation::ID_ENTROPY_BYTES;
use tracing::{debug, error, info};

use super::ports::{DigestFunction, EntropySource, KeyStore};

pub struct KeyLifecycle {
    store: Arc<dyn KeyStore>,
    digest: Arc<dyn DigestFunction>,
    entropy: Arc<dyn EntropySource>,
    current: AppKey,
}

impl KeyLifecycle {
    /// Picks up the persisted key if the store has one, otherwise generates a
    /// fresh ephemeral key.
    pub fn load(
        store: Arc<dyn KeyStore>,
        digest: Arc<dyn DigestFunction>,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        let current = match store.get().and_then(AppKey::classify) {
            Some(key) => {
                debug!("loaded stored appkey {}", key.redacted());
                key
            }
            None => AppKey::ephemeral(&entropy.random_bytes(ID_ENTROPY_BYTES)),
        };
        Self {
            store,
            digest,
            entropy,
            current,
        }
    }

    pub fn current(&self) -> &AppKey {
        &self.current
    }

    /// Replaces the key with a fresh ephemeral one.  The store is untouched;
    /// the next successful pairing overwrites it.
    pub fn rotate(&mut self) -> &AppKey {
        self.current = AppKey::ephemeral(&self.entropy.random_bytes(ID_ENTROPY_BYTES));
        info!("appkey rotated to {}", self.current.redacted());
        &self.current
    }

    /// Runs after the signer accepts pairing.
    ///
    /// An ephemeral key is replaced by its digest.  If that differs from what
    /// the store holds, it is written and the current key is refreshed from
    /// the store.  Returns `true` when the store was written.
    pub fn promote(&mut self) -> bool {
        let candidate = if self.current.is_ephemeral() {
            self.digest.hash(self.current.as_str().as_bytes())
        } else {
            self.current.as_str().to_string()
        };

        if self.store.get().as_deref() == Some(candidate.as_str()) {
            return false;
        }

        match self.store.set(&candidate) {
            Ok(()) => {
                self.current = self
                    .store
                    .get()
                    .and_then(AppKey::classify)
                    .unwrap_or(AppKey::Persisted(candidate));
                info!("appkey promoted to {}", self.current.redacted());
                true
            }
            Err(e) => {
                // Keep the hashed key for this session; the next start pairs again.
                error!("could not persist promoted appkey: {e}");
                self.current = AppKey::Persisted(candidate);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{KeyStoreError, MockKeyStore};
    use crate::infrastructure::crypto::{SeededEntropy, Sha256Digest};
    use crate::infrastructure::storage::MemoryKeyStore;
    use chainx_signer_core::domain::EPHEMERAL_TAG;

    fn lifecycle_with(store: Arc<dyn KeyStore>) -> KeyLifecycle {
        KeyLifecycle::load(store, Arc::new(Sha256Digest), Arc::new(SeededEntropy::new(1)))
    }

    #[test]
    fn test_load_without_stored_key_is_ephemeral() {
        // Arrange / Act
        let keys = lifecycle_with(Arc::new(MemoryKeyStore::new()));

        // Assert
        assert!(keys.current().is_ephemeral());
        assert!(keys.current().as_str().starts_with(EPHEMERAL_TAG));
    }

    #[test]
    fn test_load_with_stored_hash_is_persisted() {
        let keys = lifecycle_with(Arc::new(MemoryKeyStore::with_value("cafebabe")));
        assert_eq!(keys.current(), &AppKey::Persisted("cafebabe".to_string()));
    }

    #[test]
    fn test_promote_writes_sha256_of_ephemeral_key() {
        // Arrange
        let store = Arc::new(MemoryKeyStore::new());
        let mut keys = lifecycle_with(store.clone());
        let expected = Sha256Digest.hash(keys.current().as_str().as_bytes());

        // Act
        let wrote = keys.promote();

        // Assert
        assert!(wrote);
        assert_eq!(store.get(), Some(expected.clone()));
        assert_eq!(keys.current(), &AppKey::Persisted(expected));
    }

    #[test]
    fn test_promote_twice_writes_once() {
        let store = Arc::new(MemoryKeyStore::new());
        let mut keys = lifecycle_with(store.clone());

        assert!(keys.promote());
        assert!(!keys.promote());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_promote_of_already_stored_key_does_not_write() {
        let store = Arc::new(MemoryKeyStore::with_value("cafebabe"));
        let mut keys = lifecycle_with(store.clone());

        assert!(!keys.promote());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_rotate_after_promotion_then_promote_replaces_stored_hash() {
        // Arrange
        let store = Arc::new(MemoryKeyStore::with_value("old-hash"));
        let mut keys = lifecycle_with(store.clone());

        // Act
        let rotated = keys.rotate().clone();
        keys.promote();

        // Assert
        assert!(rotated.is_ephemeral());
        let expected = Sha256Digest.hash(rotated.as_str().as_bytes());
        assert_eq!(store.get(), Some(expected));
    }

    #[test]
    fn test_rotate_yields_distinct_keys() {
        let mut keys = lifecycle_with(Arc::new(MemoryKeyStore::new()));
        let first = keys.current().clone();
        let second = keys.rotate().clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_failed_store_write_keeps_hash_in_memory() {
        // Arrange
        let mut store = MockKeyStore::new();
        store.expect_get().returning(|| None);
        store
            .expect_set()
            .times(1)
            .returning(|_| Err(KeyStoreError::Write("disk full".to_string())));
        let mut keys = lifecycle_with(Arc::new(store));
        let expected = Sha256Digest.hash(keys.current().as_str().as_bytes());

        // Act
        let wrote = keys.promote();

        // Assert
        assert!(!wrote);
        assert_eq!(keys.current(), &AppKey::Persisted(expected));
    }

    #[test]
    fn test_promote_refreshes_from_store() {
        // Arrange: a store that normalises what it is given.
        let mut store = MockKeyStore::new();
        let mut calls = 0;
        store.expect_get().returning(move || {
            calls += 1;
            // load, promote's comparison, then the refresh
            if calls >= 3 {
                Some("normalised".to_string())
            } else {
                None
            }
        });
        store.expect_set().times(1).returning(|_| Ok(()));
        let mut keys = lifecycle_with(Arc::new(store));

        // Act
        keys.promote();

        // Assert
        assert_eq!(keys.current().as_str(), "normalised");
    }
}
