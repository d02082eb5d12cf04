//! The application key presented to the signer.
//!
//! A client identifies itself to the signer with an *appkey*.  The key has
//! two forms:
//!
//! - **Ephemeral**: freshly generated, `appkey:` followed by 24 random bytes in
//!   decimal.  The tag tells both sides that the signer has not yet trusted it.
//! - **Persisted**: the SHA-256 hex digest of an ephemeral key, written to the
//!   key store after the first successful pairing.  Reloading the client with
//!   the same store yields the persisted key, so the signer recognises it.
//!
//! Hashing and storage live in the client crate; this module only knows how
//! to tell the two forms apart.

use std::fmt;

use crate::protocol::correlation::correlation_id;

/// Tag that marks an ephemeral (unconfirmed) key.
pub const EPHEMERAL_TAG: &str = "appkey:";

/// An application key in one of its two lifecycle forms.
#[derive(Clone, PartialEq, Eq)]
pub enum AppKey {
    Ephemeral(String),
    Persisted(String),
}

impl AppKey {
    /// Builds a fresh ephemeral key from random bytes.
    pub fn ephemeral(random: &[u8]) -> Self {
        AppKey::Ephemeral(format!("{EPHEMERAL_TAG}{}", correlation_id(random)))
    }

    /// Classifies an existing key string by its tag.
    ///
    /// Returns `None` for an empty string; a key is never empty.
    pub fn classify(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else if value.contains(EPHEMERAL_TAG) {
            Some(AppKey::Ephemeral(value))
        } else {
            Some(AppKey::Persisted(value))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppKey::Ephemeral(k) | AppKey::Persisted(k) => k,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, AppKey::Ephemeral(_))
    }

    /// A short prefix safe to put in logs.
    pub fn redacted(&self) -> String {
        let key = self.as_str();
        let cut = key
            .char_indices()
            .nth(12)
            .map_or(key.len(), |(i, _)| i);
        format!("{}…", &key[..cut])
    }
}

// Keys are credentials; keep them out of `{:?}` output.
impl fmt::Debug for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppKey::Ephemeral(_) => write!(f, "Ephemeral({})", self.redacted()),
            AppKey::Persisted(_) => write!(f, "Persisted({})", self.redacted()),
        }
    }
}
