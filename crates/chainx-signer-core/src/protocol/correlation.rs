//! Correlation id rendering.
//!
//! The signer matches responses to calls by an opaque string id.  The id is
//! built from 24 random bytes written out as their decimal values, one after
//! another, with no separator and no padding:
//!
//! ```text
//! [7, 0, 255, 12]  →  "7025512"
//! ```
//!
//! The rendering is lossy (`[1, 23]` and `[12, 3]` both give `"123"`), but the
//! signer treats the id as an opaque token and 24 bytes of entropy keep
//! collisions between concurrently outstanding calls negligible.  The same
//! rendering is used for the random part of ephemeral application keys.

use std::fmt::Write;

/// Number of random bytes behind every correlation id and ephemeral key.
pub const ID_ENTROPY_BYTES: usize = 24;

/// Renders `bytes` as the concatenation of their decimal representations.
///
/// # Examples
///
/// ```rust
/// use chainx_signer_core::correlation_id;
///
/// assert_eq!(correlation_id(&[7, 0, 255]), "70255");
/// ```
pub fn correlation_id(bytes: &[u8]) -> String {
    let mut id = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        // Writing into a String cannot fail.
        let _ = write!(id, "{byte}");
    }
    id
}
