//! Entropy, hashing and origin adapters.
//!
//! - [`OsEntropy`] draws from the operating system RNG and is what production
//!   clients use for appkeys and correlation ids.
//! - [`SeededEntropy`] is deterministic, for tests that want reproducible ids.
//! - [`Sha256Digest`] turns an ephemeral appkey into the hex digest that gets
//!   persisted after pairing.
//! - [`StaticOrigin`] reports a fixed hostname (or none).

use std::sync::Mutex;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use crate::application::ports::{DigestFunction, EntropySource, OriginProvider};

/// Entropy from the OS random number generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

/// Deterministic entropy from a seeded PRNG.  Not for production keys.
#[derive(Debug)]
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fill_bytes(&mut bytes);
        bytes
    }
}

/// SHA-256 rendered as lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl DigestFunction for Sha256Digest {
    fn hash(&self, bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

/// Reports a hostname fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticOrigin {
    hostname: Option<String>,
}

impl StaticOrigin {
    pub fn new(hostname: Option<String>) -> Self {
        Self { hostname }
    }
}

impl OriginProvider for StaticOrigin {
    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }
}
