//! Client-side domain types that are not part of the wire protocol.

pub mod config;

pub use config::ClientConfig;
