//! Storage infrastructure: persistence of the application key.
//!
//! - **`key_file`** – [`FileKeyStore`], a TOML file in the platform config
//!   directory holding the hashed key that survives restarts.
//! - **`memory`** – [`MemoryKeyStore`], a process-local store for tests and
//!   for hosts that do not want anything written to disk.

pub mod key_file;
pub mod memory;

pub use key_file::{default_key_file_path, FileKeyStore, StorageError};
pub use memory::MemoryKeyStore;
