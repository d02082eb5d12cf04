//! TOML-backed [`KeyStore`] for the persisted application key.
//!
//! The key lives in a small file in the platform-appropriate config directory:
//! - Windows:  `%APPDATA%\ChainXSigner\appkey.toml`
//! - Linux:    `~/.config/chainx-signer/appkey.toml`
//! - macOS:    `~/Library/Application Support/ChainXSigner/appkey.toml`
//!
//! ```toml
//! appkey = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! ```
//!
//! # Why only the hash? (for beginners)
//!
//! Before pairing, the client identifies itself with a random *ephemeral* key
//! (`appkey:` followed by digits).  Once the user approves the pairing in the
//! signer, the client stores the SHA-256 hash of that key instead.  On the
//! next start the hash is loaded and presented as-is; the signer recognises it
//! and skips the approval prompt.
//!
//! A missing file is not an error: it simply means "never paired".  A file
//! that cannot be read or parsed is logged and treated the same way, so a
//! corrupt key file costs one extra approval prompt rather than a crash.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::application::ports::{KeyStore, KeyStoreError};

/// File name used inside the platform config directory.
pub const KEY_FILE_NAME: &str = "appkey.toml";

/// Error type for key file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing key file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse key file TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The key could not be serialized to TOML.
    #[error("failed to serialize key file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct KeyFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    appkey: Option<String>,
}

/// Stores the persisted application key in a TOML file.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Opens the store at the platform default location.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoPlatformConfigDir`] if the base directory
    /// cannot be determined from the environment.
    pub fn at_default_location() -> Result<Self, StorageError> {
        Ok(Self::new(default_key_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored key, returning `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] for file-system errors other than "not
    /// found", and [`StorageError::Parse`] if the TOML is malformed.
    pub fn load(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let file: KeyFile = toml::from_str(&content)?;
                Ok(file.appkey.filter(|key| !key.is_empty()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Writes `appkey` to disk, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] for file-system failures or
    /// [`StorageError::Serialize`] if serialization fails.
    pub fn save(&self, appkey: &str) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(&KeyFile {
            appkey: Some(appkey.to_string()),
        })?;
        std::fs::write(&self.path, content).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("persisted appkey to {}", self.path.display());
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self) -> Option<String> {
        match self.load() {
            Ok(value) => value,
            Err(e) => {
                warn!("ignoring unreadable key file: {e}");
                None
            }
        }
    }

    fn set(&self, value: &str) -> Result<(), KeyStoreError> {
        self.save(value).map_err(|e| {
            error!("failed to persist appkey: {e}");
            KeyStoreError::Write(e.to_string())
        })
    }
}

/// Resolves the full path to the key file at the platform default location.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn default_key_file_path() -> Result<PathBuf, StorageError> {
    platform_config_dir()
        .map(|dir| dir.join(KEY_FILE_NAME))
        .ok_or(StorageError::NoPlatformConfigDir)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ChainXSigner"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("chainx-signer"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("ChainXSigner"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);

    /// A fresh path under the system temp dir, unique per test.
    fn scratch_path() -> PathBuf {
        let n = NEXT.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!("chainx-signer-test-{}-{n}", std::process::id()))
            .join(KEY_FILE_NAME)
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        // Arrange
        let store = FileKeyStore::new(scratch_path());

        // Act / Assert
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_save_then_get_round_trips_and_creates_directory() {
        // Arrange
        let path = scratch_path();
        let store = FileKeyStore::new(&path);

        // Act
        store.set("9f86d081884c7d65").unwrap();

        // Assert
        assert!(path.exists());
        assert_eq!(store.get().as_deref(), Some("9f86d081884c7d65"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_saved_file_is_plain_toml() {
        let path = scratch_path();
        let store = FileKeyStore::new(&path);
        store.save("abc").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), r#"appkey = "abc""#);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_malformed_file_is_treated_as_never_paired() {
        // Arrange
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "appkey = [[[ not toml").unwrap();
        let store = FileKeyStore::new(&path);

        // Act / Assert
        assert!(matches!(store.load(), Err(StorageError::Parse(_))));
        assert_eq!(store.get(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_empty_key_is_treated_as_absent() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"appkey = """#).unwrap();

        assert_eq!(FileKeyStore::new(&path).get(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_without_appkey_field_parses() {
        let file: KeyFile = toml::from_str("").unwrap();
        assert_eq!(file, KeyFile::default());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_default_path_ends_with_key_file_name() {
        if let Ok(path) = default_key_file_path() {
            assert!(path.ends_with("chainx-signer/appkey.toml"));
        }
    }
}
