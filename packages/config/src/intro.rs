//! Persistence of the "seen intro" flag.
//!
//! This is the only state that outlives a session. A missing file means the
//! intro has not been seen yet.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Persisted intro flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroFlag {
    /// Whether the intro has been dismissed.
    pub seen: bool,
    /// When it was dismissed.
    pub seen_at: Option<DateTime<Utc>>,
}

impl IntroFlag {
    /// Reads the flag from `path`. A missing file yields an unseen flag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or is
    /// not valid JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Returns whether the intro flag at `path` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the flag file exists but is unreadable.
    pub fn has_seen(path: &Path) -> Result<bool, ConfigError> {
        Ok(Self::load(path)?.seen)
    }

    /// Marks the intro as seen now and writes the flag to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be written.
    pub fn mark_seen(path: &Path) -> Result<Self, ConfigError> {
        let flag = Self {
            seen: true,
            seen_at: Some(Utc::now()),
        };
        flag.save(path)?;
        log::debug!("Marked intro as seen in {}", path.display());
        Ok(flag)
    }

    /// Removes the persisted flag so the intro shows again.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be removed.
    pub fn reset(path: &Path) -> Result<(), ConfigError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_err)
    }
}
