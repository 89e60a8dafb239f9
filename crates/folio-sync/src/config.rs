//! Save timing configuration, loaded from RON.
//!
//! ```ron
//! (
//!     debounce_ms: 500,
//!     indexing_hold_ms: 2000,
//! )
//! ```
//!
//! Missing fields take their defaults, so an empty `()` is a valid file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_INDEXING_HOLD_MS: u64 = 2000;

/// Error loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period after the last edit before an auto-save fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How long the status stays `indexing` after the last save completes.
    #[serde(default = "default_indexing_hold_ms")]
    pub indexing_hold_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_indexing_hold_ms() -> u64 {
    DEFAULT_INDEXING_HOLD_MS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            indexing_hold_ms: DEFAULT_INDEXING_HOLD_MS,
        }
    }
}

impl SyncConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    /// `<config dir>/folio/sync.ron`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("sync.ron"))
    }

    /// Load from [`default_path`](Self::default_path). A missing file gives
    /// defaults; an unreadable or malformed one is logged and also gives
    /// defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        Self::load_from_or_default(&path)
    }

    pub(crate) fn load_from_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no sync config, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), ?config, "loaded sync config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "bad sync config, using defaults");
                Self::default()
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn indexing_hold(&self) -> Duration {
        Duration::from_millis(self.indexing_hold_ms)
    }
}
