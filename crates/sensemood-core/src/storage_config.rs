//! Application configuration file
//!
//! TOML document with `[storage]`, `[extraction]` and `[clustering]`
//! sections. Every section and key is optional.

use crate::config::{ClusterConfig, ExtractionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SenseMoodConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub clustering: ClusterConfig,
}

/// Fingerprint store location and format
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default)]
    pub format: FileFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            format: FileFormat::default(),
        }
    }
}

fn default_store_path() -> String {
    "./sensemood.mfp".to_string()
}

/// File format for the fingerprint store
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Binary,
    Json,
    #[default]
    Auto, // Auto-detect based on file extension
}

impl FileFormat {
    /// Concrete format for `path`; `Auto` picks JSON for `.json`, binary otherwise
    pub fn resolve(self, path: &Path) -> FileFormat {
        match self {
            FileFormat::Auto => {
                let is_json = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("json"))
                    .unwrap_or(false);
                if is_json {
                    FileFormat::Json
                } else {
                    FileFormat::Binary
                }
            }
            other => other,
        }
    }
}

impl StorageConfig {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

impl SenseMoodConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: SenseMoodConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.path.trim().is_empty() {
            anyhow::bail!("storage.path must not be empty");
        }
        self.extraction.validate()?;
        self.clustering.validate()?;
        Ok(())
    }
}
