//! JSON format for fingerprint stores
//!
//! Human-readable alternative to the binary log. The whole document is
//! rewritten on every save.

use serde::{Deserialize, Serialize};

/// Complete JSON fingerprint store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpJsonStore {
    pub version: String,
    pub metadata: FpJsonMetadata,
    pub tracks: Vec<FpJsonTrack>,
}

/// Store-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpJsonMetadata {
    pub algorithm: String,
    pub dimension: usize,
    pub created_at: String,
    pub updated_at: String,
}

/// One track's fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FpJsonTrack {
    pub path: String,
    pub fingerprint: Vec<f32>,
}

impl FpJsonStore {
    /// Create an empty store for fingerprints of `dimension` values
    pub fn new(dimension: usize) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: "1.0".to_string(),
            metadata: FpJsonMetadata {
                algorithm: "MFCC-MEAN".to_string(),
                dimension,
                created_at: now.clone(),
                updated_at: now,
            },
            tracks: Vec::new(),
        }
    }

    /// Insert or overwrite a track's fingerprint, keeping its original position
    pub fn upsert(&mut self, path: &str, fingerprint: Vec<f32>) -> anyhow::Result<()> {
        if fingerprint.len() != self.metadata.dimension {
            anyhow::bail!(
                "Fingerprint for {} has {} values, store dimension is {}",
                path,
                fingerprint.len(),
                self.metadata.dimension
            );
        }

        match self.tracks.iter_mut().find(|t| t.path == path) {
            Some(track) => track.fingerprint = fingerprint,
            None => self.tracks.push(FpJsonTrack {
                path: path.to_string(),
                fingerprint,
            }),
        }
        self.metadata.updated_at = chrono::Utc::now().to_rfc3339();

        Ok(())
    }

    /// Save to JSON file (written to a sibling temp file, then renamed)
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json_str)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json_str = std::fs::read_to_string(path)?;
        let store: FpJsonStore = serde_json::from_str(&json_str)?;

        if let Some(bad) = store
            .tracks
            .iter()
            .find(|t| t.fingerprint.len() != store.metadata.dimension)
        {
            anyhow::bail!(
                "Track {} has {} values, store dimension is {}",
                bad.path,
                bad.fingerprint.len(),
                store.metadata.dimension
            );
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_overwrites_in_place() {
        let mut store = FpJsonStore::new(2);
        store.upsert("a", vec![1.0, 1.0]).unwrap();
        store.upsert("b", vec![2.0, 2.0]).unwrap();
        store.upsert("a", vec![3.0, 3.0]).unwrap();

        assert_eq!(store.tracks.len(), 2);
        assert_eq!(store.tracks[0].path, "a");
        assert_eq!(store.tracks[0].fingerprint, vec![3.0, 3.0]);
    }

    #[test]
    fn test_upsert_rejects_wrong_dimension() {
        let mut store = FpJsonStore::new(13);
        assert!(store.upsert("a", vec![0.0; 12]).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path =
            std::env::temp_dir().join(format!("sensemood-fp-json-{}.json", std::process::id()));
        let mut store = FpJsonStore::new(1);
        store.upsert("track.flac", vec![0.25]).unwrap();
        store.save(&path).unwrap();

        let loaded = FpJsonStore::load(&path).unwrap();
        assert_eq!(loaded.metadata.dimension, 1);
        assert_eq!(loaded.tracks, store.tracks);

        std::fs::remove_file(&path).unwrap();
    }
}
