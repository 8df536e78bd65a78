//! Fingerprint store trait and implementations
//!
//! Stores map a track reference to its fingerprint. A repeated `put` for the
//! same track replaces the value but keeps the track's original position.

use anyhow::{Context, Result};
use sensemood_fp::{FingerprintRecord, FpJsonStore, MfpReader, MfpWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::fingerprint::Fingerprint;
use crate::storage_config::{FileFormat, StorageConfig};

/// Abstract fingerprint store
///
/// Implementations synchronize internally; the pipeline calls `put` from
/// several worker threads at once.
pub trait FingerprintStore: Send + Sync {
    /// Number of values every stored fingerprint has
    fn dimension(&self) -> usize;

    /// Persist one track's fingerprint
    fn put(&self, track: &str, fingerprint: &Fingerprint) -> Result<()>;

    /// All stored fingerprints, in first-insertion order
    fn get_all(&self) -> Result<Vec<(String, Fingerprint)>>;
}

fn check_dimension(track: &str, fingerprint: &Fingerprint, dimension: usize) -> Result<()> {
    if fingerprint.dimension() != dimension {
        anyhow::bail!(
            "Fingerprint for {} has {} values, store dimension is {}",
            track,
            fingerprint.dimension(),
            dimension
        );
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory store
#[derive(Debug)]
pub struct MemoryStore {
    dimension: usize,
    entries: Mutex<Vec<(String, Fingerprint)>>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FingerprintStore for MemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn put(&self, track: &str, fingerprint: &Fingerprint) -> Result<()> {
        check_dimension(track, fingerprint, self.dimension)?;

        let mut entries = lock(&self.entries);
        match entries.iter_mut().find(|(t, _)| t == track) {
            Some(entry) => entry.1 = fingerprint.clone(),
            None => entries.push((track.to_string(), fingerprint.clone())),
        }
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<(String, Fingerprint)>> {
        Ok(lock(&self.entries).clone())
    }
}

enum FileBackend {
    Binary(MfpWriter),
    Json(FpJsonStore),
}

/// Single-file store, either a binary `.mfp` log or a JSON document
pub struct FilesystemStore {
    path: PathBuf,
    dimension: usize,
    backend: Mutex<FileBackend>,
}

impl FilesystemStore {
    /// Open or create a store for fingerprints of `dimension` values.
    ///
    /// An existing file with a different dimension is rejected.
    pub fn open(path: &Path, format: FileFormat, dimension: usize) -> Result<Self> {
        let backend = match format.resolve(path) {
            FileFormat::Json => {
                let store = if path.exists() {
                    let store = FpJsonStore::load(path)?;
                    if store.metadata.dimension != dimension {
                        anyhow::bail!(
                            "Fingerprint dimension mismatch in {}: file has {}, expected {}",
                            path.display(),
                            store.metadata.dimension,
                            dimension
                        );
                    }
                    store
                } else {
                    if let Some(parent) = path.parent() {
                        if !parent.as_os_str().is_empty() {
                            std::fs::create_dir_all(parent)?;
                        }
                    }
                    FpJsonStore::new(dimension)
                };
                FileBackend::Json(store)
            }
            _ => {
                let dimension = u16::try_from(dimension).with_context(|| {
                    format!("Dimension {} does not fit a .mfp header", dimension)
                })?;
                FileBackend::Binary(MfpWriter::open(path, dimension)?)
            }
        };

        log::debug!("Opened fingerprint store {} (dimension {})", path.display(), dimension);

        Ok(Self {
            path: path.to_path_buf(),
            dimension,
            backend: Mutex::new(backend),
        })
    }

    /// Open a store that must already exist, taking the dimension from the file
    pub fn open_existing(path: &Path, format: FileFormat) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Fingerprint store not found: {}", path.display());
        }

        let dimension = match format.resolve(path) {
            FileFormat::Json => FpJsonStore::load(path)?.metadata.dimension,
            _ => MfpReader::read(path)?.header.dimension as usize,
        };
        Self::open(path, format, dimension)
    }

    /// Open the store described by the `[storage]` section
    pub fn from_config(config: &StorageConfig, dimension: usize) -> Result<Self> {
        Self::open(&config.path(), config.format, dimension)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintStore for FilesystemStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn put(&self, track: &str, fingerprint: &Fingerprint) -> Result<()> {
        check_dimension(track, fingerprint, self.dimension)?;

        match &mut *lock(&self.backend) {
            FileBackend::Binary(writer) => {
                writer.append(&FingerprintRecord::new(track, fingerprint.to_f32()))?;
            }
            FileBackend::Json(store) => {
                // Only a saved update becomes visible
                let mut updated = store.clone();
                updated.upsert(track, fingerprint.to_f32())?;
                updated
                    .save(&self.path)
                    .with_context(|| format!("Failed to save {}", self.path.display()))?;
                *store = updated;
            }
        }

        log::trace!("Stored fingerprint for {}", track);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<(String, Fingerprint)>> {
        match &*lock(&self.backend) {
            FileBackend::Binary(_) => {
                let file = MfpReader::read(&self.path)?;
                if file.truncated {
                    log::warn!(
                        "{} ends with an incomplete record; it was ignored",
                        self.path.display()
                    );
                }
                Ok(file
                    .latest_records()
                    .into_iter()
                    .map(|r| (r.track, Fingerprint::from_f32(&r.values)))
                    .collect())
            }
            FileBackend::Json(store) => Ok(store
                .tracks
                .iter()
                .map(|t| (t.path.clone(), Fingerprint::from_f32(&t.fingerprint)))
                .collect()),
        }
    }
}
