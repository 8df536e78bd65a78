//! SenseMood Core - mood clustering for audio libraries
//!
//! Summarizes each track's timbre as the mean of its MFCC frames, stores
//! the resulting fingerprints, and groups the library into moods with
//! k-means.

pub mod aggregate;
pub mod audio;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod grouping;
pub mod kmeans;
pub mod mfcc;
pub mod pipeline;
pub mod storage_config;
pub mod store;
pub mod windower;

pub use aggregate::FingerprintAggregator;
pub use audio::{FileDecoder, PcmStream, TrackDecoder};
pub use cancel::CancellationToken;
pub use config::{ClusterConfig, ExtractionConfig, WindowFunction};
pub use error::{AudioError, ClusterError, ExtractError};
pub use fingerprint::Fingerprint;
pub use grouping::{group_of, map_to_groups, mood_label};
pub use kmeans::{cluster, Assignment, ClusterRun, Initialization, KMeans};
pub use pipeline::{ExtractionPipeline, ExtractionReport, LogProgress, ProgressSink, TrackFailure};
pub use storage_config::{FileFormat, SenseMoodConfig, StorageConfig};
pub use store::{FilesystemStore, FingerprintStore, MemoryStore};

/// Fingerprint a single audio file with the bundled decoder
pub fn fingerprint_track(
    path: &str,
    config: &ExtractionConfig,
) -> Result<Fingerprint, ExtractError> {
    config
        .validate()
        .map_err(|e| ExtractError::Config(e.to_string()))?;
    pipeline::extract_fingerprint(&FileDecoder::new(), &mfcc::MfccBankCache::new(), config, path)
}
