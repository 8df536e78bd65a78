//! Error taxonomy for extraction and clustering

use std::path::PathBuf;
use thiserror::Error;

/// Failure to open or decode a track. Always recoverable at the pipeline level.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no decodable audio track in {0}")]
    NoAudioTrack(String),

    #[error("decode error in {track}: {message}")]
    Decode { track: String, message: String },

    #[error("expected a mono stream, got {0} channels")]
    NotMono(u16),

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AudioError {
    pub(crate) fn decode(track: &str, message: impl ToString) -> Self {
        AudioError::Decode {
            track: track.to_string(),
            message: message.to_string(),
        }
    }
}

/// Failure to produce a fingerprint for one track
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("decode failure: {0}")]
    Decode(#[from] AudioError),

    #[error("no audio frames extracted from {0}")]
    EmptyTrack(String),

    #[error("invalid extraction config: {0}")]
    Config(String),

    #[error("coefficient vector has {found} values, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Rejected or interrupted clustering request
#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("no tracks available to cluster")]
    NoFingerprints,

    #[error("cluster count must be at least 1")]
    ZeroClusters,

    #[error("iteration budget must be at least 1")]
    ZeroIterations,

    #[error("not enough tracks for {k} clusters (only {available} fingerprinted)")]
    NotEnoughFingerprints { k: usize, available: usize },

    #[error("fingerprint {index} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("initial centroid indices are invalid: {0}")]
    InvalidInitialization(String),

    #[error("assignment covers {assignments} fingerprints but {tracks} tracks were given")]
    LengthMismatch { assignments: usize, tracks: usize },

    #[error("clustering cancelled")]
    Cancelled,
}

impl ClusterError {
    /// True for the request-validation failures (as opposed to cancellation)
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            ClusterError::NoFingerprints
                | ClusterError::ZeroClusters
                | ClusterError::ZeroIterations
                | ClusterError::NotEnoughFingerprints { .. }
                | ClusterError::InvalidInitialization(_)
        )
    }
}
