//! Configuration parameters for extraction and clustering
//!
//! Defaults follow the mood-browsing profile: 1024-sample frames, 13 MFCCs
//! from 40 mel filters between 300 Hz and 8 kHz, five clusters.

use serde::{Deserialize, Serialize};

/// Window applied to each analysis frame before the FFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    Hamming,
    Hann,
}

impl Default for WindowFunction {
    fn default() -> Self {
        WindowFunction::Hamming
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    // Framing
    pub frame_size: usize,
    pub hop_size: usize,

    // MFCC
    pub num_coefficients: usize,
    pub num_filters: usize,
    pub low_freq: f64,
    pub high_freq: f64,
    pub window: WindowFunction,

    /// Resample every track to this rate before analysis (None = native rate)
    pub analysis_sample_rate: Option<u32>,

    /// Worker threads for the extraction pool (None = rayon default)
    pub workers: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 1024,

            num_coefficients: 13,
            num_filters: 40,
            low_freq: 300.0,
            high_freq: 8000.0,
            window: WindowFunction::default(),

            analysis_sample_rate: None,
            workers: None,
        }
    }
}

impl ExtractionConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.frame_size < 2 {
            anyhow::bail!("frame_size must be >= 2");
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size {
            anyhow::bail!("hop_size must be in 1..=frame_size");
        }
        if self.num_filters == 0 {
            anyhow::bail!("num_filters must be > 0");
        }
        if self.num_coefficients == 0 || self.num_coefficients > self.num_filters {
            anyhow::bail!("num_coefficients must be in 1..=num_filters");
        }
        if self.num_coefficients > u16::MAX as usize {
            anyhow::bail!("num_coefficients must fit the store's 16-bit dimension field");
        }
        if self.low_freq < 0.0 || self.low_freq >= self.high_freq {
            anyhow::bail!("low_freq must be >= 0 and < high_freq");
        }
        if self.analysis_sample_rate == Some(0) {
            anyhow::bail!("analysis_sample_rate must be > 0");
        }
        if self.workers == Some(0) {
            anyhow::bail!("workers must be > 0");
        }
        Ok(())
    }
}

/// K-means configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub num_clusters: usize,
    pub max_iterations: usize,
    /// Stop as soon as an iteration leaves every assignment unchanged
    pub stop_when_stable: bool,
    /// Fixed seed for centroid initialization (None = entropy)
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            num_clusters: 5,
            max_iterations: 100,
            stop_when_stable: true,
            seed: None,
        }
    }
}

impl ClusterConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_clusters == 0 {
            anyhow::bail!("num_clusters must be > 0");
        }
        if self.max_iterations == 0 {
            anyhow::bail!("max_iterations must be > 0");
        }
        Ok(())
    }
}
