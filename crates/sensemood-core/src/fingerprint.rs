//! Fingerprint value type

use serde::{Deserialize, Serialize};

/// Fixed-length summary of one track's timbre (mean MFCC vector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    values: Vec<f64>,
}

impl Fingerprint {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Narrow to the stored representation
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self::new(values.iter().map(|&v| v as f64).collect())
    }

    /// Squared Euclidean distance to a point of the same dimension
    pub fn distance_sq(&self, other: &[f64]) -> f64 {
        squared_distance(&self.values, other)
    }
}

impl From<Vec<f64>> for Fingerprint {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl AsRef<[f64]> for Fingerprint {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
