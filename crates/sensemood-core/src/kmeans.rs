//! K-means clustering of track fingerprints
//!
//! Lloyd iterations with Euclidean distance. Initial centroids are distinct
//! input points drawn without replacement (seedable), or given explicitly.
//! Assignment runs in parallel across points; centroids are updated on the
//! calling thread once every point has a label.

use crate::cancel::CancellationToken;
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::fingerprint::{squared_distance, Fingerprint};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

#[cfg(test)]
mod tests;

/// How the first centroids are chosen
#[derive(Debug, Clone, PartialEq)]
pub enum Initialization {
    /// K distinct points chosen uniformly at random; entropy-seeded when `seed` is None
    Random { seed: Option<u64> },
    /// Use the points at these indices, one per cluster
    Indices(Vec<usize>),
}

impl Default for Initialization {
    fn default() -> Self {
        Initialization::Random { seed: None }
    }
}

/// Cluster index per input point, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    labels: Vec<usize>,
    num_clusters: usize,
}

impl Assignment {
    pub fn new(labels: Vec<usize>, num_clusters: usize) -> Self {
        Self {
            labels,
            num_clusters,
        }
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn cluster_of(&self, index: usize) -> Option<usize> {
        self.labels.get(index).copied()
    }

    /// Indices of the points labelled `cluster`, ascending
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == cluster)
            .map(|(i, _)| i)
            .collect()
    }

    /// Point count per cluster index, including empty clusters
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.num_clusters];
        for &label in &self.labels {
            if let Some(size) = sizes.get_mut(label) {
                *size += 1;
            }
        }
        sizes
    }
}

/// Result of a complete clustering run
#[derive(Debug, Clone)]
pub struct ClusterRun {
    pub assignment: Assignment,
    pub centroids: Vec<Vec<f64>>,
    /// Assignment passes performed
    pub iterations: usize,
    /// True if the last pass left every label unchanged
    pub converged: bool,
}

/// K-means clustering engine
#[derive(Debug, Clone)]
pub struct KMeans {
    num_clusters: usize,
    max_iterations: usize,
    stop_when_stable: bool,
    initialization: Initialization,
}

impl KMeans {
    pub fn new(num_clusters: usize) -> Self {
        let defaults = ClusterConfig::default();
        Self {
            num_clusters,
            max_iterations: defaults.max_iterations,
            stop_when_stable: defaults.stop_when_stable,
            initialization: Initialization::default(),
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            num_clusters: config.num_clusters,
            max_iterations: config.max_iterations,
            stop_when_stable: config.stop_when_stable,
            initialization: Initialization::Random { seed: config.seed },
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_stop_when_stable(mut self, stop_when_stable: bool) -> Self {
        self.stop_when_stable = stop_when_stable;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.initialization = Initialization::Random { seed };
        self
    }

    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    pub fn run<P>(&self, points: &[P]) -> Result<ClusterRun, ClusterError>
    where
        P: AsRef<[f64]> + Sync,
    {
        self.run_cancellable(points, &CancellationToken::new())
    }

    /// Cluster `points`, checking `cancel` before every iteration
    pub fn run_cancellable<P>(
        &self,
        points: &[P],
        cancel: &CancellationToken,
    ) -> Result<ClusterRun, ClusterError>
    where
        P: AsRef<[f64]> + Sync,
    {
        let dimension = self.validate(points)?;
        let k = self.num_clusters;

        let mut centroids: Vec<Vec<f64>> = self
            .initial_indices(points.len())?
            .into_iter()
            .map(|i| points[i].as_ref().to_vec())
            .collect();

        let mut labels: Vec<usize> = Vec::new();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            if cancel.is_cancelled() {
                log::info!("K-means cancelled after {} iterations", iterations);
                return Err(ClusterError::Cancelled);
            }

            let next: Vec<usize> = points
                .par_iter()
                .map(|p| nearest_centroid(p.as_ref(), &centroids))
                .collect();
            iterations += 1;

            converged = next == labels;
            labels = next;
            if converged && self.stop_when_stable {
                break;
            }

            update_centroids(points, &labels, &mut centroids, dimension);
        }

        log::debug!(
            "K-means with k={} over {} points: {} iterations, converged: {}",
            k,
            points.len(),
            iterations,
            converged
        );

        Ok(ClusterRun {
            assignment: Assignment::new(labels, k),
            centroids,
            iterations,
            converged,
        })
    }

    /// Check the request and return the common dimension
    fn validate<P: AsRef<[f64]>>(&self, points: &[P]) -> Result<usize, ClusterError> {
        let first = points.first().ok_or(ClusterError::NoFingerprints)?;
        if self.num_clusters == 0 {
            return Err(ClusterError::ZeroClusters);
        }
        if self.max_iterations == 0 {
            return Err(ClusterError::ZeroIterations);
        }
        if self.num_clusters > points.len() {
            return Err(ClusterError::NotEnoughFingerprints {
                k: self.num_clusters,
                available: points.len(),
            });
        }

        let dimension = first.as_ref().len();
        if let Some((index, point)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| p.as_ref().len() != dimension)
        {
            return Err(ClusterError::DimensionMismatch {
                index,
                expected: dimension,
                found: point.as_ref().len(),
            });
        }
        Ok(dimension)
    }

    fn initial_indices(&self, n: usize) -> Result<Vec<usize>, ClusterError> {
        let k = self.num_clusters;
        match &self.initialization {
            Initialization::Random { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_entropy(),
                };
                Ok(rand::seq::index::sample(&mut rng, n, k).into_vec())
            }
            Initialization::Indices(indices) => {
                if indices.len() != k {
                    return Err(ClusterError::InvalidInitialization(format!(
                        "{} indices given for {} clusters",
                        indices.len(),
                        k
                    )));
                }
                if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
                    return Err(ClusterError::InvalidInitialization(format!(
                        "index {} out of range for {} points",
                        bad, n
                    )));
                }
                let mut sorted = indices.clone();
                sorted.sort_unstable();
                if sorted.windows(2).any(|w| w[0] == w[1]) {
                    return Err(ClusterError::InvalidInitialization(
                        "indices must be distinct".to_string(),
                    ));
                }
                Ok(indices.clone())
            }
        }
    }
}

/// Index of the closest centroid; ties go to the lowest index
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

/// Move each centroid to the mean of its members. Empty clusters keep theirs.
fn update_centroids<P: AsRef<[f64]>>(
    points: &[P],
    labels: &[usize],
    centroids: &mut [Vec<f64>],
    dimension: usize,
) {
    let mut sums = vec![vec![0.0; dimension]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (sum, &x) in sums[label].iter_mut().zip(point.as_ref()) {
            *sum += x;
        }
    }

    for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
        if count == 0 {
            continue;
        }
        let inv = 1.0 / count as f64;
        for (c, s) in centroid.iter_mut().zip(sum) {
            *c = s * inv;
        }
    }
}

/// Cluster fingerprints into `k` groups with default settings
pub fn cluster(
    fingerprints: &[Fingerprint],
    k: usize,
    seed: Option<u64>,
) -> Result<Assignment, ClusterError> {
    Ok(KMeans::new(k).with_seed(seed).run(fingerprints)?.assignment)
}
