//! Tests for k-means clustering

use super::*;
use approx::assert_abs_diff_eq;

fn points(coords: &[(f64, f64)]) -> Vec<Fingerprint> {
    coords
        .iter()
        .map(|&(x, y)| Fingerprint::new(vec![x, y]))
        .collect()
}

fn two_blobs() -> Vec<Fingerprint> {
    points(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (10.0, 10.0), (10.0, 11.0), (11.0, 10.0)])
}

#[test]
fn test_two_obvious_groups() {
    let run = KMeans::new(2)
        .with_initialization(Initialization::Indices(vec![0, 3]))
        .run(&two_blobs())
        .unwrap();

    assert_eq!(run.assignment.labels(), &[0, 0, 0, 1, 1, 1]);
    assert_eq!(run.iterations, 2);
    assert!(run.converged);

    assert_abs_diff_eq!(run.centroids[0][0], 1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(run.centroids[0][1], 1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(run.centroids[1][0], 31.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(run.centroids[1][1], 31.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn test_full_budget_matches_early_stop() {
    let init = Initialization::Indices(vec![1, 5]);
    let early = KMeans::new(2)
        .with_initialization(init.clone())
        .run(&two_blobs())
        .unwrap();
    let full = KMeans::new(2)
        .with_initialization(init)
        .with_stop_when_stable(false)
        .with_max_iterations(20)
        .run(&two_blobs())
        .unwrap();

    assert_eq!(early.assignment, full.assignment);
    assert_eq!(full.iterations, 20);
    assert!(full.converged);
}

#[test]
fn test_k_equals_n_gives_singletons() {
    let data = two_blobs();
    let run = KMeans::new(data.len()).with_seed(Some(7)).run(&data).unwrap();

    assert_eq!(run.assignment.cluster_sizes(), vec![1; data.len()]);
    assert_eq!(run.iterations, 2);
    assert!(run.converged);
}

#[test]
fn test_k_equals_n_runs_full_budget_without_early_stop() {
    let data = two_blobs();
    let early = KMeans::new(data.len()).with_seed(Some(7)).run(&data).unwrap();
    let full = KMeans::new(data.len())
        .with_seed(Some(7))
        .with_stop_when_stable(false)
        .with_max_iterations(10)
        .run(&data)
        .unwrap();

    assert_eq!(full.assignment.cluster_sizes(), vec![1; data.len()]);
    assert_eq!(full.iterations, 10);
    assert!(full.converged);
    assert_eq!(full.assignment, early.assignment);
}

#[test]
fn test_zero_iteration_budget_is_rejected() {
    let result = KMeans::new(2).with_max_iterations(0).run(&two_blobs());
    assert_eq!(result.map(|run| run.iterations), Err(ClusterError::ZeroIterations));
}

#[test]
fn test_empty_cluster_keeps_centroid() {
    let data = points(&[(0.0, 0.0), (0.0, 0.0), (5.0, 5.0)]);
    let run = KMeans::new(2)
        .with_initialization(Initialization::Indices(vec![0, 1]))
        .with_max_iterations(1)
        .run(&data)
        .unwrap();

    // Equal distances go to cluster 0, leaving cluster 1 empty
    assert_eq!(run.assignment.labels(), &[0, 0, 0]);
    assert_eq!(run.centroids[1], vec![0.0, 0.0]);
    assert_abs_diff_eq!(run.centroids[0][0], 5.0 / 3.0, epsilon = 1e-12);
    assert!(run.centroids.iter().flatten().all(|v| v.is_finite()));
    assert_eq!(run.assignment.cluster_sizes(), vec![3, 0]);
}

#[test]
fn test_same_seed_same_assignment() {
    let data: Vec<Fingerprint> = (0..40)
        .map(|i| Fingerprint::new(vec![(i % 7) as f64, (i * 3 % 11) as f64, i as f64 * 0.1]))
        .collect();

    let a = cluster(&data, 4, Some(1234)).unwrap();
    let b = cluster(&data, 4, Some(1234)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_labels_in_range_for_every_k() {
    let data = two_blobs();
    for k in 1..=data.len() {
        let assignment = cluster(&data, k, Some(k as u64)).unwrap();
        assert_eq!(assignment.len(), data.len());
        assert_eq!(assignment.num_clusters(), k);
        assert!(assignment.labels().iter().all(|&label| label < k));
    }
}

#[test]
fn test_entropy_seeded_run_is_valid() {
    let assignment = cluster(&two_blobs(), 2, None).unwrap();
    assert_eq!(assignment.len(), 6);
    assert!(assignment.labels().iter().all(|&label| label < 2));
}

#[test]
fn test_invalid_requests() {
    assert_eq!(cluster(&[], 2, None), Err(ClusterError::NoFingerprints));
    assert_eq!(cluster(&two_blobs(), 0, None), Err(ClusterError::ZeroClusters));
    assert_eq!(
        cluster(&two_blobs(), 7, None),
        Err(ClusterError::NotEnoughFingerprints { k: 7, available: 6 })
    );
}

#[test]
fn test_mixed_dimensions_rejected() {
    let mut data = two_blobs();
    data.push(Fingerprint::new(vec![1.0, 2.0, 3.0]));

    assert_eq!(
        cluster(&data, 2, Some(0)),
        Err(ClusterError::DimensionMismatch {
            index: 6,
            expected: 2,
            found: 3
        })
    );
}

#[test]
fn test_bad_initial_indices() {
    let kmeans = |indices: Vec<usize>| {
        KMeans::new(2)
            .with_initialization(Initialization::Indices(indices))
            .run(&two_blobs())
    };

    assert!(matches!(kmeans(vec![0]), Err(ClusterError::InvalidInitialization(_))));
    assert!(matches!(kmeans(vec![0, 6]), Err(ClusterError::InvalidInitialization(_))));
    assert!(matches!(kmeans(vec![2, 2]), Err(ClusterError::InvalidInitialization(_))));
}

#[test]
fn test_cancelled_before_first_iteration() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = KMeans::new(2).with_seed(Some(1)).run_cancellable(&two_blobs(), &cancel);
    assert_eq!(result.unwrap_err(), ClusterError::Cancelled);
}

#[test]
fn test_assignment_accessors() {
    let assignment = Assignment::new(vec![1, 0, 1, 2], 4);
    assert_eq!(assignment.members(1), vec![0, 2]);
    assert_eq!(assignment.cluster_of(3), Some(2));
    assert_eq!(assignment.cluster_of(4), None);
    assert_eq!(assignment.cluster_sizes(), vec![1, 2, 1, 0]);
}
