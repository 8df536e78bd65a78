//! Mapping cluster assignments back to tracks

use crate::error::ClusterError;
use crate::kmeans::Assignment;
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Group tracks by cluster index.
///
/// `tracks` must be in the same order as the fingerprints that produced the
/// assignment. Tracks keep their input order inside each group, and only
/// clusters with at least one member appear in the map.
pub fn map_to_groups<T: Clone>(
    assignment: &Assignment,
    tracks: &[T],
) -> Result<BTreeMap<usize, Vec<T>>, ClusterError> {
    check_lengths(assignment, tracks.len())?;

    let mut groups: BTreeMap<usize, Vec<T>> = BTreeMap::new();
    for (&label, track) in assignment.labels().iter().zip(tracks) {
        groups.entry(label).or_default().push(track.clone());
    }
    Ok(groups)
}

/// Cluster of `active`, or `None` if it is not among `tracks`
pub fn group_of<T, Q>(
    assignment: &Assignment,
    tracks: &[T],
    active: &Q,
) -> Result<Option<usize>, ClusterError>
where
    T: Borrow<Q>,
    Q: PartialEq + ?Sized,
{
    check_lengths(assignment, tracks.len())?;

    Ok(tracks
        .iter()
        .position(|t| t.borrow() == active)
        .and_then(|i| assignment.cluster_of(i)))
}

/// Display name for a group, numbered from 1
pub fn mood_label(cluster: usize, size: usize) -> String {
    format!("Mood {} ({} songs)", cluster + 1, size)
}

fn check_lengths(assignment: &Assignment, tracks: usize) -> Result<(), ClusterError> {
    if assignment.len() != tracks {
        return Err(ClusterError::LengthMismatch {
            assignments: assignment.len(),
            tracks,
        });
    }
    Ok(())
}
