//! JSON output formatting

use sensemood_core::grouping::mood_label;
use sensemood_core::{ExtractionReport, TrackFailure};
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary printed by `moodscan`
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub status: String,
    pub store: String,
    pub total: usize,
    pub fingerprinted: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub failures: Vec<TrackFailure>,
    pub processing_time_seconds: f64,
}

impl ScanSummary {
    pub fn new(report: &ExtractionReport, store: &str, processing_time_seconds: f64) -> Self {
        Self {
            status: report.status_line(),
            store: store.to_string(),
            total: report.total,
            fingerprinted: report.fingerprinted,
            failed: report.failures.len(),
            cancelled: report.cancelled,
            failures: report.failures.clone(),
            processing_time_seconds,
        }
    }
}

/// One mood group
#[derive(Debug, Serialize)]
pub struct MoodGroup {
    pub cluster: usize,
    pub label: String,
    pub tracks: Vec<String>,
}

/// The mood containing the currently playing track
#[derive(Debug, Serialize)]
pub struct ActiveMood {
    pub track: String,
    pub cluster: Option<usize>,
    pub label: Option<String>,
}

/// Result printed by `moodcluster`
#[derive(Debug, Serialize)]
pub struct ClusterOutput {
    pub num_tracks: usize,
    pub num_clusters: usize,
    pub iterations: usize,
    pub converged: bool,
    pub groups: Vec<MoodGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveMood>,
}

/// Groups in cluster order, labelled for display
pub fn mood_groups(groups: BTreeMap<usize, Vec<String>>) -> Vec<MoodGroup> {
    groups
        .into_iter()
        .map(|(cluster, tracks)| MoodGroup {
            cluster,
            label: mood_label(cluster, tracks.len()),
            tracks,
        })
        .collect()
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_groups_are_labelled() {
        let mut groups = BTreeMap::new();
        groups.insert(2, vec!["x.mp3".to_string()]);
        groups.insert(0, vec!["a.mp3".to_string(), "b.mp3".to_string()]);

        let labelled = mood_groups(groups);
        assert_eq!(labelled[0].label, "Mood 1 (2 songs)");
        assert_eq!(labelled[1].cluster, 2);
        assert_eq!(labelled[1].label, "Mood 3 (1 songs)");
    }

    #[test]
    fn test_scan_summary_counts_failures() {
        let report = ExtractionReport {
            total: 5,
            fingerprinted: 4,
            failures: vec![TrackFailure {
                track: "bad.mp3".to_string(),
                reason: "decode failure".to_string(),
            }],
            cancelled: false,
        };
        let summary = ScanSummary::new(&report, "./sensemood.mfp", 1.5);
        assert_eq!(summary.status, "4 of 5 tracks fingerprinted");
        assert_eq!(summary.failed, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["fingerprinted"], 4);
    }
}
