//! moodcluster - Group fingerprinted tracks into moods
//!
//! Usage: moodcluster [--config <path>] [--store <path>] [-k K] [--seed S] [--track <path>]

use anyhow::{Context, Result};
use clap::Parser;
use sensemood_cli::output::{mood_groups, print_json, ActiveMood, ClusterOutput};
use sensemood_core::{
    group_of, map_to_groups, mood_label, FilesystemStore, FingerprintStore, KMeans,
    SenseMoodConfig,
};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "moodcluster")]
#[command(about = "Cluster stored fingerprints into mood groups", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Fingerprint store file (overrides the config)
    #[arg(short, long)]
    store: Option<String>,

    /// Number of moods (overrides the config)
    #[arg(short)]
    k: Option<usize>,

    /// Seed for centroid initialization (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Report which mood this track belongs to
    #[arg(short, long)]
    track: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    sensemood_cli::init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => SenseMoodConfig::load(Path::new(path))?,
        None => SenseMoodConfig::default(),
    };
    if let Some(store) = &args.store {
        config.storage.path = store.clone();
    }
    if let Some(k) = args.k {
        config.clustering.num_clusters = k;
    }
    if args.seed.is_some() {
        config.clustering.seed = args.seed;
    }
    config.validate()?;

    let store = FilesystemStore::open_existing(&config.storage.path(), config.storage.format)
        .with_context(|| format!("Failed to open fingerprint store {}", config.storage.path))?;
    let (tracks, fingerprints): (Vec<String>, Vec<_>) = store.get_all()?.into_iter().unzip();

    log::info!(
        "Clustering {} tracks into {} moods",
        tracks.len(),
        config.clustering.num_clusters
    );

    let run = KMeans::from_config(&config.clustering).run(&fingerprints)?;
    let groups = map_to_groups(&run.assignment, &tracks)?;

    let active = match &args.track {
        Some(track) => {
            let cluster = group_of(&run.assignment, &tracks, track.as_str())?;
            if cluster.is_none() {
                log::warn!("{} has no stored fingerprint", track);
            }
            let label = cluster.map(|c| mood_label(c, groups.get(&c).map_or(0, Vec::len)));
            Some(ActiveMood {
                track: track.clone(),
                cluster,
                label,
            })
        }
        None => None,
    };

    print_json(&ClusterOutput {
        num_tracks: tracks.len(),
        num_clusters: run.assignment.num_clusters(),
        iterations: run.iterations,
        converged: run.converged,
        groups: mood_groups(groups),
        active,
    });

    Ok(())
}
