//! moodscan - Fingerprint every track in a music directory
//!
//! Usage: moodscan <music_dir> [--config <path>] [--store <path>] [--workers N]

use anyhow::{Context, Result};
use clap::Parser;
use sensemood_cli::output::{print_json, ScanSummary};
use sensemood_cli::scan::find_audio_files;
use sensemood_core::{
    CancellationToken, ExtractionPipeline, FileDecoder, FilesystemStore, LogProgress,
    SenseMoodConfig,
};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "moodscan")]
#[command(about = "Extract mood fingerprints from a music library", long_about = None)]
struct Args {
    /// Directory scanned recursively for audio files
    music_dir: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Fingerprint store file (overrides the config)
    #[arg(short, long)]
    store: Option<String>,

    /// Worker threads (overrides the config)
    #[arg(short, long)]
    workers: Option<usize>,

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
    if args.workers.is_some() {
        config.extraction.workers = args.workers;
    }
    config.validate()?;

    let start = std::time::Instant::now();

    let tracks = find_audio_files(Path::new(&args.music_dir))?;
    let store = FilesystemStore::from_config(&config.storage, config.extraction.num_coefficients)
        .with_context(|| format!("Failed to open fingerprint store {}", config.storage.path))?;

    let decoder = FileDecoder::new();
    let pipeline = ExtractionPipeline::new(config.extraction.clone(), &decoder, &store)?;
    let report = pipeline.run(&tracks, &LogProgress, &CancellationToken::new())?;

    let elapsed = start.elapsed();
    log::info!(
        "Scanned {} in {:.2}s",
        args.music_dir,
        elapsed.as_secs_f64()
    );

    print_json(&ScanSummary::new(
        &report,
        &store.path().display().to_string(),
        elapsed.as_secs_f64(),
    ));

    Ok(())
}
