//! Batch feature extraction
//!
//! Decodes, windows, transforms and aggregates every track on a rayon pool
//! and writes each fingerprint to the store as soon as it is ready. A track
//! that fails is logged and skipped; the batch always runs to the end unless
//! cancelled.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::mpsc;

use crate::aggregate::FingerprintAggregator;
use crate::audio::{PcmStream, ResampledStream, TrackDecoder};
use crate::cancel::CancellationToken;
use crate::config::ExtractionConfig;
use crate::error::{AudioError, ExtractError};
use crate::fingerprint::Fingerprint;
use crate::mfcc::{MfccBankCache, MfccExtractor};
use crate::store::FingerprintStore;
use crate::windower::FrameWindower;
use rayon::prelude::*;

/// Receiver of batch progress, called from the thread that started the batch
pub trait ProgressSink {
    /// Completed fraction in [0.0, 1.0], non-decreasing over a batch
    fn on_progress(&self, fraction: f64);

    /// Human-readable status line
    fn on_status(&self, status: &str);
}

/// Progress sink that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, fraction: f64) {
        log::debug!("Progress: {:.1}%", fraction * 100.0);
    }

    fn on_status(&self, status: &str) {
        log::info!("{}", status);
    }
}

/// A track that produced no fingerprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFailure {
    pub track: String,
    pub reason: String,
}

/// Outcome of one extraction batch
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub total: usize,
    pub fingerprinted: usize,
    /// In input order
    pub failures: Vec<TrackFailure>,
    /// True if some tracks were never started because of cancellation
    pub cancelled: bool,
}

impl ExtractionReport {
    pub fn status_line(&self) -> String {
        let summary = format!("{} of {} tracks fingerprinted", self.fingerprinted, self.total);
        if self.cancelled {
            format!("Cancelled: {}", summary)
        } else {
            summary
        }
    }
}

enum TrackOutcome {
    Fingerprinted,
    Failed(String),
}

/// Compute one track's fingerprint.
///
/// The track is resampled first when `analysis_sample_rate` is set and
/// differs from its native rate.
pub fn extract_fingerprint(
    decoder: &dyn TrackDecoder,
    banks: &MfccBankCache,
    config: &ExtractionConfig,
    track: &str,
) -> Result<Fingerprint, ExtractError> {
    let stream = decoder.open(track)?;
    let native_rate = stream.spec().sample_rate;
    if native_rate == 0 {
        return Err(AudioError::InvalidSampleRate(native_rate).into());
    }

    let stream: Box<dyn PcmStream> = match config.analysis_sample_rate {
        Some(rate) if rate != native_rate => {
            log::debug!("Resampling {} from {} Hz to {} Hz", track, native_rate, rate);
            Box::new(ResampledStream::new(stream, rate)?)
        }
        _ => stream,
    };

    let bank = banks.get(config, stream.spec().sample_rate)?;
    let mut extractor = MfccExtractor::new(bank);
    let mut aggregator = FingerprintAggregator::new(config.num_coefficients);

    for frame in FrameWindower::new(stream, config.frame_size, config.hop_size)? {
        aggregator.push(&extractor.compute(&frame?))?;
    }

    log::trace!("{}: {} frames", track, aggregator.count());
    aggregator
        .finish()
        .ok_or_else(|| ExtractError::EmptyTrack(track.to_string()))
}

/// Extraction pipeline bound to a decoder and a store
pub struct ExtractionPipeline<'a> {
    config: ExtractionConfig,
    decoder: &'a dyn TrackDecoder,
    store: &'a dyn FingerprintStore,
    banks: MfccBankCache,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(
        config: ExtractionConfig,
        decoder: &'a dyn TrackDecoder,
        store: &'a dyn FingerprintStore,
    ) -> Result<Self> {
        config.validate()?;
        if store.dimension() != config.num_coefficients {
            anyhow::bail!(
                "Store holds {}-dimensional fingerprints but extraction produces {}",
                store.dimension(),
                config.num_coefficients
            );
        }

        Ok(Self {
            config,
            decoder,
            store,
            banks: MfccBankCache::new(),
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Fingerprint one track without storing it
    pub fn extract_track(&self, track: &str) -> Result<Fingerprint, ExtractError> {
        extract_fingerprint(self.decoder, &self.banks, &self.config, track)
    }

    fn process_track(&self, track: &str) -> TrackOutcome {
        let fingerprint = match self.extract_track(track) {
            Ok(fingerprint) => fingerprint,
            Err(e) => return TrackOutcome::Failed(e.to_string()),
        };

        match self.store.put(track, &fingerprint) {
            Ok(()) => TrackOutcome::Fingerprinted,
            Err(e) => TrackOutcome::Failed(format!("store write failed: {:#}", e)),
        }
    }

    /// Fingerprint and store every track.
    ///
    /// Progress and status go to `sink` on the calling thread. `cancel` is
    /// checked before each track starts; tracks already stored stay stored.
    pub fn run(
        &self,
        tracks: &[String],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        let total = tracks.len();
        sink.on_status(&format!("Processing 0 / {}", total));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.unwrap_or(0))
            .build()
            .context("Failed to build extraction thread pool")?;

        log::info!(
            "Extracting {} tracks on {} threads",
            total,
            pool.current_num_threads()
        );

        let (tx, rx) = mpsc::channel::<(usize, TrackOutcome)>();
        let mut completed = 0;
        let mut fingerprinted = 0;
        let mut failures: Vec<(usize, TrackFailure)> = Vec::new();

        std::thread::scope(|s| {
            s.spawn(move || {
                pool.install(|| {
                    tracks
                        .par_iter()
                        .enumerate()
                        .for_each_with(tx, |tx, (index, track)| {
                            if cancel.is_cancelled() {
                                return;
                            }
                            let outcome = self.process_track(track);
                            // The receiver outlives the pool
                            let _ = tx.send((index, outcome));
                        });
                });
            });

            for (index, outcome) in rx {
                completed += 1;
                match outcome {
                    TrackOutcome::Fingerprinted => fingerprinted += 1,
                    TrackOutcome::Failed(reason) => {
                        log::warn!("Skipping {}: {}", tracks[index], reason);
                        failures.push((
                            index,
                            TrackFailure {
                                track: tracks[index].clone(),
                                reason,
                            },
                        ));
                    }
                }

                sink.on_progress(completed as f64 / total as f64);
                sink.on_status(&format!("Processing {} / {}", completed, total));
            }
        });

        if total == 0 {
            sink.on_progress(1.0);
        }

        failures.sort_by_key(|(index, _)| *index);
        let report = ExtractionReport {
            total,
            fingerprinted,
            failures: failures.into_iter().map(|(_, failure)| failure).collect(),
            cancelled: completed < total,
        };

        let status = report.status_line();
        log::info!("{}", status);
        sink.on_status(&status);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{FileDecoder, MemoryStream};
    use crate::store::MemoryStore;
    use std::cell::RefCell;
    use std::f64::consts::PI;

    fn tone(freq: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / 16000.0).sin() as f32 * 0.5)
            .collect()
    }

    /// Serves synthetic tones; tracks named "broken*" fail to decode,
    /// "silent*" have no samples and "norate*" report a 0 Hz sample rate
    struct FakeDecoder {
        cancel_on: Option<(String, CancellationToken)>,
    }

    impl FakeDecoder {
        fn new() -> Self {
            Self { cancel_on: None }
        }
    }

    impl TrackDecoder for FakeDecoder {
        fn open(&self, track: &str) -> Result<Box<dyn PcmStream>, AudioError> {
            if let Some((name, token)) = &self.cancel_on {
                if name == track {
                    token.cancel();
                }
            }
            if track.starts_with("broken") {
                return Err(AudioError::decode(track, "invalid header"));
            }
            if track.starts_with("silent") {
                return Ok(Box::new(MemoryStream::from_samples(16000, &[], 512)));
            }
            if track.starts_with("norate") {
                return Ok(Box::new(MemoryStream::from_samples(0, &tone(300.0, 5000), 700)));
            }
            let freq = 200.0 + 100.0 * track.len() as f64;
            Ok(Box::new(MemoryStream::from_samples(16000, &tone(freq, 5000), 700)))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        progress: RefCell<Vec<f64>>,
        statuses: RefCell<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, fraction: f64) {
            self.progress.borrow_mut().push(fraction);
        }

        fn on_status(&self, status: &str) {
            self.statuses.borrow_mut().push(status.to_string());
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_bad_track_is_skipped() {
        let store = MemoryStore::new(13);
        let decoder = FakeDecoder::new();
        let pipeline =
            ExtractionPipeline::new(ExtractionConfig::default(), &decoder, &store).unwrap();
        let sink = RecordingSink::default();

        let tracks = names(&["a.mp3", "bb.mp3", "broken.mp3", "ccc.mp3", "dddd.mp3"]);
        let report = pipeline.run(&tracks, &sink, &CancellationToken::new()).unwrap();

        assert_eq!(report.fingerprinted, 4);
        assert_eq!(report.total, 5);
        assert!(!report.cancelled);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].track, "broken.mp3");
        assert_eq!(store.len(), 4);

        let statuses = sink.statuses.borrow();
        assert_eq!(statuses.first().unwrap(), "Processing 0 / 5");
        assert_eq!(statuses.last().unwrap(), "4 of 5 tracks fingerprinted");

        let progress = sink.progress.borrow();
        assert_eq!(progress.len(), 5);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*progress.last().unwrap(), 1.0);

        let stored: Vec<String> = store.get_all().unwrap().into_iter().map(|(t, _)| t).collect();
        assert!(!stored.contains(&"broken.mp3".to_string()));
    }

    #[test]
    fn test_empty_track_is_a_failure() {
        let store = MemoryStore::new(13);
        let decoder = FakeDecoder::new();
        let pipeline =
            ExtractionPipeline::new(ExtractionConfig::default(), &decoder, &store).unwrap();

        assert!(matches!(
            pipeline.extract_track("silent.wav"),
            Err(ExtractError::EmptyTrack(_))
        ));

        let report = pipeline
            .run(&names(&["silent.wav", "a.wav"]), &LogProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.status_line(), "1 of 2 tracks fingerprinted");
    }

    #[test]
    fn test_zero_sample_rate_is_a_failure() {
        let decoder = FakeDecoder::new();
        let banks = MfccBankCache::new();
        let resampled = ExtractionConfig {
            analysis_sample_rate: Some(8000),
            ..Default::default()
        };

        for config in [ExtractionConfig::default(), resampled] {
            assert!(matches!(
                extract_fingerprint(&decoder, &banks, &config, "norate.wav"),
                Err(ExtractError::Decode(AudioError::InvalidSampleRate(0)))
            ));
        }

        let store = MemoryStore::new(13);
        let pipeline = ExtractionPipeline::new(ExtractionConfig::default(), &decoder, &store);
        let report = pipeline
            .unwrap()
            .run(&names(&["norate.wav", "a.wav"]), &LogProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cancelled_before_start() {
        let store = MemoryStore::new(13);
        let decoder = FakeDecoder::new();
        let pipeline =
            ExtractionPipeline::new(ExtractionConfig::default(), &decoder, &store).unwrap();
        let sink = RecordingSink::default();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = pipeline.run(&names(&["a", "b", "c"]), &sink, &cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.fingerprinted, 0);
        assert!(store.is_empty());
        assert_eq!(
            sink.statuses.borrow().last().unwrap(),
            "Cancelled: 0 of 3 tracks fingerprinted"
        );
    }

    #[test]
    fn test_cancel_mid_batch_keeps_stored_tracks() {
        let cancel = CancellationToken::new();
        let decoder = FakeDecoder {
            cancel_on: Some(("bb".to_string(), cancel.clone())),
        };
        let store = MemoryStore::new(13);
        let config = ExtractionConfig {
            workers: Some(1),
            ..Default::default()
        };
        let pipeline = ExtractionPipeline::new(config, &decoder, &store).unwrap();

        let tracks = names(&["a", "bb", "ccc", "dddd", "eeeee"]);
        let report = pipeline.run(&tracks, &LogProgress, &cancel).unwrap();

        assert!(report.cancelled);
        assert!(report.fingerprinted >= 1 && report.fingerprinted < 5);
        assert_eq!(store.len(), report.fingerprinted);
    }

    #[test]
    fn test_store_dimension_must_match() {
        let store = MemoryStore::new(20);
        let decoder = FakeDecoder::new();
        assert!(ExtractionPipeline::new(ExtractionConfig::default(), &decoder, &store).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let store = MemoryStore::new(13);
        let decoder = FakeDecoder::new();
        let pipeline =
            ExtractionPipeline::new(ExtractionConfig::default(), &decoder, &store).unwrap();
        let sink = RecordingSink::default();

        let report = pipeline.run(&[], &sink, &CancellationToken::new()).unwrap();
        assert!(!report.cancelled);
        assert_eq!(*sink.progress.borrow(), vec![1.0]);
        assert_eq!(sink.statuses.borrow().last().unwrap(), "0 of 0 tracks fingerprinted");
    }

    #[test]
    fn test_wav_file_end_to_end() {
        let path =
            std::env::temp_dir().join(format!("sensemood-pipeline-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for sample in tone(440.0, 16000) {
            writer.write_sample((sample * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let track = path.to_str().unwrap();
        let banks = MfccBankCache::new();

        let decoder = FileDecoder::new();
        let native =
            extract_fingerprint(&decoder, &banks, &ExtractionConfig::default(), track).unwrap();
        assert_eq!(native.dimension(), 13);
        assert!(native.values().iter().all(|v| v.is_finite()));

        let resampled_config = ExtractionConfig {
            analysis_sample_rate: Some(8000),
            ..Default::default()
        };
        let resampled = extract_fingerprint(&decoder, &banks, &resampled_config, track).unwrap();
        assert_eq!(resampled.dimension(), 13);
        assert_eq!(banks.len(), 2);

        std::fs::remove_file(&path).unwrap();
    }
}
