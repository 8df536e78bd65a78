//! Mel-frequency cepstral coefficients
//!
//! Window → FFT magnitude → triangular mel filter bank → floored log energy
//! → DCT-II, keeping the first `num_coefficients` values. Everything that
//! depends only on configuration lives in an `MfccBank` and is shared
//! between tracks through `MfccBankCache`.

use crate::config::{ExtractionConfig, WindowFunction};
use crate::error::ExtractError;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

/// Log energy assigned to empty or vanishing filter outputs
pub const MIN_LOG_ENERGY: f64 = -50.0;

/// One triangular filter, stored sparsely from its first non-zero bin
#[derive(Debug, Clone)]
struct MelFilter {
    start_bin: usize,
    center_hz: f64,
    weights: Vec<f64>,
}

/// Precomputed window, FFT plan, filter bank and DCT matrix
pub struct MfccBank {
    sample_rate: u32,
    frame_size: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    filters: Vec<MelFilter>,
    /// [coefficient][filter]
    dct: Vec<Vec<f64>>,
}

impl std::fmt::Debug for MfccBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfccBank")
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .field("num_filters", &self.filters.len())
            .field("num_coefficients", &self.dct.len())
            .finish()
    }
}

impl MfccBank {
    pub fn new(config: &ExtractionConfig, sample_rate: u32) -> Result<Self, ExtractError> {
        config
            .validate()
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        if sample_rate == 0 {
            return Err(ExtractError::Config("sample rate must be > 0".to_string()));
        }

        let nyquist = sample_rate as f64 / 2.0;
        let high_freq = config.high_freq.min(nyquist);
        if config.low_freq >= high_freq {
            return Err(ExtractError::Config(format!(
                "low_freq {} Hz is not below the effective high bound {} Hz",
                config.low_freq, high_freq
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.frame_size);

        Ok(Self {
            sample_rate,
            frame_size: config.frame_size,
            window: create_window(config.window, config.frame_size),
            fft,
            filters: create_mel_filters(
                config.num_filters,
                config.frame_size,
                sample_rate,
                config.low_freq,
                high_freq,
            ),
            dct: create_dct_matrix(config.num_coefficients, config.num_filters),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn num_coefficients(&self) -> usize {
        self.dct.len()
    }

    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }
}

/// Per-track MFCC calculator with reusable work buffers
pub struct MfccExtractor {
    bank: Arc<MfccBank>,
    spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
    log_energies: Vec<f64>,
}

impl MfccExtractor {
    pub fn new(bank: Arc<MfccBank>) -> Self {
        let scratch_len = bank.fft.get_inplace_scratch_len();
        Self {
            spectrum: vec![Complex::new(0.0, 0.0); bank.frame_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; bank.frame_size / 2 + 1],
            log_energies: vec![0.0; bank.filters.len()],
            bank,
        }
    }

    /// Compute the coefficient vector for one frame.
    ///
    /// Frames shorter than the configured size are zero-padded, longer ones
    /// are truncated.
    pub fn compute(&mut self, frame: &[f32]) -> Vec<f64> {
        let bank = &self.bank;

        for (i, slot) in self.spectrum.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0) as f64;
            *slot = Complex::new(sample * bank.window[i], 0.0);
        }

        bank.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for (mag, bin) in self.magnitudes.iter_mut().zip(self.spectrum.iter()) {
            *mag = bin.norm();
        }

        for (log_energy, filter) in self.log_energies.iter_mut().zip(bank.filters.iter()) {
            let energy: f64 = filter
                .weights
                .iter()
                .zip(&self.magnitudes[filter.start_bin..])
                .map(|(w, m)| w * m)
                .sum();
            *log_energy = floored_log(energy);
        }

        bank.dct
            .iter()
            .map(|row| row.iter().zip(&self.log_energies).map(|(c, e)| c * e).sum())
            .collect()
    }
}

/// Natural log, floored at `MIN_LOG_ENERGY` for zero, tiny or non-finite input
fn floored_log(energy: f64) -> f64 {
    if energy > 0.0 && energy.is_finite() {
        energy.ln().max(MIN_LOG_ENERGY)
    } else {
        MIN_LOG_ENERGY
    }
}

/// Cache of banks keyed by every parameter a bank depends on
#[derive(Debug, Default)]
pub struct MfccBankCache {
    banks: Mutex<HashMap<BankKey, Arc<MfccBank>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BankKey {
    sample_rate: u32,
    frame_size: usize,
    num_coefficients: usize,
    num_filters: usize,
    low_freq_bits: u64,
    high_freq_bits: u64,
    window: WindowFunction,
}

impl MfccBankCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared bank for this configuration and sample rate, built on first use
    pub fn get(
        &self,
        config: &ExtractionConfig,
        sample_rate: u32,
    ) -> Result<Arc<MfccBank>, ExtractError> {
        let key = BankKey {
            sample_rate,
            frame_size: config.frame_size,
            num_coefficients: config.num_coefficients,
            num_filters: config.num_filters,
            low_freq_bits: config.low_freq.to_bits(),
            high_freq_bits: config.high_freq.to_bits(),
            window: config.window,
        };

        let mut banks = self.banks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bank) = banks.get(&key) {
            return Ok(Arc::clone(bank));
        }

        log::debug!(
            "Building MFCC bank: {} Hz, frame {}, {} filters, {} coefficients",
            sample_rate,
            config.frame_size,
            config.num_filters,
            config.num_coefficients
        );
        let bank = Arc::new(MfccBank::new(config, sample_rate)?);
        banks.insert(key, Arc::clone(&bank));
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.banks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn create_window(function: WindowFunction, size: usize) -> Vec<f64> {
    let denom = (size.max(2) - 1) as f64;
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / denom;
            match function {
                WindowFunction::Hamming => 0.54 - 0.46 * x.cos(),
                WindowFunction::Hann => 0.5 * (1.0 - x.cos()),
            }
        })
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters with edges equally spaced on the mel scale
fn create_mel_filters(
    num_filters: usize,
    frame_size: usize,
    sample_rate: u32,
    low_freq: f64,
    high_freq: f64,
) -> Vec<MelFilter> {
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);
    let bin_hz = sample_rate as f64 / frame_size as f64;
    let last_bin = frame_size / 2;

    let edges: Vec<f64> = (0..num_filters + 2)
        .map(|i| mel_to_hz(mel_low + (mel_high - mel_low) * i as f64 / (num_filters + 1) as f64))
        .collect();

    (0..num_filters)
        .map(|f| {
            let (start_hz, center_hz, end_hz) = (edges[f], edges[f + 1], edges[f + 2]);

            let start_bin = (start_hz / bin_hz).ceil() as usize;
            let end_bin = ((end_hz / bin_hz).floor() as usize).min(last_bin);

            let weights = (start_bin..=end_bin)
                .map(|bin| {
                    let freq = bin as f64 * bin_hz;
                    let weight = if freq <= center_hz {
                        (freq - start_hz) / (center_hz - start_hz)
                    } else {
                        (end_hz - freq) / (end_hz - center_hz)
                    };
                    weight.max(0.0)
                })
                .collect();

            MelFilter {
                start_bin: start_bin.min(last_bin),
                center_hz,
                weights,
            }
        })
        .collect()
}

/// Unnormalized DCT-II basis, `num_coefficients` rows by `num_filters` columns
fn create_dct_matrix(num_coefficients: usize, num_filters: usize) -> Vec<Vec<f64>> {
    (0..num_coefficients)
        .map(|k| {
            (0..num_filters)
                .map(|m| (PI * k as f64 * (m as f64 + 0.5) / num_filters as f64).cos())
                .collect()
        })
        .collect()
}
