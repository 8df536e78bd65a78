//! Audio decoding collaborators
//!
//! Tracks are read as forward-only streams of mono PCM blocks. `FileDecoder`
//! supports WAV, MP3, FLAC and OGG with pure Rust decoders and falls back to
//! Symphonia for other containers (M4A/AAC, MKV).

mod container;
mod decoder;
mod resample;

pub use decoder::FileDecoder;
pub use resample::ResampledStream;

use crate::error::AudioError;
use std::collections::VecDeque;
use std::path::Path;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    // Decoded with dedicated crates
    Wav,
    Mp3,
    Flac,
    Ogg,

    // Decoded through Symphonia
    Mp4,
    Mkv,

    Unknown,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,

            Some("m4a") | Some("mp4") | Some("aac") => AudioFormat::Mp4,
            Some("mka") | Some("mkv") | Some("webm") => AudioFormat::Mkv,

            _ => AudioFormat::Unknown,
        }
    }

    /// Check if the format is decoded through the Symphonia fallback
    pub fn is_container(&self) -> bool {
        matches!(self, AudioFormat::Mp4 | AudioFormat::Mkv)
    }
}

/// Sample rate and channel layout of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamSpec {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }
}

/// A block of normalized samples in [-1.0, 1.0], interleaved if multi-channel
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBlock {
    pub samples: Vec<f32>,
}

impl PcmBlock {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }
}

/// Forward-only source of PCM blocks for one track
pub trait PcmStream: Send {
    fn spec(&self) -> StreamSpec;

    /// Next block, or `None` at end of stream
    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError>;
}

impl<S: PcmStream + ?Sized> PcmStream for Box<S> {
    fn spec(&self) -> StreamSpec {
        (**self).spec()
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        (**self).next_block()
    }
}

/// Opens tracks by reference
pub trait TrackDecoder: Send + Sync {
    fn open(&self, track: &str) -> Result<Box<dyn PcmStream>, AudioError>;
}

/// PCM stream over samples already in memory
#[derive(Debug, Clone)]
pub struct MemoryStream {
    spec: StreamSpec,
    blocks: VecDeque<Vec<f32>>,
}

impl MemoryStream {
    pub fn new(spec: StreamSpec, blocks: Vec<Vec<f32>>) -> Self {
        Self {
            spec,
            blocks: blocks.into(),
        }
    }

    /// Mono stream cut into blocks of `block_len` samples
    pub fn from_samples(sample_rate: u32, samples: &[f32], block_len: usize) -> Self {
        let blocks = samples
            .chunks(block_len.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        Self::new(StreamSpec::mono(sample_rate), blocks)
    }
}

impl PcmStream for MemoryStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        Ok(self.blocks.pop_front().map(PcmBlock::new))
    }
}

/// Convert interleaved samples to mono by averaging channels
pub(crate) fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioFormat::from_path(Path::new("a/b/song.MP3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("song.flac")), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_path(Path::new("song.m4a")), AudioFormat::Mp4);
        assert_eq!(AudioFormat::from_path(Path::new("cover.jpg")), AudioFormat::Unknown);
        assert!(AudioFormat::Mkv.is_container());
        assert!(!AudioFormat::Wav.is_container());
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_memory_stream_blocks() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut stream = MemoryStream::from_samples(8000, &samples, 4);
        assert_eq!(stream.spec(), StreamSpec::mono(8000));

        let sizes: Vec<usize> = std::iter::from_fn(|| stream.next_block().unwrap())
            .map(|b| b.samples.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }
}
