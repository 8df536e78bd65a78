//! Streaming decoders for multiple formats

use super::container::ContainerStream;
use super::{downmix, AudioFormat, PcmBlock, PcmStream, StreamSpec, TrackDecoder};
use crate::error::AudioError;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Frames (per channel) read from the source per block
const BLOCK_FRAMES: usize = 4096;

/// Decodes audio files from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl FileDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl TrackDecoder for FileDecoder {
    fn open(&self, track: &str) -> Result<Box<dyn PcmStream>, AudioError> {
        let path = Path::new(track);

        if !path.exists() {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }

        let stream: Box<dyn PcmStream> = match AudioFormat::from_path(path) {
            AudioFormat::Wav => Box::new(WavStream::open(path)?),
            AudioFormat::Mp3 => Box::new(Mp3Stream::open(path)?),
            AudioFormat::Flac => Box::new(FlacStream::open(path)?),
            AudioFormat::Ogg => Box::new(OggStream::open(path)?),
            AudioFormat::Mp4 | AudioFormat::Mkv => Box::new(ContainerStream::open(path)?),
            AudioFormat::Unknown => {
                return Err(AudioError::UnsupportedFormat(path.display().to_string()));
            }
        };

        log::debug!(
            "Opened {} ({} Hz)",
            path.display(),
            stream.spec().sample_rate
        );

        Ok(stream)
    }
}

/// WAV stream
struct WavStream {
    track: String,
    reader: hound::WavReader<BufReader<File>>,
    spec: hound::WavSpec,
}

impl WavStream {
    fn open(path: &Path) -> Result<Self, AudioError> {
        let track = path.display().to_string();
        let reader = hound::WavReader::open(path).map_err(|e| AudioError::decode(&track, e))?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(AudioError::NoAudioTrack(track));
        }

        Ok(Self { track, reader, spec })
    }
}

impl PcmStream for WavStream {
    fn spec(&self) -> StreamSpec {
        StreamSpec::mono(self.spec.sample_rate)
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        let channels = self.spec.channels as usize;
        let wanted = BLOCK_FRAMES * channels;

        let interleaved: Result<Vec<f32>, hound::Error> = match self.spec.sample_format {
            hound::SampleFormat::Float => self.reader.samples::<f32>().take(wanted).collect(),
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (self.spec.bits_per_sample - 1)) as f32;
                self.reader
                    .samples::<i32>()
                    .take(wanted)
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect()
            }
        };
        let interleaved = interleaved.map_err(|e| AudioError::decode(&self.track, e))?;

        if interleaved.is_empty() {
            return Ok(None);
        }

        Ok(Some(PcmBlock::new(downmix(&interleaved, channels))))
    }
}

/// MP3 stream, one block per MPEG frame
struct Mp3Stream {
    track: String,
    decoder: minimp3::Decoder<File>,
    sample_rate: u32,
    pending: Option<PcmBlock>,
}

impl Mp3Stream {
    fn open(path: &Path) -> Result<Self, AudioError> {
        let track = path.display().to_string();
        let file = File::open(path)?;
        let mut decoder = minimp3::Decoder::new(file);

        // The first frame carries the stream parameters
        let (sample_rate, first) = loop {
            match decoder.next_frame() {
                Ok(frame) if frame.data.is_empty() => continue,
                Ok(frame) => {
                    let block = PcmBlock::new(Self::frame_to_mono(&frame));
                    break (frame.sample_rate as u32, block);
                }
                Err(minimp3::Error::SkippedData) => continue,
                Err(minimp3::Error::Eof) => return Err(AudioError::NoAudioTrack(track)),
                Err(e) => return Err(AudioError::decode(&track, e)),
            }
        };

        Ok(Self {
            track,
            decoder,
            sample_rate,
            pending: Some(first),
        })
    }

    fn frame_to_mono(frame: &minimp3::Frame) -> Vec<f32> {
        let samples: Vec<f32> = frame.data.iter().map(|&s| s as f32 / 32768.0).collect();
        downmix(&samples, frame.channels)
    }
}

impl PcmStream for Mp3Stream {
    fn spec(&self) -> StreamSpec {
        StreamSpec::mono(self.sample_rate)
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        if let Some(block) = self.pending.take() {
            return Ok(Some(block));
        }

        loop {
            match self.decoder.next_frame() {
                Ok(frame) if frame.data.is_empty() => continue,
                Ok(frame) => return Ok(Some(PcmBlock::new(Self::frame_to_mono(&frame)))),
                Err(minimp3::Error::SkippedData) => continue,
                Err(minimp3::Error::Eof) => return Ok(None),
                Err(e) => return Err(AudioError::decode(&self.track, e)),
            }
        }
    }
}

/// FLAC stream, one block per FLAC frame
struct FlacStream {
    track: String,
    reader: claxon::FlacReader<File>,
    sample_rate: u32,
    max_val: f32,
    buffer: Vec<i32>,
}

impl FlacStream {
    fn open(path: &Path) -> Result<Self, AudioError> {
        let track = path.display().to_string();
        let reader = claxon::FlacReader::open(path).map_err(|e| AudioError::decode(&track, e))?;

        let info = reader.streaminfo();
        if info.channels == 0 || info.sample_rate == 0 {
            return Err(AudioError::NoAudioTrack(track));
        }

        Ok(Self {
            track,
            sample_rate: info.sample_rate,
            max_val: (1i64 << (info.bits_per_sample - 1)) as f32,
            reader,
            buffer: Vec::new(),
        })
    }
}

impl PcmStream for FlacStream {
    fn spec(&self) -> StreamSpec {
        StreamSpec::mono(self.sample_rate)
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        let buffer = std::mem::take(&mut self.buffer);
        let block = match self.reader.blocks().read_next_or_eof(buffer) {
            Ok(Some(block)) => block,
            Ok(None) => return Ok(None),
            Err(e) => return Err(AudioError::decode(&self.track, e)),
        };

        let channels = block.channels();
        let mut mono = Vec::with_capacity(block.duration() as usize);
        for i in 0..block.duration() {
            let sum: f32 = (0..channels)
                .map(|ch| block.sample(ch, i) as f32 / self.max_val)
                .sum();
            mono.push(sum / channels as f32);
        }

        self.buffer = block.into_buffer();
        Ok(Some(PcmBlock::new(mono)))
    }
}

/// OGG Vorbis stream, one block per packet
struct OggStream {
    track: String,
    reader: lewton::inside_ogg::OggStreamReader<File>,
    sample_rate: u32,
    channels: usize,
}

impl OggStream {
    fn open(path: &Path) -> Result<Self, AudioError> {
        let track = path.display().to_string();
        let file = File::open(path)?;
        let reader = lewton::inside_ogg::OggStreamReader::new(file)
            .map_err(|e| AudioError::decode(&track, e))?;

        let sample_rate = reader.ident_hdr.audio_sample_rate;
        let channels = reader.ident_hdr.audio_channels as usize;
        if channels == 0 || sample_rate == 0 {
            return Err(AudioError::NoAudioTrack(track));
        }

        Ok(Self {
            track,
            reader,
            sample_rate,
            channels,
        })
    }
}

impl PcmStream for OggStream {
    fn spec(&self) -> StreamSpec {
        StreamSpec::mono(self.sample_rate)
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        loop {
            let packet = self
                .reader
                .read_dec_packet_itl()
                .map_err(|e| AudioError::decode(&self.track, e))?;

            match packet {
                Some(samples) if samples.is_empty() => continue,
                Some(samples) => {
                    let samples: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
                    return Ok(Some(PcmBlock::new(downmix(&samples, self.channels))));
                }
                None => return Ok(None),
            }
        }
    }
}
