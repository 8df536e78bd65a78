//! Container demuxing and decoding using Symphonia

use super::{downmix, PcmBlock, PcmStream, StreamSpec};
use crate::error::AudioError;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Stream over the first audio track of a container file
pub(super) struct ContainerStream {
    track: String,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
}

impl ContainerStream {
    pub(super) fn open(path: &Path) -> Result<Self, AudioError> {
        let track = path.display().to_string();
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            prebuild_seek_index: false,
            seek_index_fill_rate: 20,
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| AudioError::decode(&track, e))?;
        let format = probed.format;

        // Find the first audio track
        let audio_track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::NoAudioTrack(track.clone()))?;

        let track_id = audio_track.id;
        let sample_rate = audio_track
            .codec_params
            .sample_rate
            .ok_or_else(|| AudioError::NoAudioTrack(track.clone()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&audio_track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::decode(&track, e))?;

        Ok(Self {
            track,
            format,
            decoder,
            track_id,
            sample_rate,
        })
    }
}

impl PcmStream for ContainerStream {
    fn spec(&self) -> StreamSpec {
        StreamSpec::mono(self.sample_rate)
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(AudioError::decode(&self.track, e)),
            };

            // Skip packets that don't belong to our audio track
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupted packet, keep going
                    log::debug!("Skipping corrupt packet in {}: {}", self.track, msg);
                    continue;
                }
                Err(e) => return Err(AudioError::decode(&self.track, e)),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            let mono = downmix(buffer.samples(), channels);
            if mono.is_empty() {
                continue;
            }

            return Ok(Some(PcmBlock::new(mono)));
        }
    }
}
