//! Frame windowing
//!
//! Slices a mono PCM stream into fixed-size analysis frames. A hop smaller
//! than the frame size gives overlapping frames. The tail of the stream is
//! zero-padded into one last frame instead of being dropped.

use crate::audio::PcmStream;
use crate::error::AudioError;

/// Lazy iterator of analysis frames over one track's PCM stream
pub struct FrameWindower<S: PcmStream> {
    stream: S,
    frame_size: usize,
    hop_size: usize,
    buffer: Vec<f32>,
    /// Leading samples of `buffer` already included in an emitted frame
    covered: usize,
    frames_emitted: usize,
    finished: bool,
}

impl<S: PcmStream> FrameWindower<S> {
    /// `hop_size` is clamped to `1..=frame_size`.
    pub fn new(stream: S, frame_size: usize, hop_size: usize) -> Result<Self, AudioError> {
        let channels = stream.spec().channels;
        if channels != 1 {
            return Err(AudioError::NotMono(channels));
        }

        let frame_size = frame_size.max(1);
        Ok(Self {
            stream,
            frame_size,
            hop_size: hop_size.clamp(1, frame_size),
            buffer: Vec::with_capacity(frame_size * 2),
            covered: 0,
            frames_emitted: 0,
            finished: false,
        })
    }

    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }

    fn emit_full_frame(&mut self) -> Vec<f32> {
        let frame = self.buffer[..self.frame_size].to_vec();
        self.buffer.drain(..self.hop_size);
        self.covered = self.frame_size - self.hop_size;
        self.frames_emitted += 1;
        frame
    }
}

impl<S: PcmStream> Iterator for FrameWindower<S> {
    type Item = Result<Vec<f32>, AudioError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.buffer.len() >= self.frame_size {
                return Some(Ok(self.emit_full_frame()));
            }

            if self.finished {
                // Only pad out samples that no earlier frame has seen
                if self.buffer.len() > self.covered {
                    let mut frame = std::mem::take(&mut self.buffer);
                    frame.resize(self.frame_size, 0.0);
                    self.covered = 0;
                    self.frames_emitted += 1;
                    return Some(Ok(frame));
                }
                self.buffer.clear();
                self.covered = 0;
                return None;
            }

            match self.stream.next_block() {
                Ok(Some(block)) => self.buffer.extend_from_slice(&block.samples),
                Ok(None) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    self.buffer.clear();
                    self.covered = 0;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemoryStream, PcmBlock, StreamSpec};

    fn frames(
        samples: &[f32],
        block_len: usize,
        frame_size: usize,
        hop_size: usize,
    ) -> Vec<Vec<f32>> {
        let stream = MemoryStream::from_samples(16000, samples, block_len);
        FrameWindower::new(stream, frame_size, hop_size)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_tail_is_zero_padded() {
        let samples = vec![1.0f32; 2500];
        let frames = frames(&samples, 700, 1024, 1024);

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 1024));

        let last = &frames[2];
        assert_eq!(last[451], 1.0);
        assert!(last[452..].iter().all(|&s| s == 0.0));
        assert_eq!(last[452..].len(), 572);
    }

    #[test]
    fn test_exact_multiple_has_no_padding_frame() {
        let samples = vec![0.5f32; 2048];
        assert_eq!(frames(&samples, 1000, 1024, 1024).len(), 2);
    }

    #[test]
    fn test_short_stream_yields_one_padded_frame() {
        let frames = frames(&[0.25; 10], 4, 16, 16);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..10], &[0.25; 10]);
        assert!(frames[0][10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        assert!(frames(&[], 4, 16, 16).is_empty());
    }

    #[test]
    fn test_overlapping_frames() {
        let samples: Vec<f32> = (0..11).map(|i| i as f32).collect();
        let frames = frames(&samples, 3, 4, 2);

        // Starts at 0, 2, 4, 6; sample 10 is new data for a fifth frame
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[1], vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(frames[3], vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(frames[4], vec![8.0, 9.0, 10.0, 0.0]);
    }

    #[test]
    fn test_overlap_without_uncovered_tail() {
        let samples: Vec<f32> = (0..8).map(|i| i as f32).collect();
        // Starts at 0, 2, 4; the frame at 4 already reaches the end
        assert_eq!(frames(&samples, 8, 4, 2).len(), 3);
    }

    #[test]
    fn test_rejects_multichannel_stream() {
        let stream = MemoryStream::new(
            StreamSpec {
                sample_rate: 44100,
                channels: 2,
            },
            vec![vec![0.0; 4]],
        );
        assert!(matches!(
            FrameWindower::new(stream, 4, 4),
            Err(AudioError::NotMono(2))
        ));
    }

    struct FailingStream {
        blocks_left: usize,
    }

    impl PcmStream for FailingStream {
        fn spec(&self) -> StreamSpec {
            StreamSpec::mono(8000)
        }

        fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
            if self.blocks_left == 0 {
                return Err(AudioError::decode("failing", "broken packet"));
            }
            self.blocks_left -= 1;
            Ok(Some(PcmBlock::new(vec![0.0; 4])))
        }
    }

    #[test]
    fn test_decode_error_ends_iteration() {
        let mut windower = FrameWindower::new(FailingStream { blocks_left: 1 }, 4, 4).unwrap();

        assert!(windower.next().unwrap().is_ok());
        assert!(windower.next().unwrap().is_err());
        assert!(windower.next().is_none());
        assert_eq!(windower.frames_emitted(), 1);
    }
}
