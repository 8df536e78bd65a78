//! Streaming resampling using linear interpolation

use super::{PcmBlock, PcmStream, StreamSpec};
use crate::error::AudioError;

/// Resamples a mono stream block by block
///
/// Interpolation state carries across block boundaries, so the output is the
/// same as resampling the whole track at once.
pub struct ResampledStream<S: PcmStream> {
    inner: S,
    target_rate: u32,
    /// Input samples advanced per output sample
    ratio: f64,
    pending: Vec<f32>,
    /// Read position into `pending`
    pos: f64,
    finished: bool,
}

impl<S: PcmStream> ResampledStream<S> {
    /// Fails if either the source or the target rate is zero
    pub fn new(inner: S, target_rate: u32) -> Result<Self, AudioError> {
        let from_rate = inner.spec().sample_rate;
        if from_rate == 0 {
            return Err(AudioError::InvalidSampleRate(from_rate));
        }
        if target_rate == 0 {
            return Err(AudioError::InvalidSampleRate(target_rate));
        }
        Ok(Self {
            inner,
            target_rate,
            ratio: from_rate as f64 / target_rate as f64,
            pending: Vec::new(),
            pos: 0.0,
            finished: false,
        })
    }

    /// Emit every output sample computable from `pending`
    fn drain(&mut self, at_end: bool) -> Vec<f32> {
        let mut output = Vec::new();

        loop {
            let src_idx = self.pos.floor() as usize;
            let frac = (self.pos - src_idx as f64) as f32;

            if src_idx + 1 < self.pending.len() {
                let val = self.pending[src_idx] * (1.0 - frac) + self.pending[src_idx + 1] * frac;
                output.push(val);
            } else if at_end && src_idx < self.pending.len() {
                output.push(self.pending[src_idx]);
            } else {
                break;
            }

            self.pos += self.ratio;
        }

        let consumed = (self.pos.floor() as usize).min(self.pending.len());
        self.pending.drain(..consumed);
        self.pos -= consumed as f64;

        output
    }
}

impl<S: PcmStream> PcmStream for ResampledStream<S> {
    fn spec(&self) -> StreamSpec {
        StreamSpec {
            sample_rate: self.target_rate,
            channels: self.inner.spec().channels,
        }
    }

    fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            match self.inner.next_block()? {
                Some(block) => {
                    self.pending.extend_from_slice(&block.samples);
                    let output = self.drain(false);
                    if !output.is_empty() {
                        return Ok(Some(PcmBlock::new(output)));
                    }
                }
                None => {
                    self.finished = true;
                    let output = self.drain(true);
                    if output.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(PcmBlock::new(output)));
                }
            }
        }
    }
}
