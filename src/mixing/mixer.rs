//! Block mixer
//!
//! Pure sample arithmetic, no threads: inputs are pushed as they arrive and
//! mixed blocks are pulled once every open input has a full block buffered.

use std::collections::VecDeque;

use crate::errors::RecorderError;
use crate::types::AudioFrame;

/// Format and gain of one mixer input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixInput {
    pub sample_rate: u32,
    pub channels: u16,
    pub gain: f32,
}

#[derive(Debug)]
struct InputState {
    gain: f32,
    pending: VecDeque<f32>,
    closed: bool,
}

#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    channels: u16,
    /// Interleaved samples per block
    block_samples: usize,
    /// Buffered samples past which a lagging input is padded with silence
    max_lag_samples: usize,
    inputs: Vec<InputState>,
    base_pts: Option<f64>,
    emitted_frames: u64,
}

impl Mixer {
    pub fn new(inputs: &[MixInput], block_ms: u32, max_lag_blocks: u32) -> Result<Self, RecorderError> {
        let first = inputs
            .first()
            .ok_or_else(|| RecorderError::IncompatibleAudio("mixer needs at least one input".to_string()))?;

        if first.sample_rate == 0 || first.channels == 0 {
            return Err(RecorderError::IncompatibleAudio(
                "mixer input has no audio format".to_string(),
            ));
        }

        if let Some(other) = inputs
            .iter()
            .find(|i| i.sample_rate != first.sample_rate || i.channels != first.channels)
        {
            return Err(RecorderError::IncompatibleAudio(format!(
                "inputs must share one clock domain: {} Hz/{} ch vs {} Hz/{} ch",
                first.sample_rate, first.channels, other.sample_rate, other.channels
            )));
        }

        let block_frames = ((first.sample_rate as u64 * block_ms.max(1) as u64) / 1000).max(1) as usize;
        let block_samples = block_frames * first.channels as usize;

        Ok(Self {
            sample_rate: first.sample_rate,
            channels: first.channels,
            block_samples,
            max_lag_samples: block_samples * max_lag_blocks.max(1) as usize,
            inputs: inputs
                .iter()
                .map(|i| InputState {
                    gain: i.gain,
                    pending: VecDeque::new(),
                    closed: false,
                })
                .collect(),
            base_pts: None,
            emitted_frames: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Interleaved samples in one mixed block
    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// Queue a frame from input `index`
    pub fn push(&mut self, index: usize, frame: AudioFrame) -> Result<(), RecorderError> {
        if frame.sample_rate != self.sample_rate || frame.channels != self.channels {
            return Err(RecorderError::IncompatibleAudio(format!(
                "input {} delivered {} Hz/{} ch, mixer runs at {} Hz/{} ch",
                index, frame.sample_rate, frame.channels, self.sample_rate, self.channels
            )));
        }
        let channels = self.channels as usize;
        let input = self.inputs.get_mut(index).ok_or_else(|| {
            RecorderError::IncompatibleAudio(format!("no mixer input {}", index))
        })?;
        if input.closed {
            return Ok(());
        }

        if self.base_pts.is_none() {
            self.base_pts = Some(frame.timestamp);
        }

        let whole = frame.samples.len() - frame.samples.len() % channels;
        input.pending.extend(&frame.samples[..whole]);
        Ok(())
    }

    /// Mark input `index` as ended; it contributes silence from here on
    pub fn close(&mut self, index: usize) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.closed = true;
        }
    }

    /// All inputs ended and nothing is left to mix
    pub fn is_finished(&self) -> bool {
        self.inputs.iter().all(|i| i.closed && i.pending.is_empty())
    }

    /// Mix every block that is complete
    pub fn pull_ready(&mut self) -> Vec<AudioFrame> {
        let mut out = Vec::new();
        loop {
            let block = self.block_samples;
            let any_full = self.inputs.iter().any(|i| i.pending.len() >= block);
            if !any_full {
                break;
            }
            let all_ready = self.inputs.iter().all(|i| i.closed || i.pending.len() >= block);
            let overflowing = self.inputs.iter().any(|i| i.pending.len() >= self.max_lag_samples);
            if !(all_ready || overflowing) {
                break;
            }
            if overflowing && !all_ready {
                log::debug!("Mixer input stalled, padding with silence");
            }
            out.push(self.mix_block(block));
        }
        out
    }

    /// Close every input and mix everything still buffered, padding short
    /// inputs with silence
    pub fn flush(&mut self) -> Vec<AudioFrame> {
        for input in &mut self.inputs {
            input.closed = true;
        }
        let mut out = Vec::new();
        loop {
            let longest = self.inputs.iter().map(|i| i.pending.len()).max().unwrap_or(0);
            if longest == 0 {
                break;
            }
            out.push(self.mix_block(longest.min(self.block_samples)));
        }
        out
    }

    fn mix_block(&mut self, len: usize) -> AudioFrame {
        let mut mixed = vec![0.0f32; len];
        for input in &mut self.inputs {
            let take = len.min(input.pending.len());
            for (slot, sample) in mixed.iter_mut().zip(input.pending.drain(..take)) {
                *slot += sample * input.gain;
            }
        }
        for sample in &mut mixed {
            *sample = sample.clamp(-1.0, 1.0);
        }

        let timestamp =
            self.base_pts.unwrap_or(0.0) + self.emitted_frames as f64 / self.sample_rate as f64;
        self.emitted_frames += (len / self.channels as usize) as u64;

        AudioFrame {
            samples: mixed,
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp,
        }
    }
}
