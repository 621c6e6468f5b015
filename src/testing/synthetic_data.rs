//! Synthetic frames for offline testing
//!
//! Video is a moving RGB gradient so every frame differs; audio is a 440 Hz
//! sine tone at a level that never clips.

use crate::types::{AudioFrame, VideoFrame};

/// RGB24 gradient frame that shifts with `frame_number`
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32, timestamp: f64) -> VideoFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    VideoFrame {
        data,
        width,
        height,
        timestamp,
    }
}

/// Interleaved sine tone; `frames` samples per channel, phase-continuous
/// across consecutive `frame_number`s
pub fn synthetic_audio_frame(
    frame_number: u64,
    frames: usize,
    sample_rate: u32,
    channels: u16,
    timestamp: f64,
) -> AudioFrame {
    let frequency = 440.0;
    let channels_usize = channels as usize;
    let mut samples = vec![0.0f32; frames * channels_usize];

    for i in 0..frames {
        let t = (frame_number as f64 * frames as f64 + i as f64) / sample_rate as f64;
        let value = (2.0 * std::f64::consts::PI * frequency * t).sin() as f32 * 0.3;
        for ch in 0..channels_usize {
            samples[i * channels_usize + ch] = value;
        }
    }

    AudioFrame {
        samples,
        sample_rate,
        channels,
        timestamp,
    }
}
