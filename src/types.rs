//! Core media types shared by capture, mixing and encoding

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of capture source a session can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Camera,
    Microphone,
    DisplayVideo,
    DisplayAudio,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Camera => "camera",
            SourceKind::Microphone => "microphone",
            SourceKind::DisplayVideo => "display-video",
            SourceKind::DisplayAudio => "display-audio",
        }
    }

    /// The kind of track this source produces
    pub fn track_kind(&self) -> TrackKind {
        match self {
            SourceKind::Camera | SourceKind::DisplayVideo => TrackKind::Video,
            SourceKind::Microphone | SourceKind::DisplayAudio => TrackKind::Audio,
        }
    }

    /// Display sources go through a user-facing picker
    pub fn uses_picker(&self) -> bool {
        matches!(self, SourceKind::DisplayVideo | SourceKind::DisplayAudio)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Descriptor of one media track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    /// Source the track originates from; `None` for mixed tracks
    pub source: Option<SourceKind>,
    pub label: String,
    pub params: TrackParams,
}

/// Format parameters of a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackParams {
    Video { width: u32, height: u32, fps: f64 },
    Audio { sample_rate: u32, channels: u16 },
}

impl TrackInfo {
    pub fn video(source: SourceKind, label: impl Into<String>, width: u32, height: u32, fps: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: TrackKind::Video,
            source: Some(source),
            label: label.into(),
            params: TrackParams::Video { width, height, fps },
        }
    }

    pub fn audio(source: Option<SourceKind>, label: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: TrackKind::Audio,
            source,
            label: label.into(),
            params: TrackParams::Audio { sample_rate, channels },
        }
    }

    /// `(sample_rate, channels)` for audio tracks
    pub fn audio_format(&self) -> Option<(u32, u16)> {
        match self.params {
            TrackParams::Audio { sample_rate, channels } => Some((sample_rate, channels)),
            TrackParams::Video { .. } => None,
        }
    }

    /// `(width, height, fps)` for video tracks
    pub fn video_format(&self) -> Option<(u32, u32, f64)> {
        match self.params {
            TrackParams::Video { width, height, fps } => Some((width, height, fps)),
            TrackParams::Audio { .. } => None,
        }
    }
}

/// A single RGB24 video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in seconds on the session clock
    pub timestamp: f64,
}

/// A single audio frame with PCM samples and timestamp
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved f32 PCM samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Presentation timestamp in seconds on the session clock
    pub timestamp: f64,
}

impl AudioFrame {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frame_count() as f64 / self.sample_rate as f64
        }
    }
}

#[derive(Debug, Clone)]
pub enum MediaSample {
    Video(VideoFrame),
    Audio(AudioFrame),
}

/// Live video track: descriptor plus the receiving end of its frame channel
#[derive(Debug)]
pub struct VideoTrack {
    pub info: TrackInfo,
    pub receiver: Receiver<VideoFrame>,
}

/// Live audio track: descriptor plus the receiving end of its frame channel
#[derive(Debug)]
pub struct AudioTrack {
    pub info: TrackInfo,
    pub receiver: Receiver<AudioFrame>,
}

impl AudioTrack {
    pub fn sample_rate(&self) -> u32 {
        self.info.audio_format().map(|(rate, _)| rate).unwrap_or(0)
    }

    pub fn channels(&self) -> u16 {
        self.info.audio_format().map(|(_, ch)| ch).unwrap_or(0)
    }
}

/// Constraints handed to a backend when acquiring a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video_width: 1280,
            video_height: 720,
            video_fps: 30.0,
            sample_rate: 48000,
            channels: 2,
        }
    }
}
