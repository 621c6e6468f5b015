//! Which sources a session requests and how their tracks are chosen

use serde::{Deserialize, Serialize};

use crate::errors::RecorderError;
use crate::types::SourceKind;

/// Precedence between the two video sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoPriority {
    #[default]
    DisplayFirst,
    CameraFirst,
}

/// Precedence between the two audio sources when they are not mixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioPriority {
    #[default]
    MicrophoneFirst,
    DisplayFirst,
}

/// Sources to acquire for one recording session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selection {
    pub camera: bool,
    pub microphone: bool,
    pub display_video: bool,
    pub display_audio: bool,
    pub mix_microphone_and_display_audio: bool,
    pub video_priority: VideoPriority,
    pub audio_priority: AudioPriority,
}

impl Selection {
    pub fn camera_only() -> Self {
        Self {
            camera: true,
            ..Self::default()
        }
    }

    pub fn camera_and_microphone() -> Self {
        Self {
            camera: true,
            microphone: true,
            ..Self::default()
        }
    }

    /// Screen share with its audio merged with the microphone
    pub fn screen_with_mixed_audio() -> Self {
        Self {
            display_video: true,
            display_audio: true,
            microphone: true,
            mix_microphone_and_display_audio: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.camera || self.microphone || self.display_video || self.display_audio)
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.is_empty() {
            return Err(RecorderError::InvalidSelection(
                "no capture source requested".to_string(),
            ));
        }
        Ok(())
    }

    /// Requested sources in acquisition order; picker-driven sources come first
    pub fn requested_sources(&self) -> Vec<SourceKind> {
        [
            (self.display_video, SourceKind::DisplayVideo),
            (self.display_audio, SourceKind::DisplayAudio),
            (self.camera, SourceKind::Camera),
            (self.microphone, SourceKind::Microphone),
        ]
        .into_iter()
        .filter_map(|(wanted, kind)| wanted.then_some(kind))
        .collect()
    }

    /// Whether both audio sources are requested and should be merged
    pub fn wants_mix(&self) -> bool {
        self.mix_microphone_and_display_audio && self.microphone && self.display_audio
    }

    /// Video sources in precedence order
    pub fn video_precedence(&self) -> [SourceKind; 2] {
        match self.video_priority {
            VideoPriority::DisplayFirst => [SourceKind::DisplayVideo, SourceKind::Camera],
            VideoPriority::CameraFirst => [SourceKind::Camera, SourceKind::DisplayVideo],
        }
    }

    /// Audio sources in precedence order
    pub fn audio_precedence(&self) -> [SourceKind; 2] {
        match self.audio_priority {
            AudioPriority::MicrophoneFirst => [SourceKind::Microphone, SourceKind::DisplayAudio],
            AudioPriority::DisplayFirst => [SourceKind::DisplayAudio, SourceKind::Microphone],
        }
    }
}
