//! Configuration management for crabrec
//!
//! Capture constraints, encoder preferences, mixer gains and artifact storage
//! are loaded from a TOML file, falling back to defaults.

use crate::errors::RecorderError;
use crate::types::MediaConstraints;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Container/codec pairings tried in order; the first one the encoder supports wins
pub const DEFAULT_MIME_PREFERENCES: [&str; 4] = [
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/mp4;codecs=h264",
    "video/webm;codecs=h264",
];

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub capture: CaptureConfig,
    pub encoding: EncodingConfig,
    pub mixing: MixingConfig,
    pub storage: StorageConfig,
}

/// Constraints requested from capture devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: f64,
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// MIME types in preference order
    pub preferred_mime_types: Vec<String>,
    /// Interval at which the encoder hands buffered output to the session
    pub timeslice_ms: u64,
    /// How long stop waits for the encoder's terminal event
    pub finalize_timeout_ms: u64,
    /// Target video bitrate in bits per second
    pub video_bitrate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixingConfig {
    pub microphone_gain: f32,
    pub display_audio_gain: f32,
    /// Mixer block length in milliseconds
    pub block_ms: u32,
    /// Blocks an input may fall behind before it is padded with silence
    pub max_lag_blocks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Write every finished artifact to `output_directory`
    pub auto_download: bool,
    pub output_directory: String,
    /// File name prefix for saved artifacts
    pub file_prefix: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                video_width: 1280,
                video_height: 720,
                video_fps: 30.0,
                sample_rate: 48000,
                channels: 2,
            },
            encoding: EncodingConfig {
                preferred_mime_types: DEFAULT_MIME_PREFERENCES
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                timeslice_ms: 1000,
                finalize_timeout_ms: 10_000,
                video_bitrate: 2_500_000,
            },
            mixing: MixingConfig {
                microphone_gain: 1.0,
                display_audio_gain: 1.0,
                block_ms: 10,
                max_lag_blocks: 20,
            },
            storage: StorageConfig {
                auto_download: false,
                output_directory: "./recordings".to_string(),
                file_prefix: "recording".to_string(),
            },
        }
    }
}

impl RecorderConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| RecorderError::Config(format!("Failed to read config file: {}", e)))?;

        let config: RecorderConfig = toml::from_str(&contents)
            .map_err(|e| RecorderError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(RecorderError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecorderError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RecorderError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabrec.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Constraints handed to capture backends
    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            video_width: self.capture.video_width,
            video_height: self.capture.video_height,
            video_fps: self.capture.video_fps,
            sample_rate: self.capture.sample_rate,
            channels: self.capture.channels,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.capture.video_width == 0 || self.capture.video_height == 0 {
            return Err("Invalid video resolution".to_string());
        }
        if !(self.capture.video_fps > 0.0 && self.capture.video_fps <= 240.0) {
            return Err("Invalid video FPS (must be in (0, 240])".to_string());
        }
        if self.capture.sample_rate < 8000 || self.capture.sample_rate > 192_000 {
            return Err("Sample rate must be between 8000 and 192000 Hz".to_string());
        }
        if self.capture.channels == 0 || self.capture.channels > 8 {
            return Err("Channel count must be between 1 and 8".to_string());
        }

        if self.encoding.timeslice_ms == 0 {
            return Err("Timeslice must be at least 1 ms".to_string());
        }
        if self.encoding.finalize_timeout_ms == 0 {
            return Err("Finalize timeout must be at least 1 ms".to_string());
        }
        if self.encoding.preferred_mime_types.iter().any(|m| m.trim().is_empty()) {
            return Err("Preferred MIME types must not be empty strings".to_string());
        }

        for gain in [self.mixing.microphone_gain, self.mixing.display_audio_gain] {
            if !(0.0..=4.0).contains(&gain) {
                return Err("Mixer gains must be between 0.0 and 4.0".to_string());
            }
        }
        if self.mixing.block_ms == 0 || self.mixing.block_ms > 1000 {
            return Err("Mixer block must be between 1 and 1000 ms".to_string());
        }
        if self.mixing.max_lag_blocks == 0 {
            return Err("Mixer lag bound must be at least one block".to_string());
        }

        if self.storage.file_prefix.is_empty()
            || self.storage.file_prefix.contains(['/', '\\'])
        {
            return Err("File prefix must be a plain, non-empty name".to_string());
        }

        Ok(())
    }
}
