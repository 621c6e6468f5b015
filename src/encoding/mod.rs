//! Encoder seam and container negotiation
//!
//! Encoding itself is delegated to a `MediaEncoder` obtained from an
//! `EncoderFactory`. The session picks the first MIME type from the preference
//! list the factory supports for the stream's layout, falling back to the
//! factory's default container when none is.

pub mod raw;

#[cfg(feature = "recording")]
pub mod mp4;

pub use raw::{RawEncoder, RawReader, RawRecording, RAW_MIME_TYPE};

use crate::config::EncodingConfig;
use crate::errors::RecorderError;
use crate::types::{AudioFrame, TrackInfo, VideoFrame};

/// The tracks an encoder will receive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamLayout {
    pub video: Option<TrackInfo>,
    pub audio: Option<TrackInfo>,
}

impl StreamLayout {
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }

    /// Tracks in container order: video first
    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.video.iter().chain(self.audio.iter()).cloned().collect()
    }
}

/// Turns raw samples into container bytes
pub trait MediaEncoder: Send {
    fn mime_type(&self) -> &str;

    fn encode_video(&mut self, frame: &VideoFrame) -> Result<(), RecorderError>;

    fn encode_audio(&mut self, frame: &AudioFrame) -> Result<(), RecorderError>;

    /// Bytes produced since the previous call; may be empty
    fn take_output(&mut self) -> Vec<u8>;

    /// Flush everything still buffered and return the final bytes
    fn finish(self: Box<Self>) -> Result<Vec<u8>, RecorderError>;
}

/// Source of encoders, the equivalent of a platform's recorder support table
pub trait EncoderFactory: Send + Sync {
    fn is_type_supported(&self, mime_type: &str, layout: &StreamLayout) -> bool;

    /// Container used when no preferred type is supported
    fn default_mime_type(&self) -> &str {
        RAW_MIME_TYPE
    }

    fn create(
        &self,
        mime_type: &str,
        layout: &StreamLayout,
        config: &EncodingConfig,
    ) -> Result<Box<dyn MediaEncoder>, RecorderError>;
}

/// Outcome of MIME negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub mime_type: String,
    /// False when the factory default was used
    pub from_preferences: bool,
}

/// Pick the first supported type from `preferences`, or the factory default
pub fn negotiate_mime_type(
    factory: &dyn EncoderFactory,
    preferences: &[String],
    layout: &StreamLayout,
) -> Negotiated {
    for mime in preferences {
        if factory.is_type_supported(mime, layout) {
            log::info!("Using codec: {}", mime);
            return Negotiated {
                mime_type: mime.clone(),
                from_preferences: true,
            };
        }
    }

    let fallback = factory.default_mime_type().to_string();
    log::warn!(
        "{}; falling back to {}",
        RecorderError::UnsupportedEncoding(preferences.join(", ")),
        fallback
    );
    Negotiated {
        mime_type: fallback,
        from_preferences: false,
    }
}

/// Lowercased MIME type with whitespace removed, for comparisons
pub fn normalize_mime(mime: &str) -> String {
    mime.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// File extension for a container MIME type
pub fn container_extension(mime: &str) -> &'static str {
    let mime = normalize_mime(mime);
    let essence = mime.split(';').next().unwrap_or("");
    match essence {
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" | "audio/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        "audio/ogg" => "ogg",
        e if e == RAW_MIME_TYPE => "crrec",
        _ => "bin",
    }
}

/// Encoders built into this crate
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEncoderFactory;

impl EncoderFactory for DefaultEncoderFactory {
    fn is_type_supported(&self, mime_type: &str, layout: &StreamLayout) -> bool {
        let mime = normalize_mime(mime_type);
        if mime == RAW_MIME_TYPE {
            return !layout.is_empty();
        }
        #[cfg(feature = "recording")]
        if mime == mp4::MP4_H264_MIME_TYPE {
            return mp4::Mp4Encoder::supports(layout);
        }
        false
    }

    #[cfg_attr(not(feature = "recording"), allow(unused_variables))]
    fn create(
        &self,
        mime_type: &str,
        layout: &StreamLayout,
        config: &EncodingConfig,
    ) -> Result<Box<dyn MediaEncoder>, RecorderError> {
        let mime = normalize_mime(mime_type);
        if mime == RAW_MIME_TYPE {
            return Ok(Box::new(RawEncoder::new(mime_type, layout)?));
        }
        #[cfg(feature = "recording")]
        if mime == mp4::MP4_H264_MIME_TYPE && mp4::Mp4Encoder::supports(layout) {
            return Ok(Box::new(mp4::Mp4Encoder::new(layout, config.video_bitrate)?));
        }
        Err(RecorderError::UnsupportedEncoding(mime_type.to_string()))
    }
}
