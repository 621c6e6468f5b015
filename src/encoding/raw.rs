//! Built-in framed container
//!
//! Stores samples uncompressed so a recording can always be produced, even
//! when no compressing encoder is available.
//!
//! Layout (little endian):
//!
//! ```text
//! header:  "CRREC" 0x01 | track_count u8 | track*
//! track:   kind u8 (0 video, 1 audio) | params | label_len u16 | label
//!          video params: width u32 | height u32 | fps f64
//!          audio params: sample_rate u32 | channels u16
//! record:  track_index u8 | pts f64 | len u32 | payload
//!          video payload: RGB24 bytes; audio payload: f32 samples
//! ```

use bytes::{Buf, BufMut};

use super::{MediaEncoder, StreamLayout};
use crate::errors::RecorderError;
use crate::types::{AudioFrame, TrackKind, TrackParams, VideoFrame};

pub const RAW_MIME_TYPE: &str = "application/x-crabrec";

const MAGIC: &[u8; 6] = b"CRREC\x01";
const KIND_VIDEO: u8 = 0;
const KIND_AUDIO: u8 = 1;

/// Writes samples into the framed container
pub struct RawEncoder {
    mime_type: String,
    video_index: Option<u8>,
    audio_index: Option<u8>,
    buffer: Vec<u8>,
}

impl RawEncoder {
    /// Create an encoder tagged with `mime_type`; the header is written immediately
    pub fn new(mime_type: &str, layout: &StreamLayout) -> Result<Self, RecorderError> {
        let tracks = layout.tracks();
        if tracks.is_empty() {
            return Err(RecorderError::Encoding("stream has no tracks".to_string()));
        }

        let mut buffer = Vec::with_capacity(64);
        buffer.put_slice(MAGIC);
        buffer.put_u8(tracks.len() as u8);
        for track in &tracks {
            match track.params {
                TrackParams::Video { width, height, fps } => {
                    buffer.put_u8(KIND_VIDEO);
                    buffer.put_u32_le(width);
                    buffer.put_u32_le(height);
                    buffer.put_f64_le(fps);
                }
                TrackParams::Audio { sample_rate, channels } => {
                    buffer.put_u8(KIND_AUDIO);
                    buffer.put_u32_le(sample_rate);
                    buffer.put_u16_le(channels);
                }
            }
            let label = track.label.as_bytes();
            let len = label.len().min(u16::MAX as usize);
            buffer.put_u16_le(len as u16);
            buffer.put_slice(&label[..len]);
        }

        let video_index = layout.video.as_ref().map(|_| 0u8);
        let audio_index = layout.audio.as_ref().map(|_| if layout.video.is_some() { 1u8 } else { 0u8 });

        Ok(Self {
            mime_type: mime_type.to_string(),
            video_index,
            audio_index,
            buffer,
        })
    }

    fn put_record_header(&mut self, track: u8, pts: f64, len: usize) -> Result<(), RecorderError> {
        let len = u32::try_from(len)
            .map_err(|_| RecorderError::Encoding(format!("sample of {} bytes is too large", len)))?;
        self.buffer.put_u8(track);
        self.buffer.put_f64_le(pts);
        self.buffer.put_u32_le(len);
        Ok(())
    }
}

impl MediaEncoder for RawEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn encode_video(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        let track = self
            .video_index
            .ok_or_else(|| RecorderError::Encoding("stream has no video track".to_string()))?;
        self.put_record_header(track, frame.timestamp, frame.data.len())?;
        self.buffer.put_slice(&frame.data);
        Ok(())
    }

    fn encode_audio(&mut self, frame: &AudioFrame) -> Result<(), RecorderError> {
        let track = self
            .audio_index
            .ok_or_else(|| RecorderError::Encoding("stream has no audio track".to_string()))?;
        self.put_record_header(track, frame.timestamp, frame.samples.len() * 4)?;
        for sample in &frame.samples {
            self.buffer.put_f32_le(*sample);
        }
        Ok(())
    }

    fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RecorderError> {
        Ok(self.buffer)
    }
}

/// A track entry parsed from the container header
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrack {
    pub kind: TrackKind,
    pub params: TrackParams,
    pub label: String,
}

/// A sample record parsed from the container body
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub track: u8,
    pub pts: f64,
    pub len: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecording {
    pub tracks: Vec<RawTrack>,
    pub records: Vec<RawRecord>,
}

impl RawRecording {
    pub fn track_count(&self, kind: TrackKind) -> usize {
        self.tracks.iter().filter(|t| t.kind == kind).count()
    }

    /// Number of records belonging to the first track of `kind`
    pub fn sample_count(&self, kind: TrackKind) -> usize {
        match self.tracks.iter().position(|t| t.kind == kind) {
            Some(index) => self.records.iter().filter(|r| r.track as usize == index).count(),
            None => 0,
        }
    }

    /// Total payload bytes of all records
    pub fn payload_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.len as u64).sum()
    }
}

/// Parses the framed container
pub struct RawReader;

impl RawReader {
    pub fn parse(data: &[u8]) -> Result<RawRecording, RecorderError> {
        let mut buf = data;

        need(buf, MAGIC.len() + 1)?;
        if &buf[..MAGIC.len()] != MAGIC {
            return Err(RecorderError::Encoding("not a crabrec container".to_string()));
        }
        buf.advance(MAGIC.len());

        let track_count = buf.get_u8() as usize;
        let mut tracks = Vec::with_capacity(track_count);
        for _ in 0..track_count {
            need(buf, 1)?;
            let (kind, params) = match buf.get_u8() {
                KIND_VIDEO => {
                    need(buf, 16)?;
                    let width = buf.get_u32_le();
                    let height = buf.get_u32_le();
                    let fps = buf.get_f64_le();
                    (TrackKind::Video, TrackParams::Video { width, height, fps })
                }
                KIND_AUDIO => {
                    need(buf, 6)?;
                    let sample_rate = buf.get_u32_le();
                    let channels = buf.get_u16_le();
                    (TrackKind::Audio, TrackParams::Audio { sample_rate, channels })
                }
                other => {
                    return Err(RecorderError::Encoding(format!("unknown track kind {}", other)));
                }
            };
            need(buf, 2)?;
            let label_len = buf.get_u16_le() as usize;
            need(buf, label_len)?;
            let label = String::from_utf8_lossy(&buf[..label_len]).into_owned();
            buf.advance(label_len);
            tracks.push(RawTrack { kind, params, label });
        }

        let mut records = Vec::new();
        while buf.has_remaining() {
            need(buf, 13)?;
            let track = buf.get_u8();
            let pts = buf.get_f64_le();
            let len = buf.get_u32_le();
            if track as usize >= tracks.len() {
                return Err(RecorderError::Encoding(format!("record for unknown track {}", track)));
            }
            need(buf, len as usize)?;
            buf.advance(len as usize);
            records.push(RawRecord { track, pts, len });
        }

        Ok(RawRecording { tracks, records })
    }
}

fn need(buf: &[u8], n: usize) -> Result<(), RecorderError> {
    if buf.len() < n {
        return Err(RecorderError::Encoding("truncated crabrec container".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceKind, TrackInfo};

    fn layout(video: bool, audio: bool) -> StreamLayout {
        StreamLayout {
            video: video.then(|| TrackInfo::video(SourceKind::Camera, "cam", 4, 2, 30.0)),
            audio: audio.then(|| TrackInfo::audio(None, "mixed audio", 48000, 2)),
        }
    }

    #[test]
    fn test_header_and_records_parse_back() {
        let mut encoder = RawEncoder::new("video/webm;codecs=vp8", &layout(true, true)).unwrap();
        encoder
            .encode_video(&VideoFrame {
                data: vec![1; 4 * 2 * 3],
                width: 4,
                height: 2,
                timestamp: 0.0,
            })
            .unwrap();
        let first = encoder.take_output();
        encoder
            .encode_audio(&AudioFrame {
                samples: vec![0.5; 8],
                sample_rate: 48000,
                channels: 2,
                timestamp: 0.01,
            })
            .unwrap();
        let rest = Box::new(encoder).finish().unwrap();

        let mut all = first;
        all.extend(rest);
        let parsed = RawReader::parse(&all).unwrap();
        assert_eq!(parsed.track_count(TrackKind::Video), 1);
        assert_eq!(parsed.track_count(TrackKind::Audio), 1);
        assert_eq!(parsed.tracks[1].label, "mixed audio");
        assert_eq!(parsed.sample_count(TrackKind::Video), 1);
        assert_eq!(parsed.sample_count(TrackKind::Audio), 1);
        assert_eq!(parsed.payload_bytes(), 24 + 32);
    }

    #[test]
    fn test_audio_only_stream_rejects_video() {
        let mut encoder = RawEncoder::new(RAW_MIME_TYPE, &layout(false, true)).unwrap();
        let result = encoder.encode_video(&VideoFrame {
            data: vec![],
            width: 0,
            height: 0,
            timestamp: 0.0,
        });
        assert!(matches!(result, Err(RecorderError::Encoding(_))));
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert!(RawEncoder::new(RAW_MIME_TYPE, &layout(false, false)).is_err());
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut encoder = RawEncoder::new(RAW_MIME_TYPE, &layout(false, true)).unwrap();
        encoder
            .encode_audio(&AudioFrame {
                samples: vec![0.0; 4],
                sample_rate: 48000,
                channels: 2,
                timestamp: 0.0,
            })
            .unwrap();
        let bytes = encoder.take_output();
        assert!(RawReader::parse(&bytes[..bytes.len() - 1]).is_err());
        assert!(RawReader::parse(b"nope").is_err());
    }
}
