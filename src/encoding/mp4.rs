//! MP4/H.264 encoder using openh264 and muxide
//!
//! Video-only: layouts with an audio track are reported unsupported so that
//! negotiation moves on to a container that can carry them. The muxer patches
//! its headers on finish, so all bytes are released by `finish`.

use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec};
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

use super::{MediaEncoder, StreamLayout};
use crate::errors::RecorderError;
use crate::types::{AudioFrame, VideoFrame};

pub const MP4_H264_MIME_TYPE: &str = "video/mp4;codecs=h264";

/// In-memory muxer sink shared with the encoder
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedBuffer {
    fn take(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(mut cursor) => {
                cursor.set_position(0);
                std::mem::take(cursor.get_mut())
            }
            Err(_) => Vec::new(),
        }
    }
}

fn poisoned() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "output buffer lock poisoned")
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().map_err(|_| poisoned())?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.0.lock().map_err(|_| poisoned())?.seek(pos)
    }
}

/// H.264 encoder wrapper
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
}

impl H264Encoder {
    pub fn new(width: u32, height: u32) -> Result<Self, RecorderError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(RecorderError::Encoding(format!(
                "H.264 needs even, non-zero dimensions, got {}x{}",
                width, height
            )));
        }
        let encoder = Encoder::new()
            .map_err(|e| RecorderError::Encoding(format!("Failed to create encoder: {}", e)))?;
        Ok(Self { encoder, width, height })
    }

    /// Encode one RGB24 frame; returns Annex B NAL units and the keyframe flag
    pub fn encode_rgb(&mut self, rgb: &[u8]) -> Result<(Vec<u8>, bool), RecorderError> {
        let expected = (self.width * self.height * 3) as usize;
        if rgb.len() != expected {
            return Err(RecorderError::Encoding(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                rgb.len()
            )));
        }

        let yuv = rgb_to_yuv420(rgb, self.width, self.height);
        let source = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);
        let bitstream = self
            .encoder
            .encode(&source)
            .map_err(|e| RecorderError::Encoding(format!("Encoding failed: {}", e)))?;

        let keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        Ok((bitstream.to_vec(), keyframe))
    }
}

pub struct Mp4Encoder {
    encoder: H264Encoder,
    muxer: Muxer<SharedBuffer>,
    output: SharedBuffer,
    frame_duration_secs: f64,
    frames_written: u64,
}

impl Mp4Encoder {
    /// Whether this encoder can record `layout`
    pub fn supports(layout: &StreamLayout) -> bool {
        match (&layout.video, &layout.audio) {
            (Some(video), None) => video
                .video_format()
                .is_some_and(|(w, h, _)| w > 0 && h > 0 && w % 2 == 0 && h % 2 == 0),
            _ => false,
        }
    }

    pub fn new(layout: &StreamLayout, _bitrate: u32) -> Result<Self, RecorderError> {
        let (width, height, fps) = layout
            .video
            .as_ref()
            .and_then(|v| v.video_format())
            .ok_or_else(|| RecorderError::UnsupportedEncoding(MP4_H264_MIME_TYPE.to_string()))?;
        if layout.audio.is_some() {
            return Err(RecorderError::UnsupportedEncoding(format!(
                "{} with an audio track",
                MP4_H264_MIME_TYPE
            )));
        }
        let fps = if fps > 0.0 { fps } else { 30.0 };

        let encoder = H264Encoder::new(width, height)?;
        let output = SharedBuffer::default();
        let muxer = MuxerBuilder::new(output.clone())
            .video(VideoCodec::H264, width, height, fps)
            .with_fast_start(true)
            .with_metadata(Metadata::new().with_current_time())
            .build()
            .map_err(|e| RecorderError::Encoding(format!("Failed to create muxer: {}", e)))?;

        Ok(Self {
            encoder,
            muxer,
            output,
            frame_duration_secs: 1.0 / fps,
            frames_written: 0,
        })
    }
}

impl MediaEncoder for Mp4Encoder {
    fn mime_type(&self) -> &str {
        MP4_H264_MIME_TYPE
    }

    fn encode_video(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        let (data, keyframe) = self.encoder.encode_rgb(&frame.data)?;
        // The encoder may hold a frame back during rate control.
        if data.is_empty() {
            return Ok(());
        }
        let pts = self.frames_written as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &data, keyframe)
            .map_err(|e| RecorderError::Encoding(format!("Failed to write frame: {}", e)))?;
        self.frames_written += 1;
        Ok(())
    }

    fn encode_audio(&mut self, _frame: &AudioFrame) -> Result<(), RecorderError> {
        Err(RecorderError::UnsupportedEncoding(format!(
            "{} does not carry audio",
            MP4_H264_MIME_TYPE
        )))
    }

    fn take_output(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RecorderError> {
        let Mp4Encoder { muxer, output, frames_written, .. } = *self;
        muxer
            .finish_with_stats()
            .map_err(|e| RecorderError::Encoding(format!("Failed to finalize recording: {}", e)))?;
        log::debug!("MP4 finalized with {} frame(s)", frames_written);
        Ok(output.take())
    }
}

/// Convert RGB24 to YUV420 planar (BT.601)
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 3;
            let (r, g, b) = (rgb[i] as i32, rgb[i + 1] as i32, rgb[i + 2] as i32);

            y_plane[y * w + x] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8;

            if y % 2 == 0 && x % 2 == 0 {
                let uv = (y / 2) * (w / 2) + (x / 2);
                u_plane[uv] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
                v_plane[uv] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
