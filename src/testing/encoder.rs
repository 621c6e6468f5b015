//! Encoder factory with a scripted support table

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::EncodingConfig;
use crate::encoding::{normalize_mime, EncoderFactory, MediaEncoder, RawEncoder, StreamLayout};
use crate::errors::RecorderError;
use crate::types::{AudioFrame, VideoFrame};

/// A scripted encoder malfunction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderFault {
    /// Reject every sample after the first `n`
    FailAfterSamples(usize),
    /// Block in `finish` for the given time before completing
    StallOnFinish(Duration),
}

/// Claims support for a fixed set of MIME types and produces raw-container
/// encoders tagged with whichever type was negotiated
#[derive(Debug, Default)]
pub struct SyntheticEncoderFactory {
    supported: Vec<String>,
    created: AtomicUsize,
    fault: Mutex<Option<EncoderFault>>,
}

impl SyntheticEncoderFactory {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            supported: supported.into_iter().map(|s| normalize_mime(s.as_ref())).collect(),
            created: AtomicUsize::new(0),
            fault: Mutex::new(None),
        }
    }

    /// Make every created encoder misbehave as scripted
    pub fn with_fault(self, fault: EncoderFault) -> Self {
        self.set_fault(Some(fault));
        self
    }

    /// Change the fault applied to encoders created from now on
    pub fn set_fault(&self, fault: Option<EncoderFault>) {
        if let Ok(mut current) = self.fault.lock() {
            *current = fault;
        }
    }

    /// A factory that supports nothing but the default container
    pub fn none() -> Self {
        Self::default()
    }

    /// Encoders created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EncoderFactory for SyntheticEncoderFactory {
    fn is_type_supported(&self, mime_type: &str, layout: &StreamLayout) -> bool {
        !layout.is_empty() && self.supported.contains(&normalize_mime(mime_type))
    }

    fn create(
        &self,
        mime_type: &str,
        layout: &StreamLayout,
        _config: &EncodingConfig,
    ) -> Result<Box<dyn MediaEncoder>, RecorderError> {
        let is_default = normalize_mime(mime_type) == normalize_mime(self.default_mime_type());
        if !is_default && !self.is_type_supported(mime_type, layout) {
            return Err(RecorderError::UnsupportedEncoding(mime_type.to_string()));
        }
        let encoder: Box<dyn MediaEncoder> = Box::new(RawEncoder::new(mime_type, layout)?);
        self.created.fetch_add(1, Ordering::SeqCst);
        let fault = self.fault.lock().ok().and_then(|f| *f);
        Ok(match fault {
            Some(fault) => Box::new(FaultyEncoder {
                inner: encoder,
                fault,
                samples: 0,
            }),
            None => encoder,
        })
    }
}

struct FaultyEncoder {
    inner: Box<dyn MediaEncoder>,
    fault: EncoderFault,
    samples: usize,
}

impl FaultyEncoder {
    fn admit(&mut self) -> Result<(), RecorderError> {
        self.samples += 1;
        match self.fault {
            EncoderFault::FailAfterSamples(n) if self.samples > n => Err(RecorderError::Encoding(
                format!("synthetic encoder failed at sample {}", self.samples),
            )),
            _ => Ok(()),
        }
    }
}

impl MediaEncoder for FaultyEncoder {
    fn mime_type(&self) -> &str {
        self.inner.mime_type()
    }

    fn encode_video(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        self.admit()?;
        self.inner.encode_video(frame)
    }

    fn encode_audio(&mut self, frame: &AudioFrame) -> Result<(), RecorderError> {
        self.admit()?;
        self.inner.encode_audio(frame)
    }

    fn take_output(&mut self) -> Vec<u8> {
        self.inner.take_output()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RecorderError> {
        if let EncoderFault::StallOnFinish(delay) = self.fault {
            std::thread::sleep(delay);
        }
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecorderConfig;
    use crate::encoding::RAW_MIME_TYPE;
    use crate::types::{SourceKind, TrackInfo};

    fn layout() -> StreamLayout {
        StreamLayout {
            video: Some(TrackInfo::video(SourceKind::Camera, "cam", 64, 48, 30.0)),
            audio: None,
        }
    }

    #[test]
    fn test_support_table_is_normalized() {
        let factory = SyntheticEncoderFactory::new(["video/webm; codecs=VP8"]);
        assert!(factory.is_type_supported("video/webm;codecs=vp8", &layout()));
        assert!(!factory.is_type_supported("video/webm;codecs=vp9", &layout()));
    }

    #[test]
    fn test_creates_tagged_encoders_and_counts_them() {
        let factory = SyntheticEncoderFactory::new(["video/webm;codecs=vp8"]);
        let config = RecorderConfig::default().encoding;
        let encoder = factory.create("video/webm;codecs=vp8", &layout(), &config).unwrap();
        assert_eq!(encoder.mime_type(), "video/webm;codecs=vp8");
        assert!(factory.create(RAW_MIME_TYPE, &layout(), &config).is_ok());
        assert!(factory.create("video/mp4;codecs=h264", &layout(), &config).is_err());
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_fail_after_samples() {
        let factory = SyntheticEncoderFactory::none().with_fault(EncoderFault::FailAfterSamples(1));
        let config = RecorderConfig::default().encoding;
        let mut encoder = factory.create(RAW_MIME_TYPE, &layout(), &config).unwrap();
        let frame = crate::testing::synthetic_video_frame(0, 64, 48, 0.0);

        assert!(encoder.encode_video(&frame).is_ok());
        assert!(matches!(encoder.encode_video(&frame), Err(RecorderError::Encoding(_))));
    }
}
