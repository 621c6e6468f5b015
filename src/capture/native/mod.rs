//! Native capture backend
//!
//! Camera capture goes through nokhwa (feature `camera`), microphone capture
//! through cpal (feature `audio`). Display capture needs a per-platform screen
//! capture API and is reported as unavailable.

#[cfg(feature = "camera")]
mod camera;
#[cfg(feature = "audio")]
mod microphone;

use std::time::Duration;

use super::{CaptureBackend, CaptureSource};
use crate::errors::RecorderError;
use crate::timing::PTSClock;
use crate::types::{MediaConstraints, SourceKind};

/// Capture backend driving real devices
#[derive(Debug, Clone)]
pub struct NativeBackend {
    /// How long to wait for a device to open
    pub open_timeout: Duration,
    /// Camera index passed to nokhwa
    pub camera_index: u32,
    /// Input device name for cpal; `None` selects the system default
    pub microphone_device: Option<String>,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(10),
            camera_index: 0,
            microphone_device: None,
        }
    }
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source kinds this build can actually acquire
    pub fn supported_kinds() -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if cfg!(feature = "camera") {
            kinds.push(SourceKind::Camera);
        }
        if cfg!(feature = "audio") {
            kinds.push(SourceKind::Microphone);
        }
        kinds
    }
}

impl CaptureBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn acquire(
        &self,
        kind: SourceKind,
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError> {
        match kind {
            SourceKind::Camera => self.acquire_camera(constraints, clock),
            SourceKind::Microphone => self.acquire_microphone(constraints, clock),
            SourceKind::DisplayVideo | SourceKind::DisplayAudio => {
                Err(RecorderError::DeviceUnavailable(
                    kind,
                    "display capture is not available on this backend".to_string(),
                ))
            }
        }
    }
}

impl NativeBackend {
    #[cfg(feature = "camera")]
    fn acquire_camera(
        &self,
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError> {
        camera::open(self.camera_index, constraints, clock.clone(), self.open_timeout)
            .map(|source| Box::new(source) as Box<dyn CaptureSource>)
    }

    #[cfg(not(feature = "camera"))]
    fn acquire_camera(
        &self,
        _constraints: &MediaConstraints,
        _clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError> {
        Err(RecorderError::DeviceUnavailable(
            SourceKind::Camera,
            "camera support not compiled in (enable the `camera` feature)".to_string(),
        ))
    }

    #[cfg(feature = "audio")]
    fn acquire_microphone(
        &self,
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError> {
        microphone::open(
            self.microphone_device.clone(),
            constraints,
            clock.clone(),
            self.open_timeout,
        )
        .map(|source| Box::new(source) as Box<dyn CaptureSource>)
    }

    #[cfg(not(feature = "audio"))]
    fn acquire_microphone(
        &self,
        _constraints: &MediaConstraints,
        _clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError> {
        Err(RecorderError::DeviceUnavailable(
            SourceKind::Microphone,
            "microphone support not compiled in (enable the `audio` feature)".to_string(),
        ))
    }
}

/// Map a backend error message to the acquisition taxonomy
#[cfg(any(feature = "camera", feature = "audio"))]
fn classify_open_error(kind: SourceKind, message: String) -> RecorderError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        RecorderError::PermissionDenied(kind, message)
    } else {
        RecorderError::DeviceUnavailable(kind, message)
    }
}
