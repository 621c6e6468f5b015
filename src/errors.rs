use std::time::Duration;

use crate::types::SourceKind;

/// Errors produced while acquiring, mixing, encoding or finalizing a recording
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Permission denied for {0}: {1}")]
    PermissionDenied(SourceKind, String),
    #[error("Device unavailable for {0}: {1}")]
    DeviceUnavailable(SourceKind, String),
    #[error("User cancelled the {0} picker")]
    UserCancelledPicker(SourceKind),
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("No active recording session")]
    NoActiveSession,
    #[error("A recording session is already active")]
    AlreadyRecording,
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    #[error("Incompatible audio sources: {0}")]
    IncompatibleAudio(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Timed out after {0:?} waiting for the encoder to finalize")]
    FinalizeTimeout(Duration),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// True for failures raised while acquiring a capture source
    pub fn is_acquisition_error(&self) -> bool {
        matches!(
            self,
            RecorderError::PermissionDenied(..)
                | RecorderError::DeviceUnavailable(..)
                | RecorderError::UserCancelledPicker(..)
        )
    }

    /// The source a failure is attributed to, if any
    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            RecorderError::PermissionDenied(kind, _)
            | RecorderError::DeviceUnavailable(kind, _)
            | RecorderError::UserCancelledPicker(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Single-line notification suitable for showing to the user
    pub fn user_message(&self) -> String {
        if self.is_acquisition_error() {
            format!("Error accessing media devices: {}", self)
        } else {
            format!("Recording error: {}", self)
        }
    }
}
