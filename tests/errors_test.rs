use std::time::Duration;

use crabrec::{RecorderError, SourceKind};

#[test]
fn test_acquisition_errors_carry_their_source() {
    let errors = [
        RecorderError::PermissionDenied(SourceKind::Camera, "blocked".into()),
        RecorderError::DeviceUnavailable(SourceKind::Microphone, "missing".into()),
        RecorderError::UserCancelledPicker(SourceKind::DisplayVideo),
    ];
    let kinds: Vec<_> = errors.iter().map(|e| e.source_kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Some(SourceKind::Camera),
            Some(SourceKind::Microphone),
            Some(SourceKind::DisplayVideo)
        ]
    );
    assert!(errors.iter().all(|e| e.is_acquisition_error()));
}

#[test]
fn test_display_messages() {
    assert_eq!(
        RecorderError::UserCancelledPicker(SourceKind::DisplayAudio).to_string(),
        "User cancelled the display-audio picker"
    );
    assert_eq!(
        RecorderError::FinalizeTimeout(Duration::from_secs(2)).to_string(),
        "Timed out after 2s waiting for the encoder to finalize"
    );
    assert_eq!(
        RecorderError::NoActiveSession.user_message(),
        "Recording error: No active recording session"
    );
}

#[test]
fn test_errors_convert_into_anyhow() {
    fn fails() -> anyhow::Result<()> {
        Err(RecorderError::AlreadyRecording)?
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<RecorderError>().is_some());
}
