//! End-to-end sequencer scenarios on the synthetic backend

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crabrec::encoding::{RawReader, RAW_MIME_TYPE};
use crabrec::testing::{EncoderFault, SyntheticBackend, SyntheticEncoderFactory, SyntheticFailure};
use crabrec::{
    AudioPriority, RecorderConfig, RecorderError, Selection, Sequencer, SequencerState, SourceKind,
    TrackKind, VideoPriority,
};

const VP8: &str = "video/webm;codecs=vp8";

fn config() -> RecorderConfig {
    let mut config = RecorderConfig::default();
    config.encoding.timeslice_ms = 20;
    config.encoding.finalize_timeout_ms = 5_000;
    config
}

fn setup(
    backend: SyntheticBackend,
    supported: &[&str],
    config: RecorderConfig,
) -> (Sequencer, Arc<SyntheticBackend>, Arc<SyntheticEncoderFactory>) {
    let backend = Arc::new(backend);
    let factory = Arc::new(SyntheticEncoderFactory::new(supported.iter().copied()));
    let sequencer = Sequencer::new(backend.clone(), factory.clone(), config);
    (sequencer, backend, factory)
}

fn record_for(sequencer: &mut Sequencer, selection: &Selection, duration: Duration) -> Arc<crabrec::Artifact> {
    sequencer.start(selection).unwrap();
    std::thread::sleep(duration);
    sequencer.stop().unwrap().expect("active session yields an artifact")
}

#[test]
fn test_camera_and_microphone_yield_one_artifact_with_both_tracks() {
    let (mut sequencer, backend, factory) =
        setup(SyntheticBackend::new(), &[VP8, "video/mp4;codecs=h264"], config());

    let artifact = record_for(&mut sequencer, &Selection::camera_and_microphone(), Duration::from_millis(200));

    assert_eq!(artifact.mime_type, VP8);
    assert_eq!(artifact.video_track_count(), 1);
    assert_eq!(artifact.audio_track_count(), 1);
    assert!(artifact.chunk_count >= 1);
    assert_eq!(factory.created(), 1);

    let parsed = RawReader::parse(&artifact.data).unwrap();
    assert_eq!(parsed.track_count(TrackKind::Video), 1);
    assert_eq!(parsed.track_count(TrackKind::Audio), 1);
    assert!(parsed.sample_count(TrackKind::Video) > 0);
    assert!(parsed.sample_count(TrackKind::Audio) > 0);

    assert_eq!(backend.active_devices(), 0);
    assert_eq!(sequencer.state(), SequencerState::Idle);
    assert!(Arc::ptr_eq(&sequencer.last_artifact().unwrap(), &artifact));
}

#[test]
fn test_unsupported_preferences_fall_back_to_default_container() {
    let (mut sequencer, _backend, _factory) = setup(SyntheticBackend::new(), &[], config());

    let artifact = record_for(&mut sequencer, &Selection::camera_only(), Duration::from_millis(100));

    assert_eq!(artifact.mime_type, RAW_MIME_TYPE);
    assert!(artifact.suggested_file_name("recording").ends_with(".crrec"));
}

#[test]
fn test_chunks_concatenate_into_a_parseable_stream() {
    let (mut sequencer, _backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());
    sequencer.start(&Selection::camera_and_microphone()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while sequencer.session_stats().unwrap().chunks_emitted < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    let stats = sequencer.session_stats().unwrap();
    assert!(stats.chunks_emitted >= 3);
    assert_eq!(stats.mime_type, VP8);

    let artifact = sequencer.stop().unwrap().unwrap();
    assert!(artifact.chunk_count >= 3);
    let parsed = RawReader::parse(&artifact.data).unwrap();
    assert_eq!(parsed.tracks.len(), 2);
    assert!(parsed.payload_bytes() > 0);
}

#[test]
fn test_failed_acquisition_creates_no_encoder_and_releases_devices() {
    let backend = SyntheticBackend::new().fail(SourceKind::Microphone, SyntheticFailure::PermissionDenied);
    let (mut sequencer, backend, factory) = setup(backend, &[VP8], config());

    let err = sequencer.start(&Selection::camera_and_microphone()).unwrap_err();

    assert!(matches!(err, RecorderError::PermissionDenied(SourceKind::Microphone, _)));
    assert!(err.user_message().starts_with("Error accessing media devices"));
    assert_eq!(backend.acquisitions(), 1, "camera was acquired before the microphone failed");
    assert_eq!(backend.active_devices(), 0);
    assert_eq!(factory.created(), 0);
    assert!(!sequencer.is_recording());
    assert_eq!(sequencer.state(), SequencerState::Idle);
    assert!(sequencer.last_artifact().is_none());
}

#[test]
fn test_double_start_is_rejected_and_keeps_the_session() {
    let (mut sequencer, backend, factory) = setup(SyntheticBackend::new(), &[VP8], config());

    let first = sequencer.start(&Selection::camera_only()).unwrap();
    let err = sequencer.start(&Selection::camera_and_microphone()).unwrap_err();

    assert!(matches!(err, RecorderError::AlreadyRecording));
    assert_eq!(sequencer.session_stats().unwrap().session_id, first);
    assert_eq!(backend.acquisitions(), 1);
    assert_eq!(factory.created(), 1);
    assert_eq!(sequencer.state(), SequencerState::Recording);

    let artifact = sequencer.stop().unwrap().unwrap();
    assert_eq!(artifact.video_track_count(), 1);
    assert_eq!(artifact.audio_track_count(), 0);
    assert!(sequencer.stop().unwrap().is_none());
}

#[test]
fn test_encoder_failure_fails_stop_and_keeps_last_artifact() {
    let (mut sequencer, backend, factory) = setup(SyntheticBackend::new(), &[VP8], config());
    let previous = record_for(&mut sequencer, &Selection::camera_only(), Duration::from_millis(50));

    factory.set_fault(Some(EncoderFault::FailAfterSamples(2)));
    sequencer.start(&Selection::camera_and_microphone()).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let err = sequencer.stop().unwrap_err();

    assert!(matches!(err, RecorderError::Encoding(_)));
    assert_eq!(sequencer.state(), SequencerState::Idle);
    assert!(!sequencer.is_recording());
    assert_eq!(backend.active_devices(), 0);
    assert!(Arc::ptr_eq(&sequencer.last_artifact().unwrap(), &previous));
}

#[test]
fn test_finalize_timeout_releases_devices_and_returns_to_idle() {
    let mut config = config();
    config.encoding.finalize_timeout_ms = 100;
    let (mut sequencer, backend, factory) = setup(SyntheticBackend::new(), &[VP8], config);
    factory.set_fault(Some(EncoderFault::StallOnFinish(Duration::from_secs(2))));

    sequencer.start(&Selection::camera_and_microphone()).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    let err = sequencer.stop().unwrap_err();

    assert!(matches!(err, RecorderError::FinalizeTimeout(_)));
    assert!(started.elapsed() < Duration::from_secs(1), "stop must not wait for the stalled encoder");
    assert_eq!(sequencer.state(), SequencerState::Idle);
    assert_eq!(backend.active_devices(), 0);
    assert!(sequencer.last_artifact().is_none());
    assert!(sequencer.stop().unwrap().is_none());
}

#[test]
fn test_stop_without_session_keeps_last_artifact() {
    let (mut sequencer, _backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());
    assert!(sequencer.stop().unwrap().is_none());
    assert!(matches!(sequencer.session_stats(), Err(RecorderError::NoActiveSession)));

    let artifact = record_for(&mut sequencer, &Selection::camera_only(), Duration::from_millis(50));
    assert!(sequencer.stop().unwrap().is_none());
    assert!(Arc::ptr_eq(&sequencer.last_artifact().unwrap(), &artifact));
}

#[test]
fn test_mixing_two_audio_sources_yields_one_audio_track() {
    let (mut sequencer, backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());

    sequencer.start(&Selection::screen_with_mixed_audio()).unwrap();
    assert_eq!(backend.active_devices(), 3);
    let stats = sequencer.session_stats().unwrap();
    let audio: Vec<_> = stats.tracks.iter().filter(|t| t.kind == TrackKind::Audio).collect();
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].source, None);
    assert_eq!(audio[0].label, "mixed audio");

    std::thread::sleep(Duration::from_millis(200));
    let artifact = sequencer.stop().unwrap().unwrap();

    assert_eq!(artifact.audio_track_count(), 1);
    assert_eq!(artifact.video_track_count(), 1);
    let parsed = RawReader::parse(&artifact.data).unwrap();
    assert_eq!(parsed.track_count(TrackKind::Audio), 1);
    assert!(parsed.sample_count(TrackKind::Audio) > 0);
    assert_eq!(backend.active_devices(), 0);
}

#[test]
fn test_mixing_sources_with_different_rates_fails_cleanly() {
    let backend = SyntheticBackend::new().with_display_audio_rate(44_100);
    let (mut sequencer, backend, factory) = setup(backend, &[VP8], config());

    let err = sequencer.start(&Selection::screen_with_mixed_audio()).unwrap_err();

    assert!(matches!(err, RecorderError::IncompatibleAudio(_)));
    assert_eq!(backend.active_devices(), 0);
    assert_eq!(factory.created(), 0);
    assert_eq!(sequencer.state(), SequencerState::Idle);
}

#[test]
fn test_cancelled_display_picker_leaves_nothing_acquired() {
    let backend = SyntheticBackend::new().fail(SourceKind::DisplayVideo, SyntheticFailure::PickerCancelled);
    let (mut sequencer, backend, factory) = setup(backend, &[VP8], config());
    let selection = Selection {
        display_video: true,
        microphone: true,
        ..Selection::default()
    };

    let err = sequencer.start(&selection).unwrap_err();

    assert!(matches!(err, RecorderError::UserCancelledPicker(SourceKind::DisplayVideo)));
    assert!(!sequencer.is_recording());
    assert_eq!(backend.acquisitions(), 0);
    assert_eq!(backend.active_devices(), 0);
    assert_eq!(factory.created(), 0);
}

#[test]
fn test_empty_selection_is_invalid() {
    let (mut sequencer, backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());
    let err = sequencer.start(&Selection::default()).unwrap_err();
    assert!(matches!(err, RecorderError::InvalidSelection(_)));
    assert_eq!(backend.acquisitions(), 0);
}

#[test]
fn test_video_priority_picks_camera_and_keeps_display_acquired() {
    let (mut sequencer, backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());
    let selection = Selection {
        camera: true,
        display_video: true,
        video_priority: VideoPriority::CameraFirst,
        ..Selection::default()
    };

    sequencer.start(&selection).unwrap();
    assert_eq!(backend.active_devices(), 2);
    let stats = sequencer.session_stats().unwrap();
    assert_eq!(stats.tracks.len(), 1);
    assert_eq!(stats.tracks[0].source, Some(SourceKind::Camera));

    sequencer.stop().unwrap();
    assert_eq!(backend.active_devices(), 0);
}

#[test]
fn test_unmixed_audio_follows_priority() {
    let (mut sequencer, _backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());
    let selection = Selection {
        microphone: true,
        display_audio: true,
        audio_priority: AudioPriority::DisplayFirst,
        ..Selection::default()
    };

    sequencer.start(&selection).unwrap();
    let stats = sequencer.session_stats().unwrap();
    assert_eq!(stats.tracks.len(), 1);
    assert_eq!(stats.tracks[0].source, Some(SourceKind::DisplayAudio));
    sequencer.stop().unwrap();
}

#[test]
fn test_state_observer_sees_every_transition() {
    let (mut sequencer, _backend, _factory) = setup(
        SyntheticBackend::new().fail(SourceKind::Camera, SyntheticFailure::Unavailable),
        &[VP8],
        config(),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    sequencer.on_state_change(move |state| sink.lock().unwrap().push(state));

    sequencer.start(&Selection::camera_only()).unwrap_err();
    sequencer.start(&Selection {
        microphone: true,
        ..Selection::default()
    })
    .unwrap();
    sequencer.stop().unwrap();

    use SequencerState::*;
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Acquiring, Idle, Acquiring, Recording, Finalizing, Idle]
    );
}

#[test]
fn test_auto_download_saves_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.storage.auto_download = true;
    config.storage.output_directory = dir.path().to_string_lossy().into_owned();
    config.storage.file_prefix = "take".to_string();
    let (mut sequencer, _backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config);

    let artifact = record_for(&mut sequencer, &Selection::camera_only(), Duration::from_millis(60));

    let path = artifact.saved_path.clone().expect("artifact was saved");
    assert!(path.starts_with(dir.path()));
    assert_eq!(path.extension().unwrap(), "webm");
    assert_eq!(std::fs::read(&path).unwrap(), artifact.data.to_vec());
}

#[test]
fn test_dropping_an_active_sequencer_releases_devices() {
    let (mut sequencer, backend, _factory) = setup(SyntheticBackend::new(), &[VP8], config());
    sequencer.start(&Selection::camera_and_microphone()).unwrap();
    assert_eq!(backend.active_devices(), 2);
    drop(sequencer);
    assert_eq!(backend.active_devices(), 0);
}

#[test]
fn test_supported_mime_types_filters_preferences() {
    let (sequencer, _backend, _factory) = setup(
        SyntheticBackend::new(),
        &["video/webm;codecs=h264", VP8],
        config(),
    );
    assert_eq!(
        sequencer.supported_mime_types(),
        vec![VP8.to_string(), "video/webm;codecs=h264".to_string()]
    );
}

#[cfg(feature = "recording")]
#[test]
fn test_default_factory_records_camera_to_mp4() {
    let backend = SyntheticBackend::new().with_frame_interval(Duration::from_millis(40));
    let backend = Arc::new(backend);
    let mut sequencer = Sequencer::new(
        backend.clone(),
        Arc::new(crabrec::DefaultEncoderFactory),
        config(),
    );

    let artifact = record_for(&mut sequencer, &Selection::camera_only(), Duration::from_millis(300));

    assert_eq!(artifact.mime_type, "video/mp4;codecs=h264");
    assert_eq!(&artifact.data[4..8], b"ftyp");
    assert_eq!(backend.active_devices(), 0);
}
