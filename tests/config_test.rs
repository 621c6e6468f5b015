use crabrec::config::RecorderConfig;
use crabrec::RecorderError;
use tempfile::tempdir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempdir().unwrap();
    let config = RecorderConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.encoding.timeslice_ms, 1000);
    assert_eq!(config.storage.file_prefix, "recording");
}

#[test]
fn test_save_and_load_preserves_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("crabrec.toml");

    let mut config = RecorderConfig::default();
    config.encoding.preferred_mime_types = vec!["video/mp4;codecs=h264".to_string()];
    config.mixing.display_audio_gain = 0.5;
    config.storage.auto_download = true;
    config.save_to_file(&path).unwrap();

    let loaded = RecorderConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.encoding.preferred_mime_types, vec!["video/mp4;codecs=h264"]);
    assert_eq!(loaded.mixing.display_audio_gain, 0.5);
    assert!(loaded.storage.auto_download);
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");

    let mut config = RecorderConfig::default();
    config.mixing.block_ms = 0;
    config.save_to_file(&path).unwrap();

    assert!(matches!(
        RecorderConfig::load_from_file(&path),
        Err(RecorderError::Config(_))
    ));
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[capture\nvideo_width = ").unwrap();

    let err = RecorderConfig::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_constraints_follow_capture_section() {
    let mut config = RecorderConfig::default();
    config.capture.sample_rate = 44_100;
    config.capture.channels = 1;

    let constraints = config.constraints();
    assert_eq!(constraints.sample_rate, 44_100);
    assert_eq!(constraints.channels, 1);
    assert_eq!(constraints.video_fps, 30.0);
    assert_eq!(constraints.video_width, 1280);
}
