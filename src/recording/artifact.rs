//! The finished recording

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::encoding::container_extension;
use crate::errors::RecorderError;
use crate::types::{TrackInfo, TrackKind};

/// One playable recording assembled from a session's chunks
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub id: Uuid,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Bytes,
    pub tracks: Vec<TrackInfo>,
    pub chunk_count: usize,
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
    pub saved_path: Option<PathBuf>,
}

impl Artifact {
    pub fn new(
        mime_type: impl Into<String>,
        data: Bytes,
        tracks: Vec<TrackInfo>,
        chunk_count: usize,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: mime_type.into(),
            data,
            tracks,
            chunk_count,
            duration,
            created_at: Utc::now(),
            saved_path: None,
        }
    }

    /// Locally resolvable reference to the artifact
    pub fn url(&self) -> String {
        format!("blob:crabrec/{}", self.id)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn extension(&self) -> &'static str {
        container_extension(&self.mime_type)
    }

    /// `<prefix>-<YYYYmmdd-HHMMSS>.<ext>`
    pub fn suggested_file_name(&self, prefix: &str) -> String {
        format!(
            "{}-{}.{}",
            prefix,
            self.created_at.format("%Y%m%d-%H%M%S"),
            self.extension()
        )
    }

    pub fn video_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video).count()
    }

    pub fn audio_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio).count()
    }

    /// Write the bytes to `dir` under the suggested file name and return the path
    pub fn save_to<P: AsRef<Path>>(&self, dir: P, prefix: &str) -> Result<PathBuf, RecorderError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(self.suggested_file_name(prefix));
        fs::write(&path, &self.data)?;
        log::info!("Saved recording to {:?} ({} bytes)", path, self.data.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    fn artifact() -> Artifact {
        Artifact::new(
            "video/webm;codecs=vp8",
            Bytes::from_static(b"data"),
            vec![
                TrackInfo::video(SourceKind::Camera, "cam", 64, 48, 30.0),
                TrackInfo::audio(Some(SourceKind::Microphone), "mic", 48000, 2),
            ],
            2,
            Duration::from_millis(1500),
        )
    }

    #[test]
    fn test_url_and_file_name() {
        let artifact = artifact();
        assert_eq!(artifact.url(), format!("blob:crabrec/{}", artifact.id));
        let name = artifact.suggested_file_name("recording");
        assert!(name.starts_with("recording-"));
        assert!(name.ends_with(".webm"));
        // recording-YYYYmmdd-HHMMSS.webm
        assert_eq!(name.len(), "recording-".len() + 15 + ".webm".len());
    }

    #[test]
    fn test_track_counts() {
        let artifact = artifact();
        assert_eq!(artifact.video_track_count(), 1);
        assert_eq!(artifact.audio_track_count(), 1);
    }

    #[test]
    fn test_save_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact();
        let path = artifact.save_to(dir.path().join("nested"), "clip").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"data");
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("clip-"));
    }
}
