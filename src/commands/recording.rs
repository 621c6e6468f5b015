//! Tauri commands for recording
//!
//! One sequencer serves the whole app. It is created on first use from the
//! configuration file and kept in a global slot; sequencer calls block, so
//! they run on the blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tauri::command;

use crate::config::RecorderConfig;
use crate::recording::{Artifact, SequencerState, SessionStats, Sequencer};
use crate::selection::Selection;

lazy_static::lazy_static! {
    static ref SEQUENCER: Arc<Mutex<Option<Sequencer>>> = Arc::new(Mutex::new(None));
}

/// Summary of a finished recording returned to the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResult {
    pub id: String,
    pub url: String,
    pub mime_type: String,
    pub size: usize,
    pub duration_ms: u128,
    pub video_tracks: usize,
    pub audio_tracks: usize,
    pub file_name: String,
    pub saved_path: Option<PathBuf>,
}

impl RecordingResult {
    fn new(artifact: &Artifact, prefix: &str) -> Self {
        Self {
            id: artifact.id.to_string(),
            url: artifact.url(),
            mime_type: artifact.mime_type.clone(),
            size: artifact.size(),
            duration_ms: artifact.duration.as_millis(),
            video_tracks: artifact.video_track_count(),
            audio_tracks: artifact.audio_track_count(),
            file_name: artifact.suggested_file_name(prefix),
            saved_path: artifact.saved_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub state: SequencerState,
    pub session: Option<SessionStats>,
    pub last_recording: Option<RecordingResult>,
}

/// Run `f` against the global sequencer on the blocking pool
async fn with_sequencer<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&mut Sequencer) -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut slot = SEQUENCER
            .lock()
            .map_err(|_| "Recorder state is poisoned".to_string())?;
        let sequencer = slot.get_or_insert_with(|| Sequencer::native(RecorderConfig::load_or_default()));
        f(sequencer)
    })
    .await
    .map_err(|e| format!("Recorder task failed: {}", e))?
}

/// Acquire the selected sources and start recording; returns the session id
#[command]
pub async fn start_recording(selection: Selection) -> Result<String, String> {
    log::info!("Starting recording: {:?}", selection.requested_sources());
    with_sequencer(move |sequencer| {
        sequencer
            .start(&selection)
            .map(|id| id.to_string())
            .map_err(|e| e.user_message())
    })
    .await
}

/// Stop the active recording; `None` when nothing was recording
#[command]
pub async fn stop_recording() -> Result<Option<RecordingResult>, String> {
    with_sequencer(|sequencer| {
        let prefix = sequencer.config().storage.file_prefix.clone();
        let artifact = sequencer.stop().map_err(|e| e.user_message())?;
        Ok(artifact.map(|a| RecordingResult::new(&a, &prefix)))
    })
    .await
}

#[command]
pub async fn get_recording_status() -> Result<RecordingStatus, String> {
    with_sequencer(|sequencer| {
        let prefix = &sequencer.config().storage.file_prefix;
        Ok(RecordingStatus {
            state: sequencer.state(),
            session: sequencer.session_stats().ok(),
            last_recording: sequencer
                .last_artifact()
                .map(|a| RecordingResult::new(&a, prefix)),
        })
    })
    .await
}

#[command]
pub async fn get_supported_mime_types() -> Result<Vec<String>, String> {
    with_sequencer(|sequencer| Ok(sequencer.supported_mime_types())).await
}
