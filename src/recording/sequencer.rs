//! Capture/mix/record sequencer
//!
//! Drives one session at a time through `Idle → Acquiring → Recording →
//! Finalizing → Idle`. Start acquires the selected sources and starts the
//! encoder; stop tears everything down and returns the assembled artifact.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::artifact::Artifact;
use super::session::{RecordingSession, SessionStats};
use crate::capture::{CaptureBackend, NativeBackend};
use crate::config::RecorderConfig;
use crate::encoding::{DefaultEncoderFactory, EncoderFactory, StreamLayout};
use crate::errors::RecorderError;
use crate::selection::Selection;
use crate::types::{SourceKind, TrackInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SequencerState {
    Idle,
    Acquiring,
    Recording,
    Finalizing,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequencerState::Idle => "idle",
            SequencerState::Acquiring => "acquiring",
            SequencerState::Recording => "recording",
            SequencerState::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

pub type StateObserver = Box<dyn Fn(SequencerState) + Send + Sync>;

pub struct Sequencer {
    backend: Arc<dyn CaptureBackend>,
    encoders: Arc<dyn EncoderFactory>,
    config: RecorderConfig,
    state: SequencerState,
    session: Option<RecordingSession>,
    last_artifact: Option<Arc<Artifact>>,
    observers: Vec<StateObserver>,
}

impl Sequencer {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        encoders: Arc<dyn EncoderFactory>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            backend,
            encoders,
            config,
            state: SequencerState::Idle,
            session: None,
            last_artifact: None,
            observers: Vec::new(),
        }
    }

    /// Sequencer on the native devices with the built-in encoders
    pub fn native(config: RecorderConfig) -> Self {
        Self::new(
            Arc::new(NativeBackend::new()),
            Arc::new(DefaultEncoderFactory),
            config,
        )
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// The artifact produced by the most recent successful stop
    pub fn last_artifact(&self) -> Option<Arc<Artifact>> {
        self.last_artifact.clone()
    }

    /// Devices held by the active session
    pub fn active_sources(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.live_sources())
    }

    /// Register a callback for every state transition
    pub fn on_state_change(&mut self, observer: impl Fn(SequencerState) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn set_state(&mut self, state: SequencerState) {
        if self.state == state {
            return;
        }
        log::debug!("Sequencer state: {} -> {}", self.state, state);
        self.state = state;
        for observer in &self.observers {
            observer(state);
        }
    }

    /// Acquire the selected sources and start recording.
    ///
    /// The first acquisition failure aborts the start: nothing stays
    /// acquired, no encoder is created and the sequencer returns to idle.
    pub fn start(&mut self, selection: &Selection) -> Result<Uuid, RecorderError> {
        if self.session.is_some() {
            log::warn!("Start requested while a session is active");
            return Err(RecorderError::AlreadyRecording);
        }

        self.set_state(SequencerState::Acquiring);
        match RecordingSession::open(
            self.backend.as_ref(),
            self.encoders.as_ref(),
            &self.config,
            selection,
        ) {
            Ok(session) => {
                let id = session.id();
                self.session = Some(session);
                self.set_state(SequencerState::Recording);
                Ok(id)
            }
            Err(e) => {
                log::error!("{}", e.user_message());
                self.set_state(SequencerState::Idle);
                Err(e)
            }
        }
    }

    /// Stop the active session and return its artifact.
    ///
    /// Without an active session this does nothing and returns `Ok(None)`.
    pub fn stop(&mut self) -> Result<Option<Arc<Artifact>>, RecorderError> {
        let Some(session) = self.session.take() else {
            log::debug!("Stop requested with no active session");
            return Ok(None);
        };

        self.set_state(SequencerState::Finalizing);
        let timeout = Duration::from_millis(self.config.encoding.finalize_timeout_ms);
        let result = session.finalize(timeout);
        self.set_state(SequencerState::Idle);

        let mut artifact = result.map_err(|e| {
            log::error!("{}", e.user_message());
            e
        })?;

        if self.config.storage.auto_download {
            match artifact.save_to(&self.config.storage.output_directory, &self.config.storage.file_prefix) {
                Ok(path) => artifact.saved_path = Some(path),
                Err(e) => log::error!("Failed to save recording: {}", e),
            }
        }

        let artifact = Arc::new(artifact);
        self.last_artifact = Some(artifact.clone());
        Ok(Some(artifact))
    }

    pub fn session_stats(&self) -> Result<SessionStats, RecorderError> {
        self.session
            .as_ref()
            .map(|s| s.stats())
            .ok_or(RecorderError::NoActiveSession)
    }

    /// Preferred MIME types the encoder factory supports for video with audio
    pub fn supported_mime_types(&self) -> Vec<String> {
        let capture = &self.config.capture;
        let layout = StreamLayout {
            video: Some(TrackInfo::video(
                SourceKind::Camera,
                "capability",
                capture.video_width,
                capture.video_height,
                capture.video_fps,
            )),
            audio: Some(TrackInfo::audio(None, "capability", capture.sample_rate, capture.channels)),
        };
        self.config
            .encoding
            .preferred_mime_types
            .iter()
            .filter(|mime| self.encoders.is_type_supported(mime, &layout))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SequencerState::Finalizing.to_string(), "finalizing");
        assert_eq!(
            serde_json::to_string(&SequencerState::Recording).unwrap(),
            "\"recording\""
        );
    }

    #[test]
    fn test_native_sequencer_starts_idle() {
        let mut sequencer = Sequencer::native(RecorderConfig::default());
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert!(matches!(sequencer.session_stats(), Err(RecorderError::NoActiveSession)));
        assert!(sequencer.stop().unwrap().is_none());
        assert!(sequencer.last_artifact().is_none());
    }

    #[test]
    fn test_empty_selection_never_leaves_idle() {
        let mut sequencer = Sequencer::native(RecorderConfig::default());
        let result = sequencer.start(&Selection::default());
        assert!(matches!(result, Err(RecorderError::InvalidSelection(_))));
        assert_eq!(sequencer.state(), SequencerState::Idle);
    }
}
