//! crabrec: capture, mix and record media sessions
//!
//! This crate drives one recording session end to end: it acquires capture
//! sources (camera, microphone, display video, display audio), optionally
//! merges the audio sources through a mix graph, feeds the combined stream to
//! an encoder and assembles the encoded chunks into a single artifact on stop.
//!
//! # Features
//! - `camera`: camera capture through nokhwa
//! - `audio`: microphone capture through cpal
//! - `recording`: H.264/MP4 encoding through openh264 and muxide
//! - `tauri`: Tauri plugin exposing the recording commands
//!
//! # Usage
//! ```rust,no_run
//! use crabrec::{RecorderConfig, Selection, Sequencer};
//!
//! crabrec::init_logging();
//! let mut sequencer = Sequencer::native(RecorderConfig::load_or_default());
//! sequencer.start(&Selection::camera_and_microphone())?;
//! // ...
//! let artifact = sequencer.stop()?;
//! # Ok::<(), crabrec::RecorderError>(())
//! ```
//!
//! In a Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(crabrec::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod capture;
#[cfg(feature = "tauri")]
pub mod commands;
pub mod config;
pub mod encoding;
pub mod errors;
pub mod mixing;
pub mod recording;
pub mod selection;
pub mod timing;
pub mod types;

// Testing utilities - synthetic devices for offline testing
pub mod testing;

// Re-exports for convenience
pub use capture::{CaptureBackend, CaptureSource, NativeBackend, SourceSet};
pub use config::RecorderConfig;
pub use encoding::{DefaultEncoderFactory, EncoderFactory, MediaEncoder, StreamLayout};
pub use errors::RecorderError;
pub use mixing::MixGraph;
pub use recording::{Artifact, Sequencer, SequencerState, SessionStats};
pub use selection::{AudioPriority, Selection, VideoPriority};
pub use types::{AudioFrame, MediaConstraints, SourceKind, TrackInfo, TrackKind, VideoFrame};

#[cfg(feature = "tauri")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the crabrec plugin with all commands
#[cfg(feature = "tauri")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("crabrec")
        .invoke_handler(tauri::generate_handler![
            commands::recording::start_recording,
            commands::recording::stop_recording,
            commands::recording::get_recording_status,
            commands::recording::get_supported_mime_types,
        ])
        .build()
}

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabrec=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        capture_kinds: NativeBackend::supported_kinds(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Source kinds the native backend was built with
    pub capture_kinds: Vec<SourceKind>,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "crabrec");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
