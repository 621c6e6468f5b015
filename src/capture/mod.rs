//! Capture source acquisition
//!
//! A `CaptureBackend` turns a `SourceKind` into a live `CaptureSource`. Each
//! source owns one track whose frames arrive over a channel, and keeps its
//! device open (indicator on) until `release` is called or it is dropped.
//!
//! `SourceSet` groups the sources of one session and releases all of them on
//! every exit path, including a start sequence that fails half way.

mod worker;

pub mod native;

pub use native::NativeBackend;
pub use worker::{DeviceWorker, ThreadedSource, WorkerContext};

use crate::errors::RecorderError;
use crate::timing::PTSClock;
use crate::types::{AudioTrack, MediaConstraints, SourceKind, VideoTrack};

/// Frames a track channel holds before the producer starts dropping them.
/// 64 camera frames at 30 fps or 64 audio blocks of 10-20 ms.
pub const MAX_BUFFERED_FRAMES: usize = 64;

/// A live capture device handle
pub trait CaptureSource: Send {
    fn kind(&self) -> SourceKind;

    /// Human-readable device label
    fn label(&self) -> &str;

    /// Hand over the video track; `None` for audio sources or once taken
    fn take_video_track(&mut self) -> Option<VideoTrack>;

    /// Hand over the audio track; `None` for video sources or once taken
    fn take_audio_track(&mut self) -> Option<AudioTrack>;

    /// Whether the device is still acquired
    fn is_live(&self) -> bool;

    /// Stop the device and close its track. Idempotent.
    fn release(&mut self);
}

/// Platform access to capture devices
pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire one source. Blocks until the platform grants or denies access.
    fn acquire(
        &self,
        kind: SourceKind,
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError>;
}

/// The acquired sources of one session
#[derive(Default)]
pub struct SourceSet {
    sources: Vec<Box<dyn CaptureSource>>,
}

impl SourceSet {
    /// Acquire `kinds` one after another. On the first failure everything
    /// acquired so far is released and the error is returned.
    pub fn acquire_all(
        backend: &dyn CaptureBackend,
        kinds: &[SourceKind],
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<Self, RecorderError> {
        let mut set = SourceSet::default();

        for &kind in kinds {
            log::debug!("Acquiring {} from {} backend", kind, backend.name());
            match backend.acquire(kind, constraints, clock) {
                Ok(source) => {
                    log::debug!("Acquired {} ({})", kind, source.label());
                    set.sources.push(source);
                }
                Err(e) => {
                    log::debug!(
                        "Acquiring {} failed, releasing {} acquired source(s)",
                        kind,
                        set.sources.len()
                    );
                    set.release_all();
                    return Err(e);
                }
            }
        }

        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.sources.iter().any(|s| s.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Number of sources whose device is still acquired
    pub fn live_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_live()).count()
    }

    pub fn take_video_track(&mut self, kind: SourceKind) -> Option<VideoTrack> {
        self.sources
            .iter_mut()
            .find(|s| s.kind() == kind)
            .and_then(|s| s.take_video_track())
    }

    pub fn take_audio_track(&mut self, kind: SourceKind) -> Option<AudioTrack> {
        self.sources
            .iter_mut()
            .find(|s| s.kind() == kind)
            .and_then(|s| s.take_audio_track())
    }

    /// Drop every track nobody took. The devices stay acquired; their
    /// producers see the closed channel and stop queuing frames.
    pub fn discard_unused_tracks(&mut self) -> usize {
        let mut discarded = 0;
        for source in self.sources.iter_mut() {
            let video = source.take_video_track().is_some();
            let audio = source.take_audio_track().is_some();
            if video || audio {
                log::debug!("Discarding unused track of {} ({})", source.kind(), source.label());
                discarded += usize::from(video) + usize::from(audio);
            }
        }
        discarded
    }

    /// Release every source, most recently acquired first
    pub fn release_all(&mut self) {
        for source in self.sources.iter_mut().rev() {
            if source.is_live() {
                log::debug!("Releasing {} ({})", source.kind(), source.label());
            }
            source.release();
        }
    }
}

impl Drop for SourceSet {
    fn drop(&mut self) {
        self.release_all();
    }
}
