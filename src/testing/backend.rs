//! Hardware-free capture backend
//!
//! Each acquired source runs a `DeviceWorker` that generates synthetic frames
//! at a fixed interval. Failures can be scripted per source kind, and the
//! backend counts how many devices are currently held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};

use super::synthetic_data::{synthetic_audio_frame, synthetic_video_frame};
use crate::capture::{
    CaptureBackend, CaptureSource, DeviceWorker, ThreadedSource, WorkerContext, MAX_BUFFERED_FRAMES,
};
use crate::errors::RecorderError;
use crate::timing::PTSClock;
use crate::types::{AudioTrack, MediaConstraints, SourceKind, TrackInfo, VideoTrack};

/// A scripted acquisition failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    PermissionDenied,
    Unavailable,
    PickerCancelled,
}

impl SyntheticFailure {
    fn into_error(self, kind: SourceKind) -> RecorderError {
        match self {
            SyntheticFailure::PermissionDenied => {
                RecorderError::PermissionDenied(kind, "denied by synthetic backend".to_string())
            }
            SyntheticFailure::Unavailable => {
                RecorderError::DeviceUnavailable(kind, "no synthetic device".to_string())
            }
            SyntheticFailure::PickerCancelled => RecorderError::UserCancelledPicker(kind),
        }
    }
}

pub struct SyntheticBackend {
    failures: Mutex<HashMap<SourceKind, SyntheticFailure>>,
    active: Arc<AtomicUsize>,
    acquisitions: AtomicUsize,
    video_size: (u32, u32),
    frame_interval: Duration,
    display_audio_rate: Option<u32>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
            acquisitions: AtomicUsize::new(0),
            video_size: (64, 48),
            frame_interval: Duration::from_millis(10),
            display_audio_rate: None,
        }
    }
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every acquisition of `kind` fail
    pub fn fail(self, kind: SourceKind, failure: SyntheticFailure) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(kind, failure);
        }
        self
    }

    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = (width, height);
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Run display audio at a different rate than the constraints ask for
    pub fn with_display_audio_rate(mut self, sample_rate: u32) -> Self {
        self.display_audio_rate = Some(sample_rate);
        self
    }

    /// Devices acquired and not yet released
    pub fn active_devices(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Successful acquisitions over the backend's lifetime
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    fn spawn_video(&self, kind: SourceKind, clock: &PTSClock) -> Result<ThreadedSource, RecorderError> {
        let (width, height) = self.video_size;
        let interval = self.frame_interval;
        let fps = (1.0 / interval.as_secs_f64().max(1e-3)).round();
        let clock = clock.clone();
        let (tx, rx) = crossbeam_channel::bounded(MAX_BUFFERED_FRAMES);

        let (worker, ()) = DeviceWorker::spawn(
            &format!("synthetic-{}", kind),
            kind,
            Duration::from_secs(1),
            move |mut ctx: WorkerContext<()>| {
                ctx.ready(());
                let mut frame_number = 0u64;
                let mut open = true;
                while !ctx.should_stop() {
                    if open {
                        let frame = synthetic_video_frame(frame_number, width, height, clock.pts());
                        open = offer(&tx, frame);
                        frame_number += 1;
                    }
                    std::thread::sleep(interval);
                }
            },
        )?;

        let label = format!("Synthetic {}", kind);
        let track = VideoTrack {
            info: TrackInfo::video(kind, label.clone(), width, height, fps),
            receiver: rx,
        };
        Ok(ThreadedSource::video(kind, label, track, worker))
    }

    fn spawn_audio(
        &self,
        kind: SourceKind,
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<ThreadedSource, RecorderError> {
        let sample_rate = match kind {
            SourceKind::DisplayAudio => self.display_audio_rate.unwrap_or(constraints.sample_rate),
            _ => constraints.sample_rate,
        };
        let channels = constraints.channels;
        let interval = self.frame_interval;
        let frames = ((sample_rate as f64 * interval.as_secs_f64()).round() as usize).max(1);
        let clock = clock.clone();
        let (tx, rx) = crossbeam_channel::bounded(MAX_BUFFERED_FRAMES);

        let (worker, ()) = DeviceWorker::spawn(
            &format!("synthetic-{}", kind),
            kind,
            Duration::from_secs(1),
            move |mut ctx: WorkerContext<()>| {
                ctx.ready(());
                let mut frame_number = 0u64;
                let mut open = true;
                while !ctx.should_stop() {
                    if open {
                        let frame = synthetic_audio_frame(frame_number, frames, sample_rate, channels, clock.pts());
                        open = offer(&tx, frame);
                        frame_number += 1;
                    }
                    std::thread::sleep(interval);
                }
            },
        )?;

        let label = format!("Synthetic {}", kind);
        let track = AudioTrack {
            info: TrackInfo::audio(Some(kind), label.clone(), sample_rate, channels),
            receiver: rx,
        };
        Ok(ThreadedSource::audio(kind, label, track, worker))
    }
}

/// Queue a frame, dropping it when the track is full. Returns false once the
/// receiving side is gone; the device stays held until release.
fn offer<T>(tx: &Sender<T>, frame: T) -> bool {
    !matches!(tx.try_send(frame), Err(TrySendError::Disconnected(_)))
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn acquire(
        &self,
        kind: SourceKind,
        constraints: &MediaConstraints,
        clock: &PTSClock,
    ) -> Result<Box<dyn CaptureSource>, RecorderError> {
        let scripted = self.failures.lock().ok().and_then(|f| f.get(&kind).copied());
        if let Some(failure) = scripted {
            return Err(failure.into_error(kind));
        }

        let source = match kind {
            SourceKind::Camera | SourceKind::DisplayVideo => self.spawn_video(kind, clock)?,
            SourceKind::Microphone | SourceKind::DisplayAudio => self.spawn_audio(kind, constraints, clock)?,
        };

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        let active = self.active.clone();
        Ok(Box::new(source.with_release_hook(move || {
            active.fetch_sub(1, Ordering::SeqCst);
        })))
    }
}
