//! Dedicated device threads
//!
//! Device handles (cpal streams, nokhwa cameras) are opened, driven and closed
//! on their own thread so the source handle itself stays `Send`. The spawning
//! side blocks until the thread reports that the device opened or failed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use super::CaptureSource;
use crate::errors::RecorderError;
use crate::types::{AudioTrack, SourceKind, VideoTrack};

/// Handed to the device thread body
pub struct WorkerContext<T> {
    stop: Arc<AtomicBool>,
    ready: Option<Sender<Result<T, RecorderError>>>,
}

impl<T> WorkerContext<T> {
    /// Report that the device is open. Only the first report is delivered.
    pub fn ready(&mut self, value: T) {
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(Ok(value));
        }
    }

    /// Report that opening the device failed
    pub fn fail(&mut self, error: RecorderError) {
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(Err(error));
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// A running device thread
pub struct DeviceWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceWorker {
    /// Spawn `body` on a named thread and wait up to `timeout` for it to
    /// report readiness. Returns the worker and the value passed to `ready`.
    pub fn spawn<T, F>(
        name: &str,
        kind: SourceKind,
        timeout: Duration,
        body: F,
    ) -> Result<(Self, T), RecorderError>
    where
        T: Send + 'static,
        F: FnOnce(WorkerContext<T>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded(1);
        let ctx = WorkerContext {
            stop: stop.clone(),
            ready: Some(tx),
        };

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(ctx))
            .map_err(|e| {
                RecorderError::DeviceUnavailable(kind, format!("failed to spawn capture thread: {e}"))
            })?;

        let mut worker = Self {
            stop,
            handle: Some(handle),
        };

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok((worker, value)),
            Ok(Err(e)) => {
                worker.stop();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                // The thread may be stuck inside a platform call; detach it.
                worker.stop.store(true, Ordering::Release);
                worker.handle = None;
                Err(RecorderError::DeviceUnavailable(
                    kind,
                    format!("device did not open within {:?}", timeout),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                worker.stop();
                Err(RecorderError::DeviceUnavailable(
                    kind,
                    "capture thread exited before the device opened".to_string(),
                ))
            }
        }
    }

    /// Signal the thread to stop and join it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Capture thread panicked during shutdown");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DeviceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A `CaptureSource` backed by a `DeviceWorker` producing one track
pub struct ThreadedSource {
    kind: SourceKind,
    label: String,
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
    worker: DeviceWorker,
    live: bool,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl ThreadedSource {
    pub fn video(kind: SourceKind, label: impl Into<String>, track: VideoTrack, worker: DeviceWorker) -> Self {
        Self::new(kind, label.into(), Some(track), None, worker)
    }

    pub fn audio(kind: SourceKind, label: impl Into<String>, track: AudioTrack, worker: DeviceWorker) -> Self {
        Self::new(kind, label.into(), None, Some(track), worker)
    }

    fn new(
        kind: SourceKind,
        label: String,
        video: Option<VideoTrack>,
        audio: Option<AudioTrack>,
        worker: DeviceWorker,
    ) -> Self {
        Self {
            kind,
            label,
            video,
            audio,
            worker,
            live: true,
            on_release: None,
        }
    }

    /// Run `hook` once, when the source is released
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }
}

impl CaptureSource for ThreadedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn take_video_track(&mut self) -> Option<VideoTrack> {
        self.video.take()
    }

    fn take_audio_track(&mut self) -> Option<AudioTrack> {
        self.audio.take()
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn release(&mut self) {
        if !self.live {
            return;
        }
        self.worker.stop();
        self.video = None;
        self.audio = None;
        self.live = false;
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_reports_ready_value() {
        let (mut worker, value) = DeviceWorker::spawn(
            "test-worker",
            SourceKind::Camera,
            Duration::from_secs(1),
            |mut ctx: WorkerContext<u32>| {
                ctx.ready(7);
                while !ctx.should_stop() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            },
        )
        .unwrap();
        assert_eq!(value, 7);
        assert!(worker.is_running());
        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_worker_failure_is_returned() {
        let result = DeviceWorker::spawn(
            "test-worker",
            SourceKind::Microphone,
            Duration::from_secs(1),
            |mut ctx: WorkerContext<()>| {
                ctx.fail(RecorderError::PermissionDenied(
                    SourceKind::Microphone,
                    "blocked".into(),
                ));
            },
        );
        assert!(matches!(
            result,
            Err(RecorderError::PermissionDenied(SourceKind::Microphone, _))
        ));
    }

    #[test]
    fn test_worker_exit_without_report() {
        let result = DeviceWorker::spawn(
            "test-worker",
            SourceKind::Camera,
            Duration::from_secs(1),
            |_ctx: WorkerContext<()>| {},
        );
        assert!(matches!(
            result,
            Err(RecorderError::DeviceUnavailable(SourceKind::Camera, _))
        ));
    }
}
