//! One recording session: acquired sources, optional mix graph and the
//! encoder pump thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Select, Sender};
use serde::Serialize;
use uuid::Uuid;

use super::artifact::Artifact;
use super::chunk::ChunkBuffer;
use crate::capture::{CaptureBackend, SourceSet};
use crate::config::RecorderConfig;
use crate::encoding::{negotiate_mime_type, EncoderFactory, MediaEncoder, StreamLayout};
use crate::errors::RecorderError;
use crate::mixing::MixGraph;
use crate::selection::Selection;
use crate::timing::PTSClock;
use crate::types::{AudioTrack, MediaSample, SourceKind, TrackInfo, VideoTrack};

const PUMP_POLL: Duration = Duration::from_millis(20);

/// Messages from the encoder pump, in emission order
#[derive(Debug)]
pub enum ChunkEvent {
    Data(Bytes),
    Failed(String),
    /// Terminal event; nothing follows it
    Stopped,
}

/// At most one video and one audio track fed to the encoder
#[derive(Debug, Default)]
pub struct CombinedStream {
    pub video: Option<VideoTrack>,
    pub audio: Option<AudioTrack>,
}

/// Result of waiting on a combined stream
enum Received {
    Sample(MediaSample),
    VideoClosed,
    AudioClosed,
    Idle,
}

impl CombinedStream {
    pub fn layout(&self) -> StreamLayout {
        StreamLayout {
            video: self.video.as_ref().map(|t| t.info.clone()),
            audio: self.audio.as_ref().map(|t| t.info.clone()),
        }
    }

    fn recv_timeout(&self, video_open: bool, audio_open: bool, timeout: Duration) -> Received {
        let mut sel = Select::new();
        let video = match &self.video {
            Some(track) if video_open => Some((sel.recv(&track.receiver), &track.receiver)),
            _ => None,
        };
        let audio = match &self.audio {
            Some(track) if audio_open => Some((sel.recv(&track.receiver), &track.receiver)),
            _ => None,
        };

        let oper = match sel.select_timeout(timeout) {
            Ok(oper) => oper,
            Err(_) => return Received::Idle,
        };
        match (video, audio) {
            (Some((index, rx)), _) if oper.index() == index => match oper.recv(rx) {
                Ok(frame) => Received::Sample(MediaSample::Video(frame)),
                Err(_) => Received::VideoClosed,
            },
            (_, Some((index, rx))) if oper.index() == index => match oper.recv(rx) {
                Ok(frame) => Received::Sample(MediaSample::Audio(frame)),
                Err(_) => Received::AudioClosed,
            },
            _ => Received::Idle,
        }
    }

    /// Samples still queued on either track
    fn drain(&self) -> Vec<MediaSample> {
        let mut samples = Vec::new();
        if let Some(track) = &self.video {
            samples.extend(track.receiver.try_iter().map(MediaSample::Video));
        }
        if let Some(track) = &self.audio {
            samples.extend(track.receiver.try_iter().map(MediaSample::Audio));
        }
        samples
    }
}

/// Counters updated by the pump thread
#[derive(Debug, Default)]
pub struct PumpStats {
    chunks: AtomicU64,
    bytes: AtomicU64,
}

impl PumpStats {
    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Snapshot of a running session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: Uuid,
    pub mime_type: String,
    pub elapsed: Duration,
    pub chunks_emitted: u64,
    pub bytes_emitted: u64,
    pub tracks: Vec<TrackInfo>,
}

struct Pump {
    encoder: Box<dyn MediaEncoder>,
    stream: CombinedStream,
    timeslice: Duration,
    stop: Arc<AtomicBool>,
    events: Sender<ChunkEvent>,
    stats: Arc<PumpStats>,
}

impl Pump {
    fn emit(&self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        self.stats.chunks.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        log::debug!("Encoder chunk: {} bytes", data.len());
        let _ = self.events.send(ChunkEvent::Data(Bytes::from(data)));
    }

    fn encode(&mut self, sample: &MediaSample) -> Result<(), RecorderError> {
        match sample {
            MediaSample::Video(frame) => self.encoder.encode_video(frame),
            MediaSample::Audio(frame) => self.encoder.encode_audio(frame),
        }
    }

    fn run(mut self) {
        let mut video_open = self.stream.video.is_some();
        let mut audio_open = self.stream.audio.is_some();
        let mut last_emit = Instant::now();

        while !self.stop.load(Ordering::Acquire) && (video_open || audio_open) {
            match self.stream.recv_timeout(video_open, audio_open, PUMP_POLL) {
                Received::Sample(sample) => {
                    if let Err(e) = self.encode(&sample) {
                        self.fail(e);
                        return;
                    }
                }
                Received::VideoClosed => video_open = false,
                Received::AudioClosed => audio_open = false,
                Received::Idle => {}
            }

            if last_emit.elapsed() >= self.timeslice {
                let data = self.encoder.take_output();
                self.emit(data);
                last_emit = Instant::now();
            }
        }

        // Frames queued before the sources closed still belong to the recording.
        for sample in self.stream.drain() {
            if let Err(e) = self.encode(&sample) {
                self.fail(e);
                return;
            }
        }

        let data = self.encoder.take_output();
        self.emit(data);
        let Pump { encoder, events, .. } = self;
        match encoder.finish() {
            Ok(tail) => {
                if !tail.is_empty() {
                    let _ = events.send(ChunkEvent::Data(Bytes::from(tail)));
                }
            }
            Err(e) => {
                let _ = events.send(ChunkEvent::Failed(e.to_string()));
            }
        }
        let _ = events.send(ChunkEvent::Stopped);
    }

    fn fail(self, error: RecorderError) {
        log::error!("Encoder failed: {}", error);
        let _ = self.events.send(ChunkEvent::Failed(error.to_string()));
        let _ = self.events.send(ChunkEvent::Stopped);
    }
}

/// A running recording
pub struct RecordingSession {
    id: Uuid,
    sources: SourceSet,
    mix: Option<MixGraph>,
    layout: StreamLayout,
    mime_type: String,
    clock: PTSClock,
    stop: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    events: Receiver<ChunkEvent>,
    stats: Arc<PumpStats>,
}

impl RecordingSession {
    /// Acquire the selected sources, build the combined stream and start the
    /// encoder. Nothing stays acquired when this fails.
    pub fn open(
        backend: &dyn CaptureBackend,
        encoders: &dyn EncoderFactory,
        config: &RecorderConfig,
        selection: &Selection,
    ) -> Result<Self, RecorderError> {
        selection.validate()?;

        let clock = PTSClock::new();
        let mut sources = SourceSet::acquire_all(
            backend,
            &selection.requested_sources(),
            &config.constraints(),
            &clock,
        )?;

        let video = selection
            .video_precedence()
            .into_iter()
            .find_map(|kind| sources.take_video_track(kind));

        let mut mix = None;
        let audio = if selection.wants_mix()
            && sources.contains(SourceKind::Microphone)
            && sources.contains(SourceKind::DisplayAudio)
        {
            let inputs: Vec<(AudioTrack, f32)> = [
                (SourceKind::Microphone, config.mixing.microphone_gain),
                (SourceKind::DisplayAudio, config.mixing.display_audio_gain),
            ]
            .into_iter()
            .filter_map(|(kind, gain)| sources.take_audio_track(kind).map(|t| (t, gain)))
            .collect();
            let mut graph = MixGraph::build(inputs, config.mixing.block_ms, config.mixing.max_lag_blocks)?;
            let output = graph.take_output();
            mix = Some(graph);
            output
        } else {
            selection
                .audio_precedence()
                .into_iter()
                .find_map(|kind| sources.take_audio_track(kind))
        };

        // Unpicked devices stay acquired until stop but queue nothing.
        sources.discard_unused_tracks();

        let stream = CombinedStream { video, audio };
        let layout = stream.layout();
        if layout.is_empty() {
            return Err(RecorderError::InvalidSelection(
                "selected sources produced no tracks".to_string(),
            ));
        }

        let negotiated = negotiate_mime_type(encoders, &config.encoding.preferred_mime_types, &layout);
        let encoder = encoders.create(&negotiated.mime_type, &layout, &config.encoding)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PumpStats::default());
        let (tx, events) = crossbeam_channel::unbounded();
        let pump = Pump {
            encoder,
            stream,
            timeslice: Duration::from_millis(config.encoding.timeslice_ms),
            stop: stop.clone(),
            events: tx,
            stats: stats.clone(),
        };
        let handle = std::thread::Builder::new()
            .name("crabrec-encoder".to_string())
            .spawn(move || pump.run())
            .map_err(|e| RecorderError::Encoding(format!("failed to spawn encoder thread: {e}")))?;

        let session = Self {
            id: Uuid::new_v4(),
            sources,
            mix,
            layout,
            mime_type: negotiated.mime_type,
            clock,
            stop,
            pump: Some(handle),
            events,
            stats,
        };
        log::info!(
            "Recording session {} started: {} [{}]{}",
            session.id,
            session.mime_type,
            session
                .layout
                .tracks()
                .iter()
                .map(|t| t.label.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            if session.mix.is_some() { " (mixed audio)" } else { "" }
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    pub fn is_mixed(&self) -> bool {
        self.mix.is_some()
    }

    /// Sources whose device is still acquired
    pub fn live_sources(&self) -> usize {
        self.sources.live_count()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id,
            mime_type: self.mime_type.clone(),
            elapsed: self.clock.elapsed(),
            chunks_emitted: self.stats.chunks(),
            bytes_emitted: self.stats.bytes(),
            tracks: self.layout.tracks(),
        }
    }

    /// Release every device and node in teardown order and signal the pump
    fn shutdown(&mut self) {
        self.sources.release_all();
        if let Some(mix) = self.mix.as_mut() {
            mix.disconnect();
        }
        self.stop.store(true, Ordering::Release);
    }

    /// Stop capture, wait for the encoder's terminal event and assemble the
    /// artifact from every chunk in arrival order.
    pub fn finalize(mut self, timeout: Duration) -> Result<Artifact, RecorderError> {
        self.shutdown();

        let deadline = Instant::now() + timeout;
        let mut buffer = ChunkBuffer::new();
        let mut failure = None;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(ChunkEvent::Data(chunk)) => buffer.push(chunk),
                Ok(ChunkEvent::Failed(message)) => failure = Some(message),
                Ok(ChunkEvent::Stopped) => break,
                Err(RecvTimeoutError::Timeout) => {
                    // Leave the encoder thread behind rather than block on it.
                    self.pump = None;
                    return Err(RecorderError::FinalizeTimeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    failure.get_or_insert_with(|| "encoder exited without finishing".to_string());
                    break;
                }
            }
        }

        if let Some(handle) = self.pump.take() {
            if handle.join().is_err() {
                log::warn!("Encoder thread panicked");
            }
        }
        if let Some(message) = failure {
            return Err(RecorderError::Encoding(message));
        }

        let chunk_count = buffer.len();
        let data = buffer.concat();
        let artifact = Artifact::new(
            self.mime_type.clone(),
            data,
            self.layout.tracks(),
            chunk_count,
            self.clock.elapsed(),
        );
        log::info!(
            "Recording session {} finalized: {} chunk(s), {} bytes",
            self.id,
            chunk_count,
            artifact.size()
        );
        Ok(artifact)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.pump.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SyntheticBackend, SyntheticEncoderFactory};

    #[test]
    fn test_unpicked_sources_stay_live_without_queued_tracks() {
        let backend = SyntheticBackend::new().with_frame_interval(Duration::from_millis(1));
        let factory = SyntheticEncoderFactory::none();
        let selection = Selection {
            camera: true,
            microphone: true,
            display_video: true,
            display_audio: true,
            mix_microphone_and_display_audio: false,
            ..Selection::default()
        };

        let mut session =
            RecordingSession::open(&backend, &factory, &RecorderConfig::default(), &selection).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(session.live_sources(), 4);
        assert_eq!(session.layout().tracks().len(), 2);
        for kind in [SourceKind::Camera, SourceKind::DisplayVideo] {
            assert!(session.sources.take_video_track(kind).is_none());
        }
        for kind in [SourceKind::Microphone, SourceKind::DisplayAudio] {
            assert!(session.sources.take_audio_track(kind).is_none());
        }

        drop(session);
        assert_eq!(backend.active_devices(), 0);
    }
}
