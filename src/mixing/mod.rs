//! Audio mix graph
//!
//! Merges several audio tracks into one. The graph owns a mixer thread that
//! selects over every input channel, feeds a [`Mixer`] and forwards mixed
//! blocks to a single output track. It lives for one session.

mod mixer;

pub use mixer::{MixInput, Mixer};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender};

use crate::errors::RecorderError;
use crate::types::{AudioFrame, AudioTrack, TrackInfo};

const SELECT_TIMEOUT: Duration = Duration::from_millis(20);

/// A running mix of several audio tracks into one
pub struct MixGraph {
    inputs: Vec<TrackInfo>,
    output: Option<AudioTrack>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MixGraph {
    /// Connect `tracks` (each with its gain) to a new combined output.
    ///
    /// Every track must share one sample rate and channel count.
    pub fn build(
        tracks: Vec<(AudioTrack, f32)>,
        block_ms: u32,
        max_lag_blocks: u32,
    ) -> Result<Self, RecorderError> {
        let specs: Vec<MixInput> = tracks
            .iter()
            .map(|(track, gain)| MixInput {
                sample_rate: track.sample_rate(),
                channels: track.channels(),
                gain: *gain,
            })
            .collect();
        let mixer = Mixer::new(&specs, block_ms, max_lag_blocks)?;

        let inputs: Vec<TrackInfo> = tracks.iter().map(|(t, _)| t.info.clone()).collect();
        let receivers: Vec<Receiver<AudioFrame>> = tracks.into_iter().map(|(t, _)| t.receiver).collect();

        let (sender, receiver) = crossbeam_channel::unbounded();
        let output = AudioTrack {
            info: TrackInfo::audio(None, "mixed audio", mixer.sample_rate(), mixer.channels()),
            receiver,
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("crabrec-mixer".to_string())
            .spawn(move || mix_loop(receivers, mixer, sender, stop_flag))
            .map_err(|e| RecorderError::IncompatibleAudio(format!("failed to spawn mixer thread: {e}")))?;

        log::debug!(
            "Mix graph connected: {}",
            inputs.iter().map(|t| t.label.as_str()).collect::<Vec<_>>().join(" + ")
        );

        Ok(Self {
            inputs,
            output: Some(output),
            stop,
            handle: Some(handle),
        })
    }

    /// The merged output track; `None` once taken
    pub fn take_output(&mut self) -> Option<AudioTrack> {
        self.output.take()
    }

    pub fn inputs(&self) -> &[TrackInfo] {
        &self.inputs
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the mixer, flushing buffered audio to the output first. Idempotent.
    pub fn disconnect(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Mixer thread panicked");
            }
            log::debug!("Mix graph disconnected");
        }
        self.output = None;
    }
}

impl Drop for MixGraph {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn mix_loop(
    receivers: Vec<Receiver<AudioFrame>>,
    mut mixer: Mixer,
    output: Sender<AudioFrame>,
    stop: Arc<AtomicBool>,
) {
    let mut open = vec![true; receivers.len()];

    while !stop.load(Ordering::Acquire) && open.iter().any(|o| *o) {
        let mut sel = Select::new();
        let mut registered = Vec::with_capacity(receivers.len());
        for (index, rx) in receivers.iter().enumerate() {
            if open[index] {
                sel.recv(rx);
                registered.push(index);
            }
        }

        let event = match sel.select_timeout(SELECT_TIMEOUT) {
            Ok(oper) => {
                let index = registered[oper.index()];
                Some((index, oper.recv(&receivers[index])))
            }
            Err(_) => None,
        };

        match event {
            Some((index, Ok(frame))) => {
                if let Err(e) = mixer.push(index, frame) {
                    log::warn!("Dropping mixer input frame: {}", e);
                }
            }
            Some((index, Err(_))) => {
                open[index] = false;
                mixer.close(index);
            }
            None => {}
        }

        for frame in mixer.pull_ready() {
            if output.send(frame).is_err() {
                return;
            }
        }
    }

    for (index, rx) in receivers.iter().enumerate() {
        while let Ok(frame) = rx.try_recv() {
            if let Err(e) = mixer.push(index, frame) {
                log::warn!("Dropping mixer input frame: {}", e);
            }
        }
    }

    let mut tail = mixer.pull_ready();
    tail.extend(mixer.flush());
    for frame in tail {
        if output.send(frame).is_err() {
            break;
        }
    }
}
