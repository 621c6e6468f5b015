//! Microphone capture through cpal
//!
//! The cpal stream is built and kept on the device thread; the callback only
//! timestamps the PCM block and pushes it into the track channel.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;

use super::classify_open_error;
use crate::capture::{DeviceWorker, ThreadedSource, WorkerContext, MAX_BUFFERED_FRAMES};
use crate::errors::RecorderError;
use crate::timing::PTSClock;
use crate::types::{AudioFrame, AudioTrack, MediaConstraints, SourceKind, TrackInfo};

const KIND: SourceKind = SourceKind::Microphone;

struct Opened {
    label: String,
    sample_rate: u32,
    channels: u16,
}

pub(super) fn open(
    device_name: Option<String>,
    constraints: &MediaConstraints,
    clock: PTSClock,
    timeout: Duration,
) -> Result<ThreadedSource, RecorderError> {
    let (sender, receiver) = crossbeam_channel::bounded(MAX_BUFFERED_FRAMES);
    let requested_rate = constraints.sample_rate;
    let requested_channels = constraints.channels;

    let (worker, opened) = DeviceWorker::spawn(
        "crabrec-microphone",
        KIND,
        timeout,
        move |mut ctx: WorkerContext<Opened>| {
            let host = cpal::default_host();
            let device = match device_name.as_deref() {
                None | Some("") | Some("default") => host.default_input_device(),
                Some(name) => host
                    .input_devices()
                    .ok()
                    .and_then(|mut devices| {
                        devices.find(|d| d.name().ok().as_deref() == Some(name))
                    }),
            };
            let Some(device) = device else {
                ctx.fail(RecorderError::DeviceUnavailable(
                    KIND,
                    "no audio input device found".to_string(),
                ));
                return;
            };

            let supported = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    ctx.fail(classify_open_error(KIND, format!("no supported config: {e}")));
                    return;
                }
            };

            // Honor the requested format only where every host supports it.
            let sample_rate = if requested_rate == 48000 || requested_rate == 44100 {
                requested_rate
            } else {
                supported.sample_rate().0
            };
            let channels = if requested_channels == 1 || requested_channels == 2 {
                requested_channels
            } else {
                supported.channels()
            };

            let config = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let frame = AudioFrame {
                        samples: data.to_vec(),
                        sample_rate,
                        channels,
                        timestamp: clock.pts(),
                    };
                    // Full or closed track: drop the block.
                    let _ = sender.try_send(frame);
                },
                |err| {
                    log::error!("Microphone stream error: {}", err);
                },
                None,
            );
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    ctx.fail(classify_open_error(KIND, format!("failed to build stream: {e}")));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                ctx.fail(classify_open_error(KIND, format!("failed to start stream: {e}")));
                return;
            }

            let label = device.name().unwrap_or_else(|_| "microphone".to_string());
            ctx.ready(Opened {
                label,
                sample_rate,
                channels,
            });

            while !ctx.should_stop() {
                std::thread::sleep(Duration::from_millis(20));
            }

            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause microphone stream: {}", e);
            }
            // Dropping the stream closes the device and the track sender.
        },
    )?;

    let track = AudioTrack {
        info: TrackInfo::audio(Some(KIND), opened.label.clone(), opened.sample_rate, opened.channels),
        receiver,
    };

    log::info!(
        "Microphone '{}' opened at {} Hz, {} channel(s)",
        opened.label,
        opened.sample_rate,
        opened.channels
    );
    Ok(ThreadedSource::audio(KIND, opened.label, track, worker))
}
