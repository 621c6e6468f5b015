//! Camera capture through nokhwa

use std::time::Duration;

use crossbeam_channel::TrySendError;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use super::classify_open_error;
use crate::capture::{DeviceWorker, ThreadedSource, WorkerContext, MAX_BUFFERED_FRAMES};
use crate::errors::RecorderError;
use crate::timing::PTSClock;
use crate::types::{MediaConstraints, SourceKind, TrackInfo, VideoFrame, VideoTrack};

const KIND: SourceKind = SourceKind::Camera;

struct Opened {
    label: String,
    width: u32,
    height: u32,
    fps: f64,
}

pub(super) fn open(
    index: u32,
    constraints: &MediaConstraints,
    clock: PTSClock,
    timeout: Duration,
) -> Result<ThreadedSource, RecorderError> {
    let (sender, receiver) = crossbeam_channel::bounded(MAX_BUFFERED_FRAMES);
    let requested_fps = constraints.video_fps;
    let requested_format = requested_camera_format(constraints);

    let (worker, opened) = DeviceWorker::spawn(
        "crabrec-camera",
        KIND,
        timeout,
        move |mut ctx: WorkerContext<Opened>| {
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(requested_format));
            let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
                Ok(c) => c,
                Err(e) => {
                    ctx.fail(classify_open_error(KIND, format!("failed to open camera: {e}")));
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                ctx.fail(classify_open_error(KIND, format!("failed to start stream: {e}")));
                return;
            }

            let resolution = camera.resolution();
            let fps = match camera.frame_rate() {
                0 => requested_fps,
                rate => rate as f64,
            };
            ctx.ready(Opened {
                label: camera.info().human_name(),
                width: resolution.width_x,
                height: resolution.height_y,
                fps,
            });

            let mut consumer_gone = false;
            while !ctx.should_stop() {
                if consumer_gone {
                    // Track dropped but device still held until release.
                    std::thread::sleep(Duration::from_millis(20));
                    continue;
                }
                let buffer = match camera.frame() {
                    Ok(b) => b,
                    Err(e) => {
                        log::error!("Camera frame capture failed: {}", e);
                        break;
                    }
                };
                let image = match buffer.decode_image::<RgbFormat>() {
                    Ok(img) => img,
                    Err(e) => {
                        log::warn!("Dropping undecodable camera frame: {}", e);
                        continue;
                    }
                };
                let frame = VideoFrame {
                    width: image.width(),
                    height: image.height(),
                    data: image.into_raw(),
                    timestamp: clock.pts(),
                };
                match sender.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => log::trace!("Camera track full, dropping frame"),
                    Err(TrySendError::Disconnected(_)) => consumer_gone = true,
                }
            }

            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", e);
            }
        },
    )?;

    let track = VideoTrack {
        info: TrackInfo::video(KIND, opened.label.clone(), opened.width, opened.height, opened.fps),
        receiver,
    };

    log::info!(
        "Camera '{}' opened at {}x{} @ {} fps",
        opened.label,
        opened.width,
        opened.height,
        opened.fps
    );
    Ok(ThreadedSource::video(KIND, opened.label, track, worker))
}

/// Format asked of the camera; nokhwa picks the closest one it supports
fn requested_camera_format(constraints: &MediaConstraints) -> CameraFormat {
    CameraFormat::new(
        Resolution::new(constraints.video_width, constraints.video_height),
        FrameFormat::MJPEG,
        constraints.video_fps.round().max(1.0) as u32,
    )
}
