//! Testing utilities for crabrec
//!
//! A capture backend and an encoder factory that need no hardware, plus the
//! synthetic frame generators they are built on.

mod backend;
mod encoder;
pub mod synthetic_data;

pub use backend::{SyntheticBackend, SyntheticFailure};
pub use encoder::{EncoderFault, SyntheticEncoderFactory};
pub use synthetic_data::{synthetic_audio_frame, synthetic_video_frame};
