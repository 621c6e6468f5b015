//! Recording sessions and the sequencer that drives them
//!
//! # Example
//! ```rust,no_run
//! use crabrec::{RecorderConfig, Selection, Sequencer};
//!
//! let mut sequencer = Sequencer::native(RecorderConfig::default());
//! sequencer.start(&Selection::camera_and_microphone())?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! if let Some(artifact) = sequencer.stop()? {
//!     artifact.save_to("./recordings", "recording")?;
//! }
//! # Ok::<(), crabrec::RecorderError>(())
//! ```

mod artifact;
mod chunk;
mod sequencer;
mod session;

pub use artifact::Artifact;
pub use chunk::ChunkBuffer;
pub use sequencer::{Sequencer, SequencerState, StateObserver};
pub use session::{ChunkEvent, CombinedStream, PumpStats, RecordingSession, SessionStats};
