//! Screen and audio recording.
//!
//! Collects encoded WebM chunks from a capture stream and turns them into one
//! downloadable recording once the recorder has stopped.

pub mod chunks;
pub mod download;
pub mod lifecycle;

pub use chunks::Recording;
pub use download::{play_file, save_recording};
pub use lifecycle::{Finalized, ScreenRecorder};
