//! Platform capture capabilities.
//!
//! The lifecycles never talk to devices directly. They go through the traits
//! in this module, which have a cpal-backed microphone and an ffmpeg-backed
//! screen recorder as production implementations.

pub mod ffmpeg;
pub mod microphone;
pub mod screen;

#[cfg(test)]
pub mod fake;

use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::visualization::AnalyserHandle;

pub use ffmpeg::find_ffmpeg;
pub use microphone::CpalMicrophone;
pub use screen::{FfmpegScreenSource, ScreenSettings};

/// MIME type of everything the recorder produces.
pub const WEBM_MIME: &str = "video/webm";

/// Why a capture source could not be acquired or driven.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no capture device available: {0}")]
    NoDevice(String),

    #[error("capture source unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// A source of live microphone input.
///
/// Acquisition is permission-gated and may be refused. On success the returned
/// input is already delivering samples into `sink`.
pub trait MicrophoneSource {
    type Input: LiveInput;

    fn acquire(
        &self,
        sink: AnalyserHandle,
    ) -> impl Future<Output = Result<Self::Input, CaptureError>>;
}

/// A live input stream whose tracks can be halted.
pub trait LiveInput {
    /// Halts every track. Calling it again is harmless.
    fn stop_tracks(&mut self);
}

/// Requested screen-capture configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConstraints {
    pub show_cursor: bool,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            show_cursor: true,
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44_100,
        }
    }
}

/// A source of screen-capture streams (video plus audio).
pub trait ScreenSource {
    type Stream: CaptureStream;

    fn acquire(
        &self,
        constraints: &DisplayConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CaptureError>>;
}

/// A live screen-capture stream.
pub trait CaptureStream: Send + 'static {
    type Recorder: MediaRecorder;

    /// Binds a recorder producing `mime_type` to this stream.
    fn recorder(&mut self, mime_type: &str) -> Result<Self::Recorder, CaptureError>;

    /// Halts every track and releases the capture device.
    fn stop_tracks(&mut self);
}

/// Event delivered by a running recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// An encoded chunk, in generation order
    Data(Vec<u8>),
    /// The recorder has fully stopped; no data follows
    Stopped,
}

/// An encoder bound to a capture stream.
///
/// After `start`, the recorder sends `Data` events in generation order and
/// exactly one final `Stopped` once it has flushed everything following `stop`.
pub trait MediaRecorder {
    fn start(&mut self, events: mpsc::UnboundedSender<RecorderEvent>) -> Result<(), CaptureError>;

    fn stop(&mut self);
}
