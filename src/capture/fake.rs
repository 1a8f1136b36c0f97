//! In-memory capture sources for lifecycle tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::{
    CaptureError, CaptureStream, DisplayConstraints, LiveInput, MediaRecorder, MicrophoneSource,
    RecorderEvent, ScreenSource, WEBM_MIME,
};
use crate::visualization::AnalyserHandle;

/// Microphone whose permission prompt can be scripted.
#[derive(Clone, Default)]
pub struct FakeMicrophone {
    denied: Arc<AtomicBool>,
    acquisitions: Arc<AtomicUsize>,
    live: Arc<AtomicBool>,
}

impl FakeMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        let mic = Self::default();
        mic.denied.store(true, Ordering::SeqCst);
        mic
    }

    pub fn allow(&self) {
        self.denied.store(false, Ordering::SeqCst);
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeInput {
    live: Arc<AtomicBool>,
}

impl LiveInput for FakeInput {
    fn stop_tracks(&mut self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl MicrophoneSource for FakeMicrophone {
    type Input = FakeInput;

    async fn acquire(&self, _sink: AnalyserHandle) -> Result<FakeInput, CaptureError> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied(
                "microphone access refused".to_string(),
            ));
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.live.store(true, Ordering::SeqCst);
        Ok(FakeInput {
            live: self.live.clone(),
        })
    }
}

/// Screen source whose recorder emits whatever chunks the test pushes.
#[derive(Clone, Default)]
pub struct FakeScreen {
    denied: Arc<AtomicBool>,
    acquisitions: Arc<AtomicUsize>,
    live: Arc<AtomicBool>,
    events: Arc<Mutex<Option<mpsc::UnboundedSender<RecorderEvent>>>>,
    constraints: Arc<Mutex<Option<DisplayConstraints>>>,
    hold_stops: Arc<AtomicBool>,
    held: Arc<Mutex<Vec<mpsc::UnboundedSender<RecorderEvent>>>>,
}

impl FakeScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        let screen = Self::default();
        screen.denied.store(true, Ordering::SeqCst);
        screen
    }

    /// Recorders acknowledge `stop` only when [`FakeScreen::release_stop`] says so.
    pub fn holding_stops() -> Self {
        let screen = Self::default();
        screen.hold_stops.store(true, Ordering::SeqCst);
        screen
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Whether the most recent capture stream still holds its tracks.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<DisplayConstraints> {
        self.constraints.lock().unwrap().clone()
    }

    /// Delivers a chunk as the running recorder would.
    pub fn emit(&self, chunk: &[u8]) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(RecorderEvent::Data(chunk.to_vec()));
        }
    }

    /// Reports the running recorder as stopped without a stop request, as
    /// when the encoder process dies mid-recording.
    pub fn end_capture(&self) {
        if let Some(events) = self.events.lock().unwrap().take() {
            let _ = events.send(RecorderEvent::Stopped);
        }
    }

    /// Lets the `index`-th held recorder (in stop order) report that it stopped.
    pub fn release_stop(&self, index: usize) {
        if let Some(events) = self.held.lock().unwrap().get(index) {
            let _ = events.send(RecorderEvent::Stopped);
        }
    }
}

pub struct FakeCapture {
    screen: FakeScreen,
}

impl ScreenSource for FakeScreen {
    type Stream = FakeCapture;

    async fn acquire(&self, constraints: &DisplayConstraints) -> Result<FakeCapture, CaptureError> {
        *self.constraints.lock().unwrap() = Some(constraints.clone());
        if self.denied.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied(
                "screen capture cancelled".to_string(),
            ));
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.live.store(true, Ordering::SeqCst);
        Ok(FakeCapture {
            screen: self.clone(),
        })
    }
}

impl CaptureStream for FakeCapture {
    type Recorder = FakeRecorder;

    fn recorder(&mut self, mime_type: &str) -> Result<FakeRecorder, CaptureError> {
        if mime_type != WEBM_MIME {
            return Err(CaptureError::Unsupported(mime_type.to_string()));
        }
        Ok(FakeRecorder {
            screen: self.screen.clone(),
        })
    }

    fn stop_tracks(&mut self) {
        self.screen.live.store(false, Ordering::SeqCst);
    }
}

// like the ffmpeg child, a dropped capture is killed
impl Drop for FakeCapture {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

pub struct FakeRecorder {
    screen: FakeScreen,
}

impl MediaRecorder for FakeRecorder {
    fn start(&mut self, events: mpsc::UnboundedSender<RecorderEvent>) -> Result<(), CaptureError> {
        *self.screen.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(events) = self.screen.events.lock().unwrap().take() else {
            return;
        };
        if self.screen.hold_stops.load(Ordering::SeqCst) {
            self.screen.held.lock().unwrap().push(events);
        } else {
            let _ = events.send(RecorderEvent::Stopped);
        }
    }
}
