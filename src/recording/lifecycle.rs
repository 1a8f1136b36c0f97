//! Recording lifecycle: `Idle -> Recording -> Idle`.
//!
//! `start` acquires a screen-capture stream, binds a WebM recorder to it and
//! hands the stream to a finalizer task. The finalizer appends chunks in
//! arrival order until the recorder reports that it has fully stopped, then
//! releases the capture stream and publishes the assembled recording.
//!
//! Sessions are numbered as they start. Finalizers of different sessions may
//! finish in any order, so a finalizer only publishes when no newer session
//! has published already.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::chunks::{ChunkSequence, Recording};
use crate::capture::{
    CaptureError, CaptureStream, DisplayConstraints, MediaRecorder, RecorderEvent, ScreenSource,
    WEBM_MIME,
};
use crate::lifecycle::{ToggleControls, Transition};

type Published = Arc<watch::Sender<Option<Finalized>>>;
type RecorderOf<S> = <<S as ScreenSource>::Stream as CaptureStream>::Recorder;

/// A finalized recording and the session that produced it.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub session: u64,
    pub recording: Arc<Recording>,
}

struct RecordingSession<R> {
    id: u64,
    recorder: R,
    started_at: Instant,
    finalizer: JoinHandle<()>,
}

impl<R> RecordingSession<R> {
    /// The recorder stopped by itself and its recording is already published.
    fn has_ended(&self) -> bool {
        self.finalizer.is_finished()
    }
}

enum RecorderState<R> {
    Idle,
    Recording(RecordingSession<R>),
}

/// Screen recording state machine.
pub struct ScreenRecorder<S: ScreenSource> {
    source: S,
    constraints: DisplayConstraints,
    state: RecorderState<RecorderOf<S>>,
    published: Published,
    /// Id of the most recently started session
    sessions: u64,
    /// Finalizers of stopped sessions
    finalizers: Vec<JoinHandle<()>>,
}

impl<S: ScreenSource> ScreenRecorder<S> {
    pub fn new(source: S, constraints: DisplayConstraints) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            source,
            constraints,
            state: RecorderState::Idle,
            published: Arc::new(published),
            sessions: 0,
            finalizers: Vec::new(),
        }
    }

    /// Whether a recorder is running. A session whose recorder ended on its
    /// own no longer counts.
    pub fn is_recording(&self) -> bool {
        matches!(&self.state, RecorderState::Recording(session) if !session.has_ended())
    }

    pub fn controls(&self) -> ToggleControls {
        ToggleControls::for_running(self.is_recording())
    }

    /// Time since the running recording started.
    pub fn elapsed(&self) -> Option<Duration> {
        match &self.state {
            RecorderState::Recording(session) if !session.has_ended() => {
                Some(session.started_at.elapsed())
            }
            _ => None,
        }
    }

    /// The most recently finalized recording.
    pub fn latest(&self) -> Option<Arc<Recording>> {
        self.published
            .borrow()
            .as_ref()
            .map(|finalized| finalized.recording.clone())
    }

    /// Notifies on every newly finalized recording.
    pub fn subscribe(&self) -> watch::Receiver<Option<Finalized>> {
        self.published.subscribe()
    }

    /// Whether a stopped recording is still being finalized.
    pub fn is_finalizing(&self) -> bool {
        self.finalizers.iter().any(|handle| !handle.is_finished())
    }

    /// Returns to `Idle` if the running recorder ended without a stop request,
    /// e.g. because the encoder exited. Returns whether that happened.
    pub fn reap_ended(&mut self) -> bool {
        if !matches!(&self.state, RecorderState::Recording(session) if session.has_ended()) {
            return false;
        }
        if let RecorderState::Recording(session) =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        {
            tracing::warn!("Recording {} ended without a stop request", session.id);
            self.finalizers.push(session.finalizer);
        }
        true
    }

    /// Starts recording.
    ///
    /// Ignored while already recording. On failure the error is logged and
    /// returned, any acquired stream is released and the lifecycle stays `Idle`.
    pub async fn start(&mut self) -> Result<Transition, CaptureError> {
        if self.is_recording() {
            tracing::debug!("Recording already running; start ignored");
            return Ok(Transition::Ignored);
        }
        self.reap_ended();

        let mut stream = self.source.acquire(&self.constraints).await.map_err(|e| {
            tracing::error!("Screen capture acquisition failed: {e}");
            e
        })?;

        let mut recorder = match stream.recorder(WEBM_MIME) {
            Ok(recorder) => recorder,
            Err(e) => {
                stream.stop_tracks();
                tracing::error!("Could not create recorder: {e}");
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if let Err(e) = recorder.start(events_tx) {
            stream.stop_tracks();
            tracing::error!("Could not start recorder: {e}");
            return Err(e);
        }

        self.sessions += 1;
        let id = self.sessions;
        self.finalizers.retain(|handle| !handle.is_finished());
        let finalizer = tokio::spawn(finalize(id, events_rx, stream, self.published.clone()));

        self.state = RecorderState::Recording(RecordingSession {
            id,
            recorder,
            started_at: Instant::now(),
            finalizer,
        });
        tracing::info!("Recording {} started ({})", id, WEBM_MIME);
        Ok(Transition::Started)
    }

    /// Signals the recorder to stop; finalization continues in the background.
    pub fn stop(&mut self) -> Transition {
        let RecorderState::Recording(mut session) =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            tracing::debug!("Not recording; stop ignored");
            return Transition::Ignored;
        };

        if session.has_ended() {
            tracing::warn!("Recording {} had already ended; stop ignored", session.id);
            self.finalizers.push(session.finalizer);
            return Transition::Ignored;
        }

        session.recorder.stop();
        tracing::info!(
            "Recording {} stopped after {:.1}s, finalizing",
            session.id,
            session.started_at.elapsed().as_secs_f32()
        );
        self.finalizers.push(session.finalizer);
        Transition::Stopped
    }

    /// Waits up to `limit` for every stopped recording to publish.
    ///
    /// Finalizers still pending after `limit` are aborted, which drops their
    /// capture streams, and `false` is returned. A recording that is still
    /// running is not waited for.
    pub async fn wait_finalized(&mut self, limit: Duration) -> bool {
        let finalizers = &mut self.finalizers;
        let drained = tokio::time::timeout(limit, async move {
            while let Some(handle) = finalizers.first_mut() {
                if let Err(e) = handle.await {
                    tracing::warn!("Recording finalizer failed: {}", e);
                }
                finalizers.remove(0);
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                "Gave up on {} recording(s) still finalizing after {:?}",
                self.finalizers.len(),
                limit
            );
            for handle in self.finalizers.drain(..) {
                handle.abort();
                // resolves once the aborted task has dropped its capture
                let _ = handle.await;
            }
        }
        drained
    }
}

/// Drains recorder events, then releases the stream and publishes.
async fn finalize<C: CaptureStream>(
    session: u64,
    mut events: mpsc::UnboundedReceiver<RecorderEvent>,
    mut stream: C,
    published: Published,
) {
    let mut chunks = ChunkSequence::new();
    loop {
        match events.recv().await {
            Some(RecorderEvent::Data(chunk)) => {
                chunks.append(chunk);
            }
            Some(RecorderEvent::Stopped) => break,
            None => {
                tracing::warn!("Recorder went away without reporting a stop");
                break;
            }
        }
    }

    stream.stop_tracks();

    if chunks.is_empty() {
        tracing::warn!("Recording {} produced no data", session);
    }
    let recording = Arc::new(chunks.assemble(Utc::now()));
    tracing::info!(
        "Recording {} finalized: {} ({} bytes in {} chunks)",
        session,
        recording.file_name(),
        recording.size(),
        recording.chunk_count()
    );

    let file_name = recording.file_name().to_string();
    let newest = published.send_if_modified(|current| {
        if current.as_ref().is_some_and(|newer| newer.session > session) {
            return false;
        }
        *current = Some(Finalized { session, recording });
        true
    });
    if !newest {
        tracing::info!(
            "Dropping {} (recording {}): a newer recording is already ready",
            file_name,
            session
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::FakeScreen;

    const WAIT: Duration = Duration::from_secs(1);

    async fn next_recording(rx: &mut watch::Receiver<Option<Finalized>>) -> Arc<Recording> {
        tokio::time::timeout(WAIT, rx.changed())
            .await
            .expect("finalization timed out")
            .unwrap();
        rx.borrow_and_update().as_ref().unwrap().recording.clone()
    }

    #[tokio::test]
    async fn test_start_twice_acquires_once() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());

        assert_eq!(recorder.start().await.unwrap(), Transition::Started);
        assert_eq!(recorder.start().await.unwrap(), Transition::Ignored);
        assert_eq!(screen.acquisitions(), 1);
        recorder.stop();
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let mut recorder = ScreenRecorder::new(FakeScreen::new(), DisplayConstraints::default());
        assert_eq!(recorder.stop(), Transition::Ignored);
        assert!(recorder.latest().is_none());
    }

    #[tokio::test]
    async fn test_requests_cursor_and_audio_processing() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());
        recorder.start().await.unwrap();

        let constraints = screen.last_constraints().unwrap();
        assert!(constraints.show_cursor);
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        assert_eq!(constraints.sample_rate, 44_100);
        recorder.stop();
    }

    #[tokio::test]
    async fn test_chunks_finalize_in_arrival_order() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());
        let mut finalized = recorder.subscribe();

        recorder.start().await.unwrap();
        screen.emit(b"first-");
        screen.emit(b"");
        screen.emit(b"second-");
        screen.emit(b"third");
        assert_eq!(recorder.stop(), Transition::Stopped);
        assert_eq!(recorder.controls(), ToggleControls::for_running(false));

        let recording = next_recording(&mut finalized).await;
        assert_eq!(recording.data(), b"first-second-third");
        assert_eq!(recording.chunk_count(), 3);
        assert!(recording.file_name().starts_with("recording-"));
        assert!(recording.file_name().ends_with(".webm"));
    }

    #[tokio::test]
    async fn test_finalize_releases_capture_tracks() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());

        recorder.start().await.unwrap();
        assert!(screen.is_live());
        screen.emit(&[1, 2, 3]);
        recorder.stop();
        assert!(recorder.wait_finalized(WAIT).await);

        assert!(!screen.is_live());
        assert!(!recorder.is_finalizing());
        assert_eq!(recorder.latest().unwrap().size(), 3);
    }

    #[tokio::test]
    async fn test_denied_capture_stays_idle() {
        let screen = FakeScreen::denied();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());

        let err = recorder.start().await.unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(!recorder.is_recording());
        assert!(!screen.is_live());
        assert_eq!(recorder.controls(), ToggleControls::for_running(false));
    }

    #[tokio::test]
    async fn test_new_recording_replaces_previous() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());

        recorder.start().await.unwrap();
        screen.emit(b"one");
        recorder.stop();
        assert!(recorder.wait_finalized(WAIT).await);

        recorder.start().await.unwrap();
        screen.emit(b"two!");
        recorder.stop();
        assert!(recorder.wait_finalized(WAIT).await);

        assert_eq!(screen.acquisitions(), 2);
        assert_eq!(recorder.latest().unwrap().data(), b"two!");
    }

    #[tokio::test]
    async fn test_older_session_finishing_last_keeps_newest() {
        let screen = FakeScreen::holding_stops();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());
        let mut finalized = recorder.subscribe();

        recorder.start().await.unwrap();
        screen.emit(&[1]);
        recorder.stop();
        recorder.start().await.unwrap();
        screen.emit(&[2]);
        recorder.stop();

        // the second encoder flushes before the first one
        screen.release_stop(1);
        assert_eq!(next_recording(&mut finalized).await.data(), &[2u8]);
        screen.release_stop(0);
        assert!(recorder.wait_finalized(WAIT).await);

        assert!(!finalized.has_changed().unwrap());
        assert_eq!(recorder.latest().unwrap().data(), &[2u8]);
        assert_eq!(recorder.subscribe().borrow().as_ref().unwrap().session, 2);
    }

    #[tokio::test]
    async fn test_wait_gives_up_on_stuck_recorder() {
        let screen = FakeScreen::holding_stops();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());

        recorder.start().await.unwrap();
        screen.emit(b"never flushed");
        recorder.stop();
        assert!(recorder.is_finalizing());

        assert!(!recorder.wait_finalized(Duration::from_millis(50)).await);
        assert!(!recorder.is_finalizing());
        assert!(!screen.is_live());
        assert!(recorder.latest().is_none());
    }

    #[tokio::test]
    async fn test_recorder_ending_on_its_own_returns_to_idle() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());
        let mut finalized = recorder.subscribe();

        recorder.start().await.unwrap();
        screen.emit(b"partial");
        screen.end_capture();

        assert_eq!(next_recording(&mut finalized).await.data(), b"partial");
        tokio::time::timeout(WAIT, async {
            while recorder.is_recording() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("session should end with its recorder");

        assert_eq!(recorder.controls(), ToggleControls::for_running(false));
        assert!(recorder.elapsed().is_none());
        assert!(!screen.is_live());
        assert_eq!(recorder.stop(), Transition::Ignored);

        assert_eq!(recorder.start().await.unwrap(), Transition::Started);
        assert_eq!(screen.acquisitions(), 2);
        recorder.stop();
    }

    #[tokio::test]
    async fn test_reap_ended_session() {
        let screen = FakeScreen::new();
        let mut recorder = ScreenRecorder::new(screen.clone(), DisplayConstraints::default());
        assert!(!recorder.reap_ended());

        recorder.start().await.unwrap();
        assert!(!recorder.reap_ended());
        screen.end_capture();
        tokio::time::timeout(WAIT, async {
            while !recorder.reap_ended() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("ended session should be reaped");

        assert!(!recorder.is_recording());
        assert!(recorder.wait_finalized(WAIT).await);
        assert!(recorder.latest().is_some());
    }
}
