//! Visualization lifecycle: `Idle -> Active -> Idle`.
//!
//! `start` acquires the microphone into a fresh analyser and launches the
//! volume and spectrum render loops. `stop` tears the whole capture session
//! down again: tracks halted, analysis closed, loops cancelled, canvases
//! cleared.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::analyser::{Analyser, AnalyserHandle, AnalyserSettings};
use super::canvas::{lock_surface, Fill, SharedSurface, Surface};
use super::render_loop::{spawn_render_loop, Visualization};
use crate::capture::{CaptureError, LiveInput, MicrophoneSource};
use crate::lifecycle::{ToggleControls, Transition};

/// Tunables for a visualization session.
#[derive(Debug, Clone)]
pub struct VisualizerSettings {
    pub analyser: AnalyserSettings,
    pub frame_interval: Duration,
    pub volume_fill: Fill,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            analyser: AnalyserSettings::default(),
            frame_interval: Duration::from_micros(16_667),
            volume_fill: Fill::Rgb(0, 255, 0),
        }
    }
}

/// Everything owned by an active visualization.
struct CaptureSession<I> {
    input: I,
    analyser: AnalyserHandle,
    cancel: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

enum VisualizerState<I> {
    Idle,
    Active(CaptureSession<I>),
}

/// Microphone visualization state machine.
pub struct Visualizer<M: MicrophoneSource, S> {
    source: M,
    settings: VisualizerSettings,
    volume_surface: SharedSurface<S>,
    spectrum_surface: SharedSurface<S>,
    state: VisualizerState<M::Input>,
}

impl<M, S> Visualizer<M, S>
where
    M: MicrophoneSource,
    S: Surface + Send + 'static,
{
    pub fn new(
        source: M,
        settings: VisualizerSettings,
        volume_surface: SharedSurface<S>,
        spectrum_surface: SharedSurface<S>,
    ) -> Self {
        Self {
            source,
            settings,
            volume_surface,
            spectrum_surface,
            state: VisualizerState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VisualizerState::Active(_))
    }

    pub fn controls(&self) -> ToggleControls {
        ToggleControls::for_running(self.is_active())
    }

    /// Handle to the live analysis context, if any.
    #[cfg(test)]
    pub fn analyser(&self) -> Option<&AnalyserHandle> {
        match &self.state {
            VisualizerState::Active(session) => Some(&session.analyser),
            VisualizerState::Idle => None,
        }
    }

    #[cfg(test)]
    pub fn volume_surface(&self) -> &SharedSurface<S> {
        &self.volume_surface
    }

    #[cfg(test)]
    pub fn spectrum_surface(&self) -> &SharedSurface<S> {
        &self.spectrum_surface
    }

    /// Starts visualizing.
    ///
    /// Ignored while already active. On acquisition failure the error is
    /// logged and returned and the lifecycle stays `Idle` with nothing held.
    pub async fn start(&mut self) -> Result<Transition, CaptureError> {
        if self.is_active() {
            tracing::debug!("Visualization already active; start ignored");
            return Ok(Transition::Ignored);
        }

        let analyser = AnalyserHandle::new(Analyser::new(self.settings.analyser.clone()));
        let input = match self.source.acquire(analyser.clone()).await {
            Ok(input) => input,
            Err(e) => {
                analyser.close();
                tracing::error!("Microphone acquisition failed: {e}");
                return Err(e);
            }
        };

        let (cancel, cancelled) = watch::channel(false);
        let interval = self.settings.frame_interval;
        let loops = vec![
            spawn_render_loop(
                Visualization::Volume(self.settings.volume_fill),
                analyser.clone(),
                self.volume_surface.clone(),
                interval,
                cancelled.clone(),
            ),
            spawn_render_loop(
                Visualization::Spectrum,
                analyser.clone(),
                self.spectrum_surface.clone(),
                interval,
                cancelled,
            ),
        ];

        tracing::info!(
            "Visualization started: fft_size={}, smoothing={}, frame interval {:?}",
            self.settings.analyser.fft_size,
            self.settings.analyser.smoothing,
            interval
        );

        self.state = VisualizerState::Active(CaptureSession {
            input,
            analyser,
            cancel,
            loops,
        });
        Ok(Transition::Started)
    }

    /// Stops visualizing. Ignored while idle.
    pub fn stop(&mut self) -> Transition {
        let VisualizerState::Active(mut session) =
            std::mem::replace(&mut self.state, VisualizerState::Idle)
        else {
            tracing::debug!("Visualization not active; stop ignored");
            return Transition::Ignored;
        };

        session.input.stop_tracks();
        session.analyser.close();
        // the loops may already be gone, in which case nobody is listening
        let _ = session.cancel.send(true);
        for handle in session.loops {
            handle.abort();
        }

        lock_surface(&self.volume_surface).clear();
        lock_surface(&self.spectrum_surface).clear();

        tracing::info!("Visualization stopped");
        Transition::Stopped
    }
}
