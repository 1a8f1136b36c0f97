//! Self-rescheduling per-frame render loops.
//!
//! Each loop is a task bound to one capture session. It reads the current
//! analysis snapshot, paints one frame and waits for the next display refresh,
//! forever, until the session's cancellation signal fires or it finds the
//! analysis context closed underneath it.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::analyser::AnalyserHandle;
use super::canvas::{lock_surface, Fill, SharedSurface, Surface};
use super::frames::{paint_spectrum, paint_volume};

/// Which picture a loop paints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visualization {
    /// Average level as a single bar in the given colour
    Volume(Fill),
    /// One hue-coded bar per frequency bin
    Spectrum,
}

impl fmt::Display for Visualization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume(_) => write!(f, "volume"),
            Self::Spectrum => write!(f, "spectrum"),
        }
    }
}

/// Paints a single frame from the current snapshot.
///
/// Returns `false` without touching the surface when the analysis context has
/// been closed, including when it closes while this frame waits for the
/// surface lock.
pub fn render_frame<S: Surface>(
    visualization: Visualization,
    analyser: &AnalyserHandle,
    surface: &SharedSurface<S>,
) -> bool {
    let Some(magnitudes) = analyser.byte_frequency_data() else {
        return false;
    };

    let mut surface = lock_surface(surface);
    // stop closes the analyser before clearing, so this check under the
    // surface lock keeps a stale frame from landing on a cleared canvas
    if analyser.is_closed() {
        return false;
    }
    match visualization {
        Visualization::Volume(fill) => {
            paint_volume(&mut *surface, &magnitudes, fill);
        }
        Visualization::Spectrum => paint_spectrum(&mut *surface, &magnitudes),
    }
    true
}

/// Spawns a render loop ticking every `frame_interval`.
pub fn spawn_render_loop<S>(
    visualization: Visualization,
    analyser: AnalyserHandle,
    surface: SharedSurface<S>,
    frame_interval: Duration,
    mut cancelled: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: Surface + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancelled.changed() => break,
                _ = ticker.tick() => {}
            }
            if *cancelled.borrow() {
                break;
            }
            if !render_frame(visualization, &analyser, &surface) {
                tracing::debug!("{visualization} loop found the analysis context closed");
                break;
            }
            frames += 1;
        }

        tracing::debug!("{visualization} loop ended after {frames} frames");
    })
}
