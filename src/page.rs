//! The monitor page: both lifecycles side by side plus the download affordance.
//!
//! The two lifecycles never interact. The page only routes user actions to
//! them, keeps a one-line status, and exposes the last finalized recording.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::capture::{MicrophoneSource, ScreenSource};
use crate::lifecycle::{Controls, Transition};
use crate::recording::{play_file, save_recording, Finalized, Recording, ScreenRecorder};
use crate::visualization::{Surface, Visualizer};

/// How long quitting waits for a stopped recording to finish encoding.
pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Something the user asked the page to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    StartVisualization,
    StopVisualization,
    ToggleVisualization,
    StartRecording,
    StopRecording,
    ToggleRecording,
    /// Save the last recording into the download directory
    Download,
    /// Save (if needed) and open the last recording in a player
    Play,
}

impl fmt::Display for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartVisualization => "start visualization",
            Self::StopVisualization => "stop visualization",
            Self::ToggleVisualization => "toggle visualization",
            Self::StartRecording => "start recording",
            Self::StopRecording => "stop recording",
            Self::ToggleRecording => "toggle recording",
            Self::Download => "download",
            Self::Play => "play",
        };
        f.write_str(name)
    }
}

pub struct Page<M, R, S>
where
    M: MicrophoneSource,
    R: ScreenSource,
{
    visualizer: Visualizer<M, S>,
    recorder: ScreenRecorder<R>,
    finalized: watch::Receiver<Option<Finalized>>,
    download_dir: PathBuf,
    saved: Option<(Arc<Recording>, PathBuf)>,
    status: String,
}

impl<M, R, S> Page<M, R, S>
where
    M: MicrophoneSource,
    R: ScreenSource,
    S: Surface + Send + 'static,
{
    pub fn new(visualizer: Visualizer<M, S>, recorder: ScreenRecorder<R>, download_dir: PathBuf) -> Self {
        let finalized = recorder.subscribe();
        Self {
            visualizer,
            recorder,
            finalized,
            download_dir,
            saved: None,
            status: "Ready".to_string(),
        }
    }

    #[cfg(test)]
    pub fn visualizer(&self) -> &Visualizer<M, S> {
        &self.visualizer
    }

    pub fn recorder(&self) -> &ScreenRecorder<R> {
        &self.recorder
    }

    /// Where the latest recording was saved, if it has been.
    pub fn saved_path(&self) -> Option<&std::path::Path> {
        let latest = self.recorder.latest()?;
        self.saved
            .as_ref()
            .filter(|(saved, _)| Arc::ptr_eq(saved, &latest))
            .map(|(_, path)| path.as_path())
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn controls(&self) -> Controls {
        Controls {
            visualization: self.visualizer.controls(),
            recording: self.recorder.controls(),
            download_enabled: self.recorder.latest().is_some(),
        }
    }

    /// Picks up recordings finalized since the last call and a recorder
    /// that ended on its own.
    pub fn refresh(&mut self) {
        let ended = self.recorder.reap_ended();
        if !self.finalized.has_changed().unwrap_or(false) {
            return;
        }
        let latest = self.finalized.borrow_and_update().clone();
        if let Some(Finalized { recording, .. }) = latest {
            self.status = format!(
                "{}: {} ({}, {})",
                if ended { "Recording ended early" } else { "Recording ready" },
                recording.file_name(),
                format_size(recording.size()),
                recording.mime_type()
            );
        }
    }

    /// Applies one user action and updates the status line.
    pub async fn dispatch(&mut self, action: PageAction) {
        tracing::debug!("Page action: {}", action);
        match action {
            PageAction::StartVisualization => self.start_visualization().await,
            PageAction::StopVisualization => self.stop_visualization(),
            PageAction::ToggleVisualization => {
                if self.visualizer.is_active() {
                    self.stop_visualization();
                } else {
                    self.start_visualization().await;
                }
            }
            PageAction::StartRecording => self.start_recording().await,
            PageAction::StopRecording => self.stop_recording(),
            PageAction::ToggleRecording => {
                if self.recorder.is_recording() {
                    self.stop_recording();
                } else {
                    self.start_recording().await;
                }
            }
            PageAction::Download => {
                if let Err(e) = self.download() {
                    tracing::error!("Download failed: {e}");
                    self.status = format!("Download failed: {e}");
                }
            }
            PageAction::Play => {
                let played = self.download().and_then(|path| {
                    play_file(&path)?;
                    Ok(path)
                });
                match played {
                    Ok(path) => self.status = format!("Playing {}", path.display()),
                    Err(e) => {
                        tracing::error!("Playback failed: {e}");
                        self.status = format!("Playback failed: {e}");
                    }
                }
            }
        }
    }

    async fn start_visualization(&mut self) {
        match self.visualizer.start().await {
            Ok(Transition::Started) => self.status = "Visualizing microphone".to_string(),
            Ok(_) => {}
            Err(e) => self.status = format!("Microphone unavailable: {e}"),
        }
    }

    fn stop_visualization(&mut self) {
        if self.visualizer.stop() == Transition::Stopped {
            self.status = "Visualization stopped".to_string();
        }
    }

    async fn start_recording(&mut self) {
        match self.recorder.start().await {
            Ok(Transition::Started) => self.status = "Recording screen".to_string(),
            Ok(_) => {}
            Err(e) => self.status = format!("Screen capture unavailable: {e}"),
        }
    }

    fn stop_recording(&mut self) {
        if self.recorder.stop() == Transition::Stopped {
            self.status = "Finalizing recording...".to_string();
        }
    }

    /// Saves the latest recording once and returns where it lives.
    fn download(&mut self) -> anyhow::Result<PathBuf> {
        let recording = self
            .recorder
            .latest()
            .ok_or_else(|| anyhow::anyhow!("No finished recording yet"))?;

        if let Some((saved, path)) = &self.saved {
            if Arc::ptr_eq(saved, &recording) && path.exists() {
                return Ok(path.clone());
            }
        }

        let path = save_recording(&recording, &self.download_dir)?;
        self.status = format!("Saved {}", path.display());
        self.saved = Some((recording, path.clone()));
        Ok(path)
    }

    /// Stops both lifecycles and waits up to `limit` for a pending recording
    /// to finalize. Returns `false` if one had to be abandoned.
    pub async fn shutdown(&mut self, limit: Duration) -> bool {
        self.visualizer.stop();
        self.recorder.stop();
        if self.recorder.is_finalizing() {
            tracing::info!("Waiting for recording to finalize before exit");
        }
        let finalized = self.recorder.wait_finalized(limit).await;
        if !finalized {
            self.status = "Recording abandoned: encoder did not finish".to_string();
        }
        self.refresh();
        finalized
    }
}

fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < KIB * KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{:.1} MiB", bytes / (KIB * KIB))
    }
}
