//! The interactive monitor page: live meters plus screen recording.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::{find_ffmpeg, CpalMicrophone, FfmpegScreenSource, MicrophoneSource, ScreenSource};
use crate::config::MicscopeConfig;
use crate::page::{Page, PageAction, FINALIZE_TIMEOUT};
use crate::recording::ScreenRecorder;
use crate::ui::{ErrorScreen, MonitorCommand, MonitorTui, MonitorView};
use crate::visualization::{lock_surface, PixelCanvas, SharedSurface, Visualizer};

/// Flags raised by external signals, consumed once per page tick.
#[derive(Default)]
struct SignalToggles {
    recording: Arc<AtomicBool>,
    visualization: Arc<AtomicBool>,
}

impl SignalToggles {
    /// `SIGUSR1` toggles recording and `SIGUSR2` toggles visualization.
    #[cfg(unix)]
    fn register() -> anyhow::Result<Self> {
        let toggles = Self::default();
        signal_hook::flag::register(signal_hook::consts::SIGUSR1, toggles.recording.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGUSR2, toggles.visualization.clone())?;
        tracing::debug!("SIGUSR1/SIGUSR2 toggles registered");
        Ok(toggles)
    }

    #[cfg(not(unix))]
    fn register() -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    fn take_actions(&self) -> Vec<PageAction> {
        let mut actions = Vec::new();
        if self.visualization.swap(false, Ordering::SeqCst) {
            actions.push(PageAction::ToggleVisualization);
        }
        if self.recording.swap(false, Ordering::SeqCst) {
            actions.push(PageAction::ToggleRecording);
        }
        actions
    }
}

/// Runs the monitor page until the user quits.
///
/// # Errors
/// - If the configuration cannot be loaded (shown on an error screen first)
/// - If the terminal cannot be driven
pub async fn handle_monitor() -> anyhow::Result<()> {
    tracing::info!("=== micscope monitor ===");

    let config = match MicscopeConfig::load_or_create() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            let mut screen = ErrorScreen::new()?;
            screen.show_error("Configuration error", &e.to_string())?;
            screen.cleanup()?;
            return Err(e);
        }
    };

    let vis = &config.visualization;
    let volume = PixelCanvas::shared(vis.volume_width, vis.volume_height);
    let spectrum = PixelCanvas::shared(vis.spectrum_width, vis.spectrum_height);

    let visualizer = Visualizer::new(
        CpalMicrophone::new(config.audio.device.clone()),
        config.visualizer_settings(),
        volume.clone(),
        spectrum.clone(),
    );

    let mut screen_source = FfmpegScreenSource::new(config.screen_settings());
    match find_ffmpeg() {
        Ok(path) => {
            tracing::info!("Using ffmpeg at {}", path.display());
            screen_source = screen_source.with_ffmpeg(path);
        }
        Err(e) => tracing::warn!("Screen recording unavailable until ffmpeg is installed: {e}"),
    }
    let recorder = ScreenRecorder::new(screen_source, config.display_constraints());

    let mut page = Page::new(visualizer, recorder, config.output_dir()?);
    let signals = SignalToggles::register()?;

    let mut tui = MonitorTui::new()?;
    let result = run_page(&mut tui, &mut page, &volume, &spectrum, &signals).await;

    // give the terminal back before waiting on the encoder
    let cleanup = tui.cleanup();
    if page.recorder().is_recording() || page.recorder().is_finalizing() {
        eprintln!("Finishing recording...");
    }
    if !page.shutdown(FINALIZE_TIMEOUT).await {
        eprintln!(
            "Recording did not finish within {}s and was discarded",
            FINALIZE_TIMEOUT.as_secs()
        );
    }
    cleanup?;

    match (page.recorder().latest(), page.saved_path()) {
        (Some(_), Some(path)) => eprintln!("Last recording saved to {}", path.display()),
        (Some(recording), None) => {
            tracing::info!("Discarding unsaved recording {}", recording.file_name());
            eprintln!(
                "Discarded unsaved recording {} (press 'd' before quitting to keep it)",
                recording.file_name()
            );
        }
        _ => {}
    }
    tracing::info!("Monitor closed");
    result
}

async fn run_page<M, R>(
    tui: &mut MonitorTui,
    page: &mut Page<M, R, PixelCanvas>,
    volume: &SharedSurface<PixelCanvas>,
    spectrum: &SharedSurface<PixelCanvas>,
    signals: &SignalToggles,
) -> anyhow::Result<()>
where
    M: MicrophoneSource,
    R: ScreenSource,
{
    loop {
        page.refresh();
        for action in signals.take_actions() {
            tracing::info!("Signal requested {}", action);
            page.dispatch(action).await;
        }

        // snapshot so render loops are not blocked while the terminal draws
        let volume_frame = snapshot(volume);
        let spectrum_frame = snapshot(spectrum);
        tui.render(&MonitorView {
            volume: &volume_frame,
            spectrum: &spectrum_frame,
            controls: page.controls(),
            status: page.status(),
            recording_elapsed: page.recorder().elapsed(),
        })?;

        match tui.handle_input(&page.controls())? {
            MonitorCommand::Continue => {}
            MonitorCommand::Quit => return Ok(()),
            MonitorCommand::Action(action) => page.dispatch(action).await,
        }
        tokio::task::yield_now().await;
    }
}

fn snapshot(surface: &SharedSurface<PixelCanvas>) -> PixelCanvas {
    lock_surface(surface).clone()
}
