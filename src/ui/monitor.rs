//! Terminal page showing the volume bar, the spectrum and the page controls.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::Paragraph,
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::canvas_widget::CanvasView;
use crate::lifecycle::Controls;
use crate::page::PageAction;
use crate::visualization::PixelCanvas;

const FOOTER_FG: Color = Color::Rgb(185, 207, 212);
const DISABLED_FG: Color = Color::Rgb(80, 88, 90);

/// What the page loop should do after polling input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    /// Nothing to do (no key or a disabled affordance)
    Continue,
    Quit,
    Action(PageAction),
}

/// Snapshot of the page for one redraw.
pub struct MonitorView<'a> {
    pub volume: &'a PixelCanvas,
    pub spectrum: &'a PixelCanvas,
    pub controls: Controls,
    pub status: &'a str,
    pub recording_elapsed: Option<Duration>,
}

/// Terminal UI for the monitor page.
pub struct MonitorTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl MonitorTui {
    /// Creates the TUI and enters alternate screen mode.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }

    /// Redraws the whole page.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, view: &MonitorView<'_>) -> anyhow::Result<()> {
        self.terminal.draw(|frame| {
            let area = frame.area();
            let [volume_area, spectrum_area, footer_area] = Layout::vertical([
                Constraint::Length(area.height / 6),
                Constraint::Min(1),
                Constraint::Length(2),
            ])
            .areas(area);

            frame.render_widget(CanvasView::new(view.volume), volume_area);
            frame.render_widget(CanvasView::new(view.spectrum), spectrum_area);

            let footer = Paragraph::new(vec![controls_line(&view.controls), status_line(view)])
                .style(Style::default().fg(FOOTER_FG).bg(Color::Rgb(0, 0, 0)));
            frame.render_widget(footer, footer_area);
        })?;
        Ok(())
    }

    /// Polls for a key press and maps it against the current controls.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, controls: &Controls) -> anyhow::Result<MonitorCommand> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(command_for_key(key, controls));
                }
            }
        }
        Ok(MonitorCommand::Continue)
    }

    /// Leaves the alternate screen and restores the terminal.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Maps a key to a page command. Keys for disabled affordances do nothing.
pub fn command_for_key(key: KeyEvent, controls: &Controls) -> MonitorCommand {
    let enabled = |on: bool, action: PageAction| {
        if on {
            MonitorCommand::Action(action)
        } else {
            tracing::debug!("Ignoring {} while disabled", action);
            MonitorCommand::Continue
        }
    };

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            MonitorCommand::Quit
        }
        KeyCode::Char('q') | KeyCode::Esc => MonitorCommand::Quit,
        KeyCode::Char('v') => enabled(
            controls.visualization.start_enabled,
            PageAction::StartVisualization,
        ),
        KeyCode::Char('V') | KeyCode::Char('x') => enabled(
            controls.visualization.stop_enabled,
            PageAction::StopVisualization,
        ),
        KeyCode::Char('r') => enabled(controls.recording.start_enabled, PageAction::StartRecording),
        KeyCode::Char('R') | KeyCode::Char('s') => {
            enabled(controls.recording.stop_enabled, PageAction::StopRecording)
        }
        KeyCode::Char('d') => enabled(controls.download_enabled, PageAction::Download),
        KeyCode::Char('p') => enabled(controls.download_enabled, PageAction::Play),
        _ => MonitorCommand::Continue,
    }
}

fn affordance(key: &str, label: &str, enabled: bool) -> [Span<'static>; 2] {
    let key_style = if enabled {
        Style::default().fg(Color::Rgb(255, 255, 255)).bold()
    } else {
        Style::default().fg(DISABLED_FG)
    };
    let label_style = if enabled {
        Style::default().fg(FOOTER_FG)
    } else {
        Style::default().fg(DISABLED_FG)
    };
    [
        Span::styled(format!(" {key} "), key_style),
        Span::styled(format!("{label}  "), label_style),
    ]
}

fn controls_line(controls: &Controls) -> Line<'static> {
    let mut spans = Vec::new();
    spans.extend(affordance("v", "visualize", controls.visualization.start_enabled));
    spans.extend(affordance("x", "stop", controls.visualization.stop_enabled));
    spans.extend(affordance("r", "record", controls.recording.start_enabled));
    spans.extend(affordance("s", "stop", controls.recording.stop_enabled));
    spans.extend(affordance("d", "download", controls.download_enabled));
    spans.extend(affordance("p", "play", controls.download_enabled));
    spans.extend(affordance("q", "quit", true));
    Line::from(spans)
}

fn status_line<'a>(view: &MonitorView<'a>) -> Line<'a> {
    let mut spans = Vec::new();
    if let Some(elapsed) = view.recording_elapsed {
        let secs = elapsed.as_secs();
        spans.push(Span::styled("● ", Style::default().fg(Color::Red)));
        spans.push(Span::raw(format!("{}:{:02}  ", secs / 60, secs % 60)));
    }
    spans.push(Span::raw(view.status));
    Line::from(spans)
}
