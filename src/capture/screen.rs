//! Screen and audio capture through an ffmpeg child process.
//!
//! Acquiring a stream launches ffmpeg grabbing the display and the default
//! audio input, encoding VP8 and Vorbis into a WebM container written to
//! stdout. The recorder reads stdout in chunks. Stopping writes `q` to
//! ffmpeg's stdin so it finalizes the container before exiting, which closes
//! stdout and ends the chunk stream.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;

use super::ffmpeg::find_ffmpeg;
use super::{
    CaptureError, CaptureStream, DisplayConstraints, MediaRecorder, RecorderEvent, ScreenSource,
    WEBM_MIME,
};

/// Largest chunk handed to the recorder in one event.
const CHUNK_SIZE: usize = 64 * 1024;

/// How long a freshly launched ffmpeg must survive to count as acquired.
const STARTUP_GRACE: Duration = Duration::from_millis(600);

/// Where and how fast to capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSettings {
    /// Display to grab; platform default when `None`
    pub display: Option<String>,
    /// Audio input to grab; platform default when `None`
    pub audio_input: Option<String>,
    pub framerate: u32,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            display: None,
            audio_input: None,
            framerate: 30,
        }
    }
}

/// Screen source that spawns ffmpeg per acquisition.
#[derive(Debug, Clone)]
pub struct FfmpegScreenSource {
    settings: ScreenSettings,
    ffmpeg: Option<PathBuf>,
}

impl FfmpegScreenSource {
    pub fn new(settings: ScreenSettings) -> Self {
        Self {
            settings,
            ffmpeg: None,
        }
    }

    /// Uses a specific ffmpeg binary instead of searching for one.
    pub fn with_ffmpeg(mut self, path: PathBuf) -> Self {
        self.ffmpeg = Some(path);
        self
    }

    async fn launch(&self, constraints: &DisplayConstraints) -> Result<FfmpegCapture, CaptureError> {
        let ffmpeg = match &self.ffmpeg {
            Some(path) => path.clone(),
            None => find_ffmpeg().map_err(|e| CaptureError::Unavailable(e.to_string()))?,
        };
        let args = capture_args(&self.settings, constraints);
        tracing::debug!("Launching {} {}", ffmpeg.display(), args.join(" "));

        if constraints.echo_cancellation {
            tracing::debug!("Echo cancellation is left to the audio server's input source");
        }

        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::Unavailable(format!("failed to launch {}: {e}", ffmpeg.display()))
            })?;

        // waiting closes a still-attached stdin, and stdin is how we stop ffmpeg
        let stdin = child.stdin.take();

        // a refused or missing capture device makes ffmpeg exit right away
        match tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(classify_failure(status, &stderr));
            }
            Ok(Err(e)) => return Err(CaptureError::Stream(e.to_string())),
            Err(_) => {}
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "ffmpeg", "{}", line);
                }
            });
        }

        tracing::info!("Screen capture acquired (pid {:?})", child.id());
        Ok(FfmpegCapture {
            stdin,
            stdout: child.stdout.take(),
            child,
        })
    }
}

impl ScreenSource for FfmpegScreenSource {
    type Stream = FfmpegCapture;

    async fn acquire(&self, constraints: &DisplayConstraints) -> Result<FfmpegCapture, CaptureError> {
        self.launch(constraints).await
    }
}

/// Builds the ffmpeg command line for the current platform.
pub fn capture_args(settings: &ScreenSettings, constraints: &DisplayConstraints) -> Vec<String> {
    let framerate = settings.framerate.max(1).to_string();
    let sample_rate = constraints.sample_rate.to_string();
    let cursor = if constraints.show_cursor { "1" } else { "0" };

    let mut args: Vec<String> = Vec::new();
    push(&mut args, &["-hide_banner", "-loglevel", "warning"]);

    if cfg!(target_os = "macos") {
        let input = format!(
            "{}:{}",
            settings.display.as_deref().unwrap_or("1"),
            settings.audio_input.as_deref().unwrap_or("0")
        );
        push(&mut args, &["-f", "avfoundation", "-capture_cursor", cursor]);
        push(&mut args, &["-framerate", framerate.as_str(), "-i", input.as_str()]);
    } else if cfg!(target_os = "windows") {
        let display = settings.display.as_deref().unwrap_or("desktop");
        let audio = format!(
            "audio={}",
            settings.audio_input.as_deref().unwrap_or("virtual-audio-capturer")
        );
        push(&mut args, &["-f", "gdigrab", "-draw_mouse", cursor]);
        push(&mut args, &["-framerate", framerate.as_str(), "-i", display]);
        push(&mut args, &["-f", "dshow", "-i", audio.as_str()]);
    } else {
        let display = settings
            .display
            .clone()
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_else(|| ":0".to_string());
        let audio = settings.audio_input.as_deref().unwrap_or("default");
        push(&mut args, &["-f", "x11grab", "-draw_mouse", cursor]);
        push(&mut args, &["-framerate", framerate.as_str(), "-i", display.as_str()]);
        push(&mut args, &["-f", "pulse", "-i", audio]);
    }

    if constraints.noise_suppression {
        push(&mut args, &["-af", "afftdn"]);
    }

    push(&mut args, &["-c:v", "libvpx", "-deadline", "realtime", "-cpu-used", "8", "-b:v", "2M"]);
    push(&mut args, &["-c:a", "libvorbis", "-ar", sample_rate.as_str()]);
    push(&mut args, &["-f", "webm", "-cluster_time_limit", "1000", "pipe:1"]);
    args
}

fn push(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn classify_failure(status: ExitStatus, stderr: &str) -> CaptureError {
    let detail = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no diagnostic output")
        .trim()
        .to_string();
    let lower = stderr.to_lowercase();

    if lower.contains("permission denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied(detail)
    } else if lower.contains("cannot open display")
        || lower.contains("no such device")
        || lower.contains("no such file or directory")
        || lower.contains("connection refused")
    {
        CaptureError::NoDevice(detail)
    } else {
        CaptureError::Unavailable(format!("ffmpeg exited with {status}: {detail}"))
    }
}

/// A running ffmpeg capture.
pub struct FfmpegCapture {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl CaptureStream for FfmpegCapture {
    type Recorder = FfmpegRecorder;

    fn recorder(&mut self, mime_type: &str) -> Result<FfmpegRecorder, CaptureError> {
        if mime_type != WEBM_MIME {
            return Err(CaptureError::Unsupported(format!(
                "ffmpeg capture only produces {WEBM_MIME}, not {mime_type}"
            )));
        }
        let stdout = self
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Stream("capture already has a recorder".to_string()))?;
        Ok(FfmpegRecorder {
            stdout: Some(stdout),
            stdin: self.stdin.take(),
        })
    }

    fn stop_tracks(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => tracing::debug!("ffmpeg already exited: {}", status),
            _ => {
                if let Err(e) = self.child.start_kill() {
                    tracing::warn!("Failed to stop ffmpeg capture: {}", e);
                } else {
                    tracing::debug!("ffmpeg capture killed");
                }
            }
        }
    }
}

/// Reads encoded WebM from ffmpeg's stdout.
pub struct FfmpegRecorder {
    stdout: Option<ChildStdout>,
    stdin: Option<ChildStdin>,
}

impl MediaRecorder for FfmpegRecorder {
    fn start(&mut self, events: mpsc::UnboundedSender<RecorderEvent>) -> Result<(), CaptureError> {
        let mut stdout = self
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Stream("recorder already started".to_string()))?;

        tokio::spawn(async move {
            let mut buffer = vec![0u8; CHUNK_SIZE];
            loop {
                match stdout.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if events.send(RecorderEvent::Data(buffer[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Reading ffmpeg output failed: {}", e);
                        break;
                    }
                }
            }
            let _ = events.send(RecorderEvent::Stopped);
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut stdin) = self.stdin.take() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(b"q").await {
                tracing::debug!("ffmpeg stdin closed before stop: {}", e);
            }
            let _ = stdin.shutdown().await;
        });
    }
}
