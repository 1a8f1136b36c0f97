//! Configuration file management for micscope.
//!
//! The configuration lives in `~/.config/micscope/micscope.toml` and is
//! created with defaults the first time it is needed.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{DisplayConstraints, ScreenSettings};
use crate::visualization::{AnalyserSettings, Fill, VisualizerSettings};

/// Microphone analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Input device to use. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `micscope list-devices`
    /// - device name from `micscope list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Transform window size in samples (power of two)
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Blend of the previous frame into the current one, 0 to 1
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    /// Level mapped to magnitude 0
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f64,
    /// Level mapped to magnitude 255
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f64,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_fft_size() -> usize {
    2048
}

fn default_smoothing() -> f64 {
    0.85
}

fn default_min_decibels() -> f64 {
    -100.0
}

fn default_max_decibels() -> f64 {
    -30.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

/// Canvas sizes and drawing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Render loop frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Volume bar colour as `#rrggbb`
    #[serde(default = "default_volume_color")]
    pub volume_color: String,
    #[serde(default = "default_volume_width")]
    pub volume_width: usize,
    #[serde(default = "default_volume_height")]
    pub volume_height: usize,
    #[serde(default = "default_spectrum_width")]
    pub spectrum_width: usize,
    #[serde(default = "default_spectrum_height")]
    pub spectrum_height: usize,
}

fn default_frame_rate() -> u32 {
    60
}

fn default_volume_color() -> String {
    "#00ff00".to_string()
}

fn default_volume_width() -> usize {
    512
}

fn default_volume_height() -> usize {
    32
}

fn default_spectrum_width() -> usize {
    512
}

fn default_spectrum_height() -> usize {
    128
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            volume_color: default_volume_color(),
            volume_width: default_volume_width(),
            volume_height: default_volume_height(),
            spectrum_width: default_spectrum_width(),
            spectrum_height: default_spectrum_height(),
        }
    }
}

/// Screen recording configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_true")]
    pub show_cursor: bool,
    #[serde(default = "default_true")]
    pub echo_cancellation: bool,
    #[serde(default = "default_true")]
    pub noise_suppression: bool,
    /// Audio sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Video frames per second
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Capture display (ffmpeg input name). Empty uses the platform default.
    #[serde(default)]
    pub display: String,
    /// Audio input for the recording (ffmpeg input name). Empty uses the platform default.
    #[serde(default)]
    pub audio_input: String,
    /// Where downloads are written. Empty uses ~/Videos, or home.
    #[serde(default)]
    pub output_dir: String,
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_framerate() -> u32 {
    30
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            show_cursor: true,
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: default_sample_rate(),
            framerate: default_framerate(),
            display: String::new(),
            audio_input: String::new(),
            output_dir: String::new(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicscopeConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

impl MicscopeConfig {
    /// Loads the configuration, writing the defaults first if the file is missing.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be read or written
    /// - If the TOML is malformed or fails validation
    pub fn load_or_create() -> anyhow::Result<Self> {
        let path = get_config_path()?;
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path)?;
            tracing::info!("Created default configuration at {}", path.display());
            return Ok(config);
        }
        Self::load_from(&path)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// - If the file cannot be read
    /// - If the TOML is malformed or fails validation
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read {}: {e}", path.display()))?;
        let config = Self::parse(&content)
            .map_err(|e| anyhow!("Invalid configuration in {}: {e}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    /// - If the TOML is malformed or fails validation
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: MicscopeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty TOML.
    ///
    /// # Errors
    /// - If the file cannot be written
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    /// - Describes the first invalid setting
    pub fn validate(&self) -> anyhow::Result<()> {
        let audio = &self.audio;
        if !audio.fft_size.is_power_of_two() || !(32..=32768).contains(&audio.fft_size) {
            return Err(anyhow!(
                "audio.fft_size must be a power of two between 32 and 32768, got {}",
                audio.fft_size
            ));
        }
        if !(0.0..=1.0).contains(&audio.smoothing) {
            return Err(anyhow!(
                "audio.smoothing must be between 0 and 1, got {}",
                audio.smoothing
            ));
        }
        for (name, value) in [
            ("min_decibels", audio.min_decibels),
            ("max_decibels", audio.max_decibels),
        ] {
            // the analyser works in f32
            if !(value as f32).is_finite() {
                return Err(anyhow!("audio.{name} must be a finite number, got {value}"));
            }
        }
        if audio.min_decibels >= audio.max_decibels {
            return Err(anyhow!(
                "audio.min_decibels ({}) must be below audio.max_decibels ({})",
                audio.min_decibels,
                audio.max_decibels
            ));
        }

        let vis = &self.visualization;
        if vis.frame_rate == 0 {
            return Err(anyhow!("visualization.frame_rate must be positive"));
        }
        if Fill::parse_hex(&vis.volume_color).is_none() {
            return Err(anyhow!(
                "visualization.volume_color must look like #rrggbb, got '{}'",
                vis.volume_color
            ));
        }
        if [vis.volume_width, vis.volume_height, vis.spectrum_width, vis.spectrum_height]
            .contains(&0)
        {
            return Err(anyhow!("visualization canvas sizes must be positive"));
        }

        let rec = &self.recording;
        if rec.sample_rate == 0 || rec.framerate == 0 {
            return Err(anyhow!(
                "recording.sample_rate and recording.framerate must be positive"
            ));
        }
        Ok(())
    }

    pub fn analyser_settings(&self) -> AnalyserSettings {
        AnalyserSettings {
            fft_size: self.audio.fft_size,
            smoothing: self.audio.smoothing as f32,
            min_decibels: self.audio.min_decibels as f32,
            max_decibels: self.audio.max_decibels as f32,
        }
    }

    pub fn visualizer_settings(&self) -> VisualizerSettings {
        let frame_rate = self.visualization.frame_rate.max(1);
        VisualizerSettings {
            analyser: self.analyser_settings(),
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(frame_rate)),
            volume_fill: Fill::parse_hex(&self.visualization.volume_color).unwrap_or_default(),
        }
    }

    pub fn display_constraints(&self) -> DisplayConstraints {
        DisplayConstraints {
            show_cursor: self.recording.show_cursor,
            echo_cancellation: self.recording.echo_cancellation,
            noise_suppression: self.recording.noise_suppression,
            sample_rate: self.recording.sample_rate,
        }
    }

    pub fn screen_settings(&self) -> ScreenSettings {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        ScreenSettings {
            display: non_empty(&self.recording.display),
            audio_input: non_empty(&self.recording.audio_input),
            framerate: self.recording.framerate,
        }
    }

    /// Directory downloads are written to.
    ///
    /// # Errors
    /// - If no directory is configured and the home directory is unknown
    pub fn output_dir(&self) -> anyhow::Result<PathBuf> {
        let configured = self.recording.output_dir.trim();
        if !configured.is_empty() {
            return Ok(expand_home(configured));
        }
        dirs::video_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("Could not determine a download directory"))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Path to `micscope.toml`; the directory is created if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("micscope");

    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config directory: {e}"))?;

    Ok(config_dir.join("micscope.toml"))
}
