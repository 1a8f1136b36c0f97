//! Microphone capture through cpal.
//!
//! Opens the configured input device at its native configuration, downmixes
//! every callback buffer to mono floats and feeds them into the analyser.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use super::{CaptureError, LiveInput, MicrophoneSource};
use crate::visualization::AnalyserHandle;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Microphone backed by a cpal input device.
///
/// `device` is "default", a numeric index from `micscope list-devices`, or an
/// exact device name.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    device: String,
}

impl CpalMicrophone {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn open(&self, sink: AnalyserHandle) -> Result<CpalInput, CaptureError> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device)
            }
        })
        .map_err(|e| CaptureError::NoDevice(e.to_string()))?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Unavailable(format!("{device_name}: {e}")))?;
        let channels = usize::from(supported.channels()).max(1);
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        tracing::info!(
            "Microphone: {} ({}Hz, {} channels, {:?})",
            device_name,
            config.sample_rate.0,
            channels,
            sample_format
        );

        let on_error = |err: cpal::StreamError| tracing::error!("Microphone stream error: {}", err);
        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    feed_mono(&sink, data, channels, |s| s)
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    feed_mono(&sink, data, channels, |s| f32::from(s) / 32768.0)
                },
                on_error,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    feed_mono(&sink, data, channels, |s| (f32::from(s) - 32768.0) / 32768.0)
                },
                on_error,
                None,
            ),
            other => {
                return Err(CaptureError::Unsupported(format!(
                    "{device_name} delivers {other:?} samples"
                )))
            }
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::NoDevice(format!("{device_name} is no longer available"))
            }
            other => CaptureError::Stream(other.to_string()),
        })?;

        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        tracing::debug!("Microphone stream started");
        Ok(CpalInput {
            stream: Some(stream),
        })
    }
}

impl MicrophoneSource for CpalMicrophone {
    type Input = CpalInput;

    async fn acquire(&self, sink: AnalyserHandle) -> Result<CpalInput, CaptureError> {
        self.open(sink)
    }
}

/// A running cpal input stream.
pub struct CpalInput {
    stream: Option<cpal::Stream>,
}

impl LiveInput for CpalInput {
    fn stop_tracks(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("Pausing microphone stream failed: {}", e);
            }
            tracing::debug!("Microphone stream stopped");
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Averages interleaved frames down to mono and feeds the analyser.
fn feed_mono<T: Copy>(sink: &AnalyserHandle, data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) {
    let mono: Vec<f32> = if channels == 1 {
        data.iter().map(|&s| to_f32(s)).collect()
    } else {
        data.chunks_exact(channels)
            .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() / channels as f32)
            .collect()
    };
    sink.feed(&mono);
}

/// Finds an audio input device by numeric index or exact name.
///
/// # Errors
/// - If no device with the specified name/index is found
pub(crate) fn find_device_by_name(
    host: &cpal::Host,
    device_spec: &str,
) -> anyhow::Result<cpal::Device> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                count.saturating_sub(1)
            )
        });
    }

    devices
        .into_iter()
        .find(|d| d.name().map(|n| n == device_spec).unwrap_or(false))
        .ok_or_else(|| {
            anyhow!(
                "Audio input device '{device_spec}' not found. Use 'micscope list-devices' to see available devices."
            )
        })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// No ALSA outside Linux, nothing to suppress.
#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    f()
}
