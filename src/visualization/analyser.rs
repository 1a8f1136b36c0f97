//! Frequency analysis of the live microphone signal.
//!
//! Mirrors the behaviour of a Web Audio analyser node: the most recent
//! `fft_size` samples are Blackman-windowed and transformed, magnitudes are
//! exponentially smoothed against the previous analysis, converted to decibels
//! and mapped linearly from `[min_decibels, max_decibels]` onto `[0, 255]`.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Analysis configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyserSettings {
    /// Transform window in samples; must be a power of two
    pub fft_size: usize,
    /// Weight of the previous frame in `[0, 1]`
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.85,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Stateful analyser with a reusable FFT plan.
pub struct Analyser {
    settings: AnalyserSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    /// Set when samples arrived since the last analysis
    stale: bool,
}

impl Analyser {
    pub fn new(settings: AnalyserSettings) -> Self {
        let n = settings.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(n);

        Self {
            fft,
            window: blackman_window(n),
            samples: VecDeque::from(vec![0.0; n]),
            smoothed: vec![0.0; n / 2],
            bytes: vec![0; n / 2],
            stale: false,
            settings,
        }
    }

    /// Appends mono samples in `[-1, 1]`, keeping only the latest window.
    pub fn push_samples(&mut self, input: &[f32]) {
        if input.is_empty() {
            return;
        }
        let n = self.settings.fft_size;
        let keep = input.len().min(n);
        let overflow = (self.samples.len() + keep).saturating_sub(n);
        self.samples.drain(..overflow);
        self.samples.extend(&input[input.len() - keep..]);
        self.stale = true;
    }

    /// Current per-bin magnitudes in `[0, 255]`.
    ///
    /// The analysis reruns only when new samples arrived, so readers sharing
    /// one analyser within a frame see the same snapshot and smoothing is
    /// applied once per block of input.
    pub fn byte_frequency_data(&mut self) -> &[u8] {
        if self.stale {
            self.analyse();
            self.stale = false;
        }
        &self.bytes
    }

    fn analyse(&mut self) {
        let n = self.settings.fft_size;
        let mut buffer: Vec<Complex<f32>> = self
            .samples
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        let tau = self.settings.smoothing;
        let range = self.settings.max_decibels - self.settings.min_decibels;
        let scale = 255.0 / range;

        for (k, bin) in buffer.iter().take(n / 2).enumerate() {
            let magnitude = bin.norm() / n as f32;
            let mut smoothed = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            if !smoothed.is_finite() {
                smoothed = 0.0;
            }
            self.smoothed[k] = smoothed;

            self.bytes[k] = if smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (scale * (db - self.settings.min_decibels)).floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let tau = 2.0 * std::f32::consts::PI;

    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (tau * x).cos() + a2 * (2.0 * tau * x).cos()
        })
        .collect()
}

/// Shared, closable handle to the analysis context.
///
/// The audio callback feeds it and the render loops read it. Once closed every
/// operation becomes a no-op and reads return `None`, which is how an
/// in-flight frame racing a stop learns that it has nothing left to paint.
#[derive(Clone)]
pub struct AnalyserHandle {
    inner: Arc<Mutex<Option<Analyser>>>,
}

impl AnalyserHandle {
    pub fn new(analyser: Analyser) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(analyser))),
        }
    }

    /// Feeds mono samples; dropped silently once closed.
    pub fn feed(&self, samples: &[f32]) {
        if let Some(analyser) = self.inner.lock().unwrap().as_mut() {
            analyser.push_samples(samples);
        }
    }

    /// Snapshot of the current magnitudes, or `None` once closed.
    pub fn byte_frequency_data(&self) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .as_mut()
            .map(|analyser| analyser.byte_frequency_data().to_vec())
    }

    /// Releases the analysis context.
    pub fn close(&self) {
        if self.inner.lock().unwrap().take().is_some() {
            tracing::debug!("Analysis context closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Quiet enough that neighbouring bins stay below the 255 ceiling
    fn tone(len: usize) -> Vec<f32> {
        // 48 kHz / 2048 = 23.4375 Hz per bin, so 1500 Hz lands on bin 64
        (0..len)
            .map(|i| 0.001 * (2.0 * std::f32::consts::PI * 1500.0 * i as f32 / 48_000.0).sin())
            .collect()
    }

    #[test]
    fn test_default_settings() {
        let settings = AnalyserSettings::default();
        assert_eq!(settings.fft_size, 2048);
        assert_eq!(settings.smoothing, 0.85);

        // one magnitude per bin, half the window
        let mut analyser = Analyser::new(settings);
        assert_eq!(analyser.byte_frequency_data().len(), 1024);
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = Analyser::new(AnalyserSettings::default());
        analyser.push_samples(&vec![0.0; 4096]);
        assert!(analyser.byte_frequency_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let settings = AnalyserSettings {
            smoothing: 0.0,
            ..AnalyserSettings::default()
        };
        let mut analyser = Analyser::new(settings);
        analyser.push_samples(&tone(2048));

        let data = analyser.byte_frequency_data();
        let peak = data
            .iter()
            .enumerate()
            .max_by_key(|&(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);
        assert!(data[64] > data[63]);
        assert!(data[63] > data[62]);
        assert!(data[900] < 10);
    }

    #[test]
    fn test_smoothing_damps_changes() {
        let tone = tone(2048);

        let mut raw = Analyser::new(AnalyserSettings {
            smoothing: 0.0,
            ..AnalyserSettings::default()
        });
        raw.push_samples(&tone);
        let raw_peak = raw.byte_frequency_data()[64];

        let mut smoothed = Analyser::new(AnalyserSettings::default());
        smoothed.push_samples(&tone);
        let first = smoothed.byte_frequency_data()[64];
        assert!(first < raw_peak);

        smoothed.push_samples(&tone);
        let second = smoothed.byte_frequency_data()[64];
        assert!(second > first);
    }

    #[test]
    fn test_snapshot_reused_without_new_samples() {
        let mut analyser = Analyser::new(AnalyserSettings::default());
        analyser.push_samples(&tone(2048));
        let first = analyser.byte_frequency_data().to_vec();
        let second = analyser.byte_frequency_data().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_window_keeps_latest_samples() {
        let mut analyser = Analyser::new(AnalyserSettings {
            fft_size: 32,
            ..AnalyserSettings::default()
        });
        let input: Vec<f32> = (0..40).map(|i| i as f32).collect();
        analyser.push_samples(&input);
        assert_eq!(analyser.samples.len(), 32);
        assert_eq!(analyser.samples.front(), Some(&8.0));
        assert_eq!(analyser.samples.back(), Some(&39.0));

        analyser.push_samples(&[100.0]);
        assert_eq!(analyser.samples.len(), 32);
        assert_eq!(analyser.samples.front(), Some(&9.0));
    }

    #[test]
    fn test_closed_handle_is_inert() {
        let handle = AnalyserHandle::new(Analyser::new(AnalyserSettings::default()));
        assert_eq!(handle.byte_frequency_data().map(|d| d.len()), Some(1024));

        handle.close();
        assert!(handle.is_closed());
        handle.feed(&[0.5; 128]);
        assert!(handle.byte_frequency_data().is_none());

        // closing twice is harmless
        handle.close();
    }
}
