//! Single-frame painters for the volume bar and the frequency spectrum.

use super::canvas::{Fill, Surface};

/// Mean of all bin magnitudes, in `[0, 255]`.
pub fn volume_level(magnitudes: &[u8]) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let sum: u64 = magnitudes.iter().map(|&m| u64::from(m)).sum();
    sum as f64 / magnitudes.len() as f64
}

/// Paints the volume bar and returns the level it shows.
///
/// The bar starts at the left edge, spans the full height and is twice the
/// level wide.
pub fn paint_volume<S: Surface + ?Sized>(surface: &mut S, magnitudes: &[u8], fill: Fill) -> f64 {
    let level = volume_level(magnitudes);
    let (_, height) = surface.size();

    surface.clear();
    surface.set_fill(fill);
    surface.fill_rect(0.0, 0.0, level * 2.0, height);
    level
}

/// Geometry and colour of one spectrum bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub hue: f64,
}

impl Bar {
    pub fn fill(&self) -> Fill {
        Fill::Hsl {
            hue: self.hue,
            saturation: 1.0,
            lightness: 0.5,
        }
    }
}

/// Bars for every bin, left to right in increasing frequency.
pub fn spectrum_bars(magnitudes: &[u8], width: f64, height: f64) -> impl Iterator<Item = Bar> + '_ {
    let bins = magnitudes.len() as f64;
    let bar_width = width / bins;

    magnitudes.iter().enumerate().map(move |(i, &magnitude)| {
        let bar_height = height * f64::from(magnitude) / 255.0;
        Bar {
            x: i as f64 * bar_width,
            y: height - bar_height,
            width: bar_width,
            height: bar_height,
            hue: i as f64 / bins * 360.0,
        }
    })
}

/// Paints one spectrum frame.
pub fn paint_spectrum<S: Surface + ?Sized>(surface: &mut S, magnitudes: &[u8]) {
    let (width, height) = surface.size();
    surface.clear();
    for bar in spectrum_bars(magnitudes, width, height) {
        surface.set_fill(bar.fill());
        surface.fill_rect(bar.x, bar.y, bar.width, bar.height);
    }
}
