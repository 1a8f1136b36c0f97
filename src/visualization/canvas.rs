//! 2D raster drawing surfaces.
//!
//! Render loops paint through the [`Surface`] trait using canvas-style
//! fractional coordinates. [`PixelCanvas`] is the in-memory raster the
//! terminal page displays.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An RGB triple.
pub type Rgb = (u8, u8, u8);

/// Fill colour for subsequent rectangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Rgb(u8, u8, u8),
    /// Hue in degrees, saturation and lightness in `[0, 1]`
    Hsl {
        hue: f64,
        saturation: f64,
        lightness: f64,
    },
}

impl Fill {
    /// Parses `#rrggbb`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_rgb(self) -> Rgb {
        match self {
            Self::Rgb(r, g, b) => (r, g, b),
            Self::Hsl {
                hue,
                saturation,
                lightness,
            } => hsl_to_rgb(hue, saturation, lightness),
        }
    }
}

impl Default for Fill {
    fn default() -> Self {
        Self::Rgb(0, 0, 0)
    }
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Rgb {
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);
    let h = hue.rem_euclid(360.0) / 60.0;

    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = l - chroma / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}

/// A drawing surface with canvas semantics.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> (f64, f64);

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64);

    fn set_fill(&mut self, fill: Fill);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);

    /// Clears the whole surface.
    fn clear(&mut self) {
        let (width, height) = self.size();
        self.clear_rect(0.0, 0.0, width, height);
    }
}

/// A surface shared between a render loop and whoever displays it.
pub type SharedSurface<S> = Arc<Mutex<S>>;

/// Locks a shared surface, taking it over if a painter panicked while holding it.
///
/// A half-painted frame is harmless; the next frame or a clear overwrites it.
pub fn lock_surface<S>(surface: &SharedSurface<S>) -> MutexGuard<'_, S> {
    surface.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory raster; `None` pixels are transparent.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: usize,
    height: usize,
    pixels: Vec<Option<Rgb>>,
    fill: Fill,
}

impl PixelCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width * height],
            fill: Fill::default(),
        }
    }

    pub fn shared(width: usize, height: usize) -> SharedSurface<Self> {
        Arc::new(Mutex::new(Self::new(width, height)))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x]
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(Option::is_none)
    }

    /// Writes `value` to every pixel whose centre lies inside the rectangle.
    fn paint(&mut self, x: f64, y: f64, width: f64, height: f64, value: Option<Rgb>) {
        let (x0, x1) = span(x, width, self.width);
        let (y0, y1) = span(y, height, self.height);
        for row in y0..y1 {
            let start = row * self.width;
            self.pixels[start + x0..start + x1].fill(value);
        }
    }
}

/// Pixel index range `[start, end)` covered by `[origin, origin + extent)`.
fn span(origin: f64, extent: f64, limit: usize) -> (usize, usize) {
    let (lo, hi) = if extent < 0.0 {
        (origin + extent, origin)
    } else {
        (origin, origin + extent)
    };
    if !lo.is_finite() || !hi.is_finite() {
        return (0, 0);
    }
    let clamp = |v: f64| (v - 0.5).ceil().clamp(0.0, limit as f64) as usize;
    let (start, end) = (clamp(lo), clamp(hi));
    (start, end.max(start))
}

impl Surface for PixelCanvas {
    fn size(&self) -> (f64, f64) {
        (self.width as f64, self.height as f64)
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.paint(x, y, width, height, None);
    }

    fn set_fill(&mut self, fill: Fill) {
        self.fill = fill;
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let colour = self.fill.to_rgb();
        self.paint(x, y, width, height, Some(colour));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Fill::parse_hex("#00ff00"), Some(Fill::Rgb(0, 255, 0)));
        assert_eq!(Fill::parse_hex("#1A2b3C"), Some(Fill::Rgb(0x1a, 0x2b, 0x3c)));
        assert_eq!(Fill::parse_hex("00ff00"), None);
        assert_eq!(Fill::parse_hex("#00ff0"), None);
        assert_eq!(Fill::parse_hex("#gg0000"), None);
    }

    #[test]
    fn test_hsl_primaries() {
        let hsl = |hue| Fill::Hsl {
            hue,
            saturation: 1.0,
            lightness: 0.5,
        };
        assert_eq!(hsl(0.0).to_rgb(), (255, 0, 0));
        assert_eq!(hsl(120.0).to_rgb(), (0, 255, 0));
        assert_eq!(hsl(240.0).to_rgb(), (0, 0, 255));
        assert_eq!(hsl(60.0).to_rgb(), (255, 255, 0));
        assert_eq!(hsl(360.0).to_rgb(), (255, 0, 0));
    }

    #[test]
    fn test_fill_rect_covers_pixel_centres() {
        let mut canvas = PixelCanvas::new(10, 4);
        canvas.set_fill(Fill::Rgb(1, 2, 3));
        canvas.fill_rect(2.0, 1.0, 3.0, 2.0);

        for y in 0..4 {
            for x in 0..10 {
                let inside = (2..5).contains(&x) && (1..3).contains(&y);
                assert_eq!(canvas.pixel(x, y).is_some(), inside, "pixel ({x}, {y})");
            }
        }
        assert_eq!(canvas.pixel(2, 1), Some((1, 2, 3)));
    }

    #[test]
    fn test_fractional_and_out_of_bounds_rects() {
        let mut canvas = PixelCanvas::new(4, 1);
        canvas.set_fill(Fill::Rgb(9, 9, 9));
        // centres at 0.5 and 1.5 fall inside [0.4, 1.6)
        canvas.fill_rect(0.4, 0.0, 1.2, 1.0);
        assert!(canvas.pixel(0, 0).is_some());
        assert!(canvas.pixel(1, 0).is_some());
        assert!(canvas.pixel(2, 0).is_none());

        canvas.fill_rect(-10.0, -10.0, 100.0, 100.0);
        assert!((0..4).all(|x| canvas.pixel(x, 0).is_some()));

        canvas.clear();
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_negative_width_flips() {
        let mut canvas = PixelCanvas::new(4, 1);
        canvas.set_fill(Fill::Rgb(9, 9, 9));
        canvas.fill_rect(3.0, 0.0, -2.0, 1.0);
        assert!(canvas.pixel(0, 0).is_none());
        assert!(canvas.pixel(1, 0).is_some());
        assert!(canvas.pixel(2, 0).is_some());
        assert!(canvas.pixel(3, 0).is_none());
    }

    #[test]
    fn test_poisoned_surface_is_still_usable() {
        let surface = PixelCanvas::shared(2, 1);
        let poisoner = surface.clone();
        let _ = std::thread::spawn(move || {
            let mut canvas = poisoner.lock().unwrap();
            canvas.set_fill(Fill::Rgb(1, 1, 1));
            canvas.fill_rect(0.0, 0.0, 2.0, 1.0);
            panic!("painter crashed mid-frame");
        })
        .join();
        assert!(surface.is_poisoned());

        lock_surface(&surface).clear();
        assert!(lock_surface(&surface).is_blank());
    }
}
