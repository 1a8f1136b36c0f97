//! Draws a [`PixelCanvas`] into a terminal area.
//!
//! Each terminal cell shows two vertically stacked pixels with the upper half
//! block: the foreground is the upper pixel, the background the lower one.
//! The canvas is scaled to the area with nearest-neighbour sampling.

use ratatui::{buffer::Buffer, layout::Rect, style::Color, style::Style, widgets::Widget};

use crate::visualization::{PixelCanvas, Rgb};

const UPPER_HALF: &str = "▀";

/// Colour of transparent pixels.
const BACKGROUND: Color = Color::Rgb(0, 0, 0);

pub struct CanvasView<'a> {
    canvas: &'a PixelCanvas,
}

impl<'a> CanvasView<'a> {
    pub fn new(canvas: &'a PixelCanvas) -> Self {
        Self { canvas }
    }
}

fn colour(pixel: Option<Rgb>) -> Color {
    match pixel {
        Some((r, g, b)) => Color::Rgb(r, g, b),
        None => BACKGROUND,
    }
}

impl Widget for CanvasView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        if area.is_empty() || width == 0 || height == 0 {
            return;
        }

        let columns = usize::from(area.width);
        let rows = usize::from(area.height) * 2;
        for cy in 0..area.height {
            let top_y = usize::from(cy) * 2 * height / rows;
            let bottom_y = (usize::from(cy) * 2 + 1) * height / rows;
            for cx in 0..area.width {
                let x = usize::from(cx) * width / columns;
                let style = Style::default()
                    .fg(colour(self.canvas.pixel(x, top_y)))
                    .bg(colour(self.canvas.pixel(x, bottom_y)));
                buf.set_string(area.x + cx, area.y + cy, UPPER_HALF, style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::{Fill, Surface};

    #[test]
    fn test_half_blocks_carry_two_pixels() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.set_fill(Fill::Rgb(255, 0, 0));
        // top half of the left column only
        canvas.fill_rect(0.0, 0.0, 2.0, 2.0);

        let area = Rect::new(0, 0, 2, 2);
        let mut buf = Buffer::empty(area);
        CanvasView::new(&canvas).render(area, &mut buf);

        let lit = buf.cell((0, 0)).unwrap();
        assert_eq!(lit.symbol(), UPPER_HALF);
        assert_eq!(lit.fg, Color::Rgb(255, 0, 0));
        assert_eq!(lit.bg, Color::Rgb(255, 0, 0));

        let right = buf.cell((1, 0)).unwrap();
        assert_eq!(right.fg, Color::Rgb(0, 0, 0));

        let lower = buf.cell((0, 1)).unwrap();
        assert_eq!(lower.fg, Color::Rgb(0, 0, 0));
    }

    #[test]
    fn test_blank_canvas_scales_to_background() {
        let canvas = PixelCanvas::new(8, 2);
        let area = Rect::new(0, 0, 4, 1);
        let mut buf = Buffer::empty(area);
        CanvasView::new(&canvas).render(area, &mut buf);

        let cell = buf.cell((3, 0)).unwrap();
        assert_eq!(cell.symbol(), UPPER_HALF);
        assert_eq!(cell.fg, BACKGROUND);
        assert_eq!(cell.bg, BACKGROUND);
    }
}
