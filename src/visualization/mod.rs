//! Live microphone visualization.
//!
//! Provides the frequency analyser, the raster surfaces, the per-frame
//! painters for the volume bar and spectrum, and the lifecycle that ties them
//! to a microphone session.

pub mod analyser;
pub mod canvas;
pub mod frames;
pub mod lifecycle;
pub mod render_loop;

pub use analyser::{AnalyserHandle, AnalyserSettings};
pub use canvas::{lock_surface, Fill, PixelCanvas, Rgb, SharedSurface, Surface};
pub use lifecycle::{Visualizer, VisualizerSettings};
