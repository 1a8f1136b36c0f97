//! Terminal rendering for the monitor page.

pub mod canvas_widget;
pub mod error;
pub mod monitor;

pub use error::ErrorScreen;
pub use monitor::{MonitorCommand, MonitorTui, MonitorView};
