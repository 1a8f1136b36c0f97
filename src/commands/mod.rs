//! Command handlers.
//!
//! - `monitor`: the interactive page (default)
//! - `list_devices`: list audio input devices
//! - `logs`: show recent log entries
//! - `config`: open the configuration file in an editor

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod monitor;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use monitor::handle_monitor;
