//! Configuration management for micscope.
//!
//! Loads the TOML configuration from the user's config directory and converts
//! it into the settings the capture and visualization layers take.

pub mod file;

pub use file::{get_config_path, MicscopeConfig};
