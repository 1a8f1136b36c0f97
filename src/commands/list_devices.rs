//! List available audio input devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::capture::microphone::suppress_alsa_warnings;

/// One row of the device listing.
struct DeviceInfo {
    name: String,
    is_default: bool,
    config: Option<(u32, u16)>,
}

/// Prints every input device with the index and name accepted by `audio.device`.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    let devices = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
            .filter_map(|device| {
                let name = device.name().ok()?;
                let config = device
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels()));
                Some(DeviceInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    config,
                })
            })
            .collect::<Vec<_>>();
        Ok(devices)
    })?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("{}", describe(index, device));
    }
    println!("Set [audio] device in micscope.toml to an ID or a name.");
    Ok(())
}

fn describe(index: usize, device: &DeviceInfo) -> String {
    let default = if device.is_default { " [DEFAULT]" } else { "" };
    let config = match device.config {
        Some((rate, channels)) => format!("{rate}Hz, {channels} channels"),
        None => "configuration unavailable".to_string(),
    };
    format!("  ID: {index}\n    Name: {}{default}\n    Config: {config}\n", device.name)
}
