//! Saving and playing back finalized recordings.

use anyhow::anyhow;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::chunks::{iso_timestamp, Recording};

/// Writes the recording into `dir` under its timestamped file name.
///
/// The directory is created if missing. An existing file with the same name
/// is overwritten.
///
/// # Errors
/// - If the directory cannot be created
/// - If the file cannot be written
pub fn save_recording(recording: &Recording, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow!("Failed to create download directory {}: {e}", dir.display()))?;

    let path = dir.join(recording.file_name());
    std::fs::write(&path, recording.data())
        .map_err(|e| anyhow!("Failed to write {}: {e}", path.display()))?;

    tracing::info!(
        "Saved recording to {} ({} bytes of {}, finalized {})",
        path.display(),
        recording.size(),
        recording.mime_type(),
        iso_timestamp(&recording.finalized_at())
    );
    Ok(path)
}

/// Opens a saved recording in the system video player without waiting for it.
///
/// On macOS this uses `open`. On Linux it tries `xdg-open`, then mpv, vlc
/// and ffplay.
///
/// # Errors
/// - If no player could be launched
pub fn play_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        return Err(anyhow!("Recording not found: {}", path.display()));
    }

    for player in players() {
        let spawned = Command::new(player)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(_) => {
                tracing::info!("Playing {} with {}", path.display(), player);
                return Ok(());
            }
            Err(e) => tracing::debug!("Player {} unavailable: {}", player, e),
        }
    }

    Err(anyhow!(
        "No video player found. Install mpv, vlc or ffplay"
    ))
}

#[cfg(target_os = "macos")]
fn players() -> &'static [&'static str] {
    &["open"]
}

#[cfg(not(target_os = "macos"))]
fn players() -> &'static [&'static str] {
    &["xdg-open", "mpv", "vlc", "ffplay"]
}
