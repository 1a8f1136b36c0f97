//! Locating the ffmpeg binary that performs screen capture and encoding.
//!
//! An explicit `MICSCOPE_FFMPEG` override wins. Otherwise well-known install
//! locations are probed before searching PATH, so ffmpeg is found even when
//! the program is launched from a hotkey daemon with a minimal environment.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Environment variable naming an explicit ffmpeg binary.
pub const FFMPEG_ENV: &str = "MICSCOPE_FFMPEG";

/// Locates the ffmpeg binary on the system.
///
/// # Errors
/// - If `MICSCOPE_FFMPEG` points at a missing file
/// - If ffmpeg is neither in a standard location nor on PATH
pub fn find_ffmpeg() -> Result<PathBuf> {
    if let Ok(explicit) = std::env::var(FFMPEG_ENV) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            tracing::debug!("Using ffmpeg from {}: {}", FFMPEG_ENV, path.display());
            return Ok(path);
        }
        return Err(anyhow!(
            "{FFMPEG_ENV} is set to {} but that file does not exist",
            path.display()
        ));
    }

    if let Some(path) = standard_locations().into_iter().find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let path = find_in_path("ffmpeg")?;
    tracing::debug!("Found ffmpeg in PATH at: {}", path.display());
    Ok(path)
}

fn standard_locations() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/bin/ffmpeg",
            "/usr/local/bin/ffmpeg",
            "/usr/bin/ffmpeg",
        ]
    } else if cfg!(target_os = "linux") {
        &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/snap/bin/ffmpeg"]
    } else if cfg!(target_os = "windows") {
        &[
            "C:\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
        ]
    } else {
        &[]
    };
    paths.iter().map(PathBuf::from).collect()
}

/// Searches PATH with `which` (or `where` on Windows).
fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = std::process::Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        // `where` may print several matches, one per line
        if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Ok(PathBuf::from(first));
        }
    }

    Err(anyhow!(
        "ffmpeg not found, screen recording needs it:\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
         Windows: Download from https://ffmpeg.org/download.html"
    ))
}
