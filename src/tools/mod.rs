//! External tool discovery and invocation
//!
//! The merger never decodes audio itself. It drives `ffmpeg` for encoding,
//! filtering and concatenation, and `ffprobe` for durations.

mod invoker;

pub use invoker::{render_args, Invocation, ProcessRunner, SystemRunner};

use std::path::PathBuf;

use crate::core::AppSettings;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Resolved locations of the external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Toolchain {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both tools
    ///
    /// Explicit paths win, then the settings file, then a bundled copy,
    /// then whatever is on the `PATH`. Only a missing ffmpeg is an error.
    pub fn resolve(
        ffmpeg: Option<PathBuf>,
        ffprobe: Option<PathBuf>,
        settings: &AppSettings,
    ) -> Result<Self, String> {
        let ffmpeg = ffmpeg
            .or_else(|| settings.ffmpeg_path.clone())
            .map(Ok)
            .unwrap_or_else(|| find_tool(FFMPEG))?;
        // Durations are fail-soft, so a missing ffprobe only degrades fades
        let ffprobe = ffprobe
            .or_else(|| settings.ffprobe_path.clone())
            .unwrap_or_else(|| {
                find_tool(FFPROBE).unwrap_or_else(|e| {
                    log::warn!("{}; fade-outs will start at the beginning of each track", e);
                    PathBuf::from(FFPROBE)
                })
            });

        log::debug!("Using ffmpeg at {:?}, ffprobe at {:?}", ffmpeg, ffprobe);
        Ok(Self { ffmpeg, ffprobe })
    }
}

/// Locate a tool by name
pub fn find_tool(name: &str) -> Result<PathBuf, String> {
    if let Some(path) = bundled_tool(name) {
        log::debug!("Found {} at bundled path: {:?}", name, path);
        return Ok(path);
    }

    which::which(name).map_err(|e| {
        format!(
            "{} binary not found ({}). Install it, put it on PATH, or pass its location explicitly",
            name, e
        )
    })
}

/// Look for `resources/bin/<name>` in development and bundle layouts
fn bundled_tool(name: &str) -> Option<PathBuf> {
    let file_name = executable_name(name);

    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let dev_path = PathBuf::from(manifest_dir)
            .join("resources")
            .join("bin")
            .join(&file_name);
        if dev_path.is_file() {
            return Some(dev_path);
        }
    }

    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;
    let local_path = exe_dir.join("resources").join("bin").join(&file_name);
    if local_path.is_file() {
        return Some(local_path);
    }

    None
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}
