//! Duration probing via ffprobe
//!
//! Durations only position fade-outs, so probing is fail-soft: any problem
//! yields `0.0` instead of an error.

use std::ffi::OsString;
use std::path::Path;

use crate::tools::{ProcessRunner, Toolchain};

/// Get the container duration of a media file in seconds
///
/// Returns `0.0` if the tool is missing, the file is unreadable, or the
/// output does not parse as a non-negative number.
pub fn duration<R: ProcessRunner>(runner: &R, tools: &Toolchain, path: &Path) -> f64 {
    let args = probe_args(path);
    let result = runner.run(&tools.ffprobe, &args);

    if !result.ok {
        log::warn!(
            "Could not probe duration of {}: {}",
            path.display(),
            result.diagnostic()
        );
        return 0.0;
    }

    match parse_duration(&result.stdout) {
        Some(seconds) => {
            log::debug!("Duration of {}: {:.3}s", path.display(), seconds);
            seconds
        }
        None => {
            log::warn!(
                "Unparsable duration for {}: {:?}",
                path.display(),
                result.stdout.trim()
            );
            0.0
        }
    }
}

fn probe_args(path: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.as_os_str().to_os_string(),
    ]
}

fn parse_duration(output: &str) -> Option<f64> {
    let value: f64 = output.lines().next()?.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
