//! Silence clip generation
//!
//! One clip per run, reused between every pair of tracks.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::SAMPLE_RATE;
use crate::audio::FormatDescriptor;
use crate::error::{MergeError, Result};
use crate::merge::{MergeStage, Workspace};
use crate::tools::{ProcessRunner, Toolchain};

/// Synthesize `pause_seconds` of stereo silence in the output codec
///
/// Returns `Ok(None)` without invoking anything when the pause is zero.
pub fn generate<R: ProcessRunner>(
    runner: &R,
    tools: &Toolchain,
    pause_seconds: f64,
    format: &FormatDescriptor,
    workspace: &Workspace,
) -> Result<Option<PathBuf>> {
    if pause_seconds <= 0.0 {
        return Ok(None);
    }

    let output = workspace.path(&format.file_name("silence"));
    let args = silence_args(pause_seconds, format, &output);

    log::info!("Generating {}s of silence", pause_seconds);

    let result = runner.run(&tools.ffmpeg, &args);
    if !result.ok {
        let diagnostic = result.diagnostic();
        log::error!("Failed to generate silence: {}", diagnostic);
        return Err(MergeError::Silence(diagnostic));
    }

    if !output.exists() {
        return Err(MergeError::MissingOutput {
            stage: MergeStage::GeneratingSilence,
            path: output,
        });
    }

    Ok(Some(output))
}

fn silence_args(pause_seconds: f64, format: &FormatDescriptor, output: &Path) -> Vec<OsString> {
    let source = format!(
        "anullsrc=r={}:cl=stereo:d={}",
        SAMPLE_RATE, pause_seconds
    );

    let mut args: Vec<OsString> = vec!["-f".into(), "lavfi".into(), "-i".into(), source.into()];
    args.extend(format.codec_args());
    args.push("-y".into());
    args.push(output.as_os_str().to_os_string());
    args
}
