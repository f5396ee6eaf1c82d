//! Fade stage: normalize each input and apply its fade envelope
//!
//! Every track is re-encoded to 44.1 kHz stereo in the output codec so the
//! concat step never sees mismatched sample rates or channel layouts. The
//! first track fades in, the last fades out, and interior tracks do both.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{CHANNELS, SAMPLE_RATE};
use crate::audio::{probe, FormatDescriptor};
use crate::error::{MergeError, Result};
use crate::merge::{MergeStage, Workspace};
use crate::tools::{ProcessRunner, Toolchain};

/// Where a track sits in the merge order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPosition {
    First,
    Interior,
    Last,
}

impl TrackPosition {
    pub fn of(index: usize, total: usize) -> Self {
        if index == 0 {
            Self::First
        } else if index + 1 >= total {
            Self::Last
        } else {
            Self::Interior
        }
    }

    fn fades_in(self) -> bool {
        matches!(self, Self::First | Self::Interior)
    }

    fn fades_out(self) -> bool {
        matches!(self, Self::Interior | Self::Last)
    }
}

/// Start offset of a fade-out, clamped to the start of the track
pub fn fade_out_start(duration: f64, fade_seconds: f64) -> f64 {
    (duration - fade_seconds).max(0.0)
}

/// Build the `-af` filter chain for a track, or `None` when fades are off
///
/// `duration` is only consulted for tracks that fade out.
pub fn fade_filter(
    position: TrackPosition,
    fade_seconds: f64,
    duration: impl FnOnce() -> f64,
) -> Option<String> {
    if fade_seconds <= 0.0 {
        return None;
    }

    let mut filters = Vec::with_capacity(2);
    if position.fades_in() {
        filters.push(format!("afade=t=in:st=0:d={}", fade_seconds));
    }
    if position.fades_out() {
        let start = fade_out_start(duration(), fade_seconds);
        filters.push(format!("afade=t=out:st={}:d={}", start, fade_seconds));
    }

    Some(filters.join(","))
}

/// Normalize and fade one input into the workspace
///
/// Returns the processed track's path. Any tool failure is reported against
/// the input file.
#[allow(clippy::too_many_arguments)]
pub fn apply<R: ProcessRunner>(
    runner: &R,
    tools: &Toolchain,
    input: &Path,
    index: usize,
    total: usize,
    fade_seconds: f64,
    format: &FormatDescriptor,
    workspace: &Workspace,
) -> Result<PathBuf> {
    let output = workspace.track_path(index, format.extension);
    let position = TrackPosition::of(index, total);

    let filter = fade_filter(position, fade_seconds, || {
        let duration = probe::duration(runner, tools, input);
        if duration <= fade_seconds {
            log::warn!(
                "{} is {:.2}s long, not longer than the {:.2}s fade; fade-out starts at 0",
                input.display(),
                duration,
                fade_seconds
            );
        }
        duration
    });

    let args = fade_args(input, filter.as_deref(), format, &output);

    log::info!(
        "Processing track {}/{}: {}",
        index + 1,
        total,
        input.display()
    );

    let result = runner.run(&tools.ffmpeg, &args);
    if !result.ok {
        let diagnostic = result.diagnostic();
        log::error!("Failed to process {}: {}", input.display(), diagnostic);
        return Err(MergeError::Track {
            path: input.to_path_buf(),
            diagnostic,
        });
    }

    if !output.exists() {
        return Err(MergeError::MissingOutput {
            stage: MergeStage::FadingTracks,
            path: output,
        });
    }

    Ok(output)
}

fn fade_args(
    input: &Path,
    filter: Option<&str>,
    format: &FormatDescriptor,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        input.as_os_str().to_os_string(),
        "-y".into(),
        "-ar".into(),
        SAMPLE_RATE.into(),
        "-ac".into(),
        CHANNELS.into(),
    ];
    if let Some(filter) = filter {
        args.push("-af".into());
        args.push(filter.into());
    }
    args.extend(format.codec_args());
    args.push(output.as_os_str().to_os_string());
    args
}
