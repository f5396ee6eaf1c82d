//! Concatenation via ffmpeg's concat demuxer
//!
//! Writes the manifest (`file '<path>'` per line) into the workspace and
//! re-encodes the listed segments into a single file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::{CHANNELS, SAMPLE_RATE};
use crate::audio::FormatDescriptor;
use crate::error::{MergeError, Result};
use crate::merge::{MergeStage, Workspace};
use crate::tools::{ProcessRunner, Toolchain};

pub const MANIFEST_NAME: &str = "concat_list.txt";

/// Ordered segment list: tracks, with the silence clip between neighbours
pub fn segments<'a>(
    tracks: &'a [PathBuf],
    silence: Option<&'a Path>,
    pause_seconds: f64,
) -> Vec<&'a Path> {
    let silence = silence.filter(|_| pause_seconds > 0.0);
    let mut out = Vec::with_capacity(tracks.len() * 2);

    for (i, track) in tracks.iter().enumerate() {
        if i > 0 {
            if let Some(clip) = silence {
                out.push(clip);
            }
        }
        out.push(track.as_path());
    }

    out
}

/// Render the manifest text for a list of segments
pub fn manifest(segments: &[&Path]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", quote(&p.to_string_lossy())))
        .collect()
}

/// Escape single quotes the way the concat demuxer expects
fn quote(path: &str) -> String {
    path.replace('\'', r"'\''")
}

/// Concatenate `tracks` (and silence) into `output`
#[allow(clippy::too_many_arguments)]
pub fn concat<R: ProcessRunner>(
    runner: &R,
    tools: &Toolchain,
    tracks: &[PathBuf],
    silence: Option<&Path>,
    pause_seconds: f64,
    format: &FormatDescriptor,
    workspace: &Workspace,
    output: &Path,
) -> Result<()> {
    let list = segments(tracks, silence, pause_seconds);
    let manifest_path = workspace.path(MANIFEST_NAME);
    fs::write(&manifest_path, manifest(&list))
        .map_err(MergeError::io(MergeStage::Concatenating, &manifest_path))?;

    log::info!("Concatenating {} segments", list.len());
    log::debug!("Manifest written to {:?}", manifest_path);

    let args = concat_args(&manifest_path, format, output);
    let result = runner.run(&tools.ffmpeg, &args);
    if !result.ok {
        let diagnostic = result.diagnostic();
        log::error!("Concatenation failed: {}", diagnostic);
        return Err(MergeError::Concat(diagnostic));
    }

    if !output.exists() {
        return Err(MergeError::MissingOutput {
            stage: MergeStage::Concatenating,
            path: output.to_path_buf(),
        });
    }

    Ok(())
}

fn concat_args(manifest: &Path, format: &FormatDescriptor, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        manifest.as_os_str().to_os_string(),
        "-ar".into(),
        SAMPLE_RATE.into(),
        "-ac".into(),
        CHANNELS.into(),
    ];
    args.extend(format.codec_args());
    args.push("-y".into());
    args.push(output.as_os_str().to_os_string());
    args
}
