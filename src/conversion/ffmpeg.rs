//! FFmpeg subprocess handling for one-shot conversion

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::audio::formats;
use crate::tools::{Invocation, ProcessRunner, Toolchain};

/// Result of a file conversion
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Path to the converted output file
    pub output_path: PathBuf,
    /// Original input file path
    pub input_path: PathBuf,
    /// Whether conversion was successful
    pub success: bool,
    /// Error message if conversion failed
    pub error: Option<String>,
}

impl ConversionResult {
    pub fn ok(input_path: &Path, output_path: &Path) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            input_path: input_path.to_path_buf(),
            success: true,
            error: None,
        }
    }

    pub fn failed(input_path: &Path, output_path: &Path, error: impl Into<String>) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            input_path: input_path.to_path_buf(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Build the ffmpeg arguments for a conversion
///
/// `-i <input> -y -threads <n> -ar 44100 -ac 2 [-c:a <codec> [quality]] <output>`
///
/// The codec defaults to the encoder registered for the output extension;
/// quality arguments come from that registry entry too. With neither a codec
/// nor a known extension, ffmpeg picks the encoder itself.
pub fn conversion_args(
    input_path: &Path,
    output_path: &Path,
    codec: Option<&str>,
    threads: usize,
) -> Vec<OsString> {
    let format = formats::for_path(output_path);

    let mut args: Vec<OsString> = vec![
        "-i".into(),
        input_path.as_os_str().to_os_string(),
        "-y".into(),
        "-threads".into(),
        threads.to_string().into(),
        "-ar".into(),
        "44100".into(),
        "-ac".into(),
        "2".into(),
    ];

    if let Some(codec) = codec.or(format.map(|f| f.codec)) {
        args.push("-c:a".into());
        args.push(codec.into());
        if let Some(format) = format {
            args.extend(format.quality.iter().map(OsString::from));
        }
    }

    args.push(output_path.as_os_str().to_os_string());
    args
}

/// Convert a single audio file
///
/// # Arguments
/// * `runner` - Process runner used to invoke ffmpeg
/// * `tools` - Resolved tool locations
/// * `input_path` - Path to the input audio file
/// * `output_path` - Path for the output file; its extension picks the format
/// * `codec` - Explicit encoder, or `None` to use the output format's encoder
///
/// # Returns
/// Result indicating success or failure with details
pub fn convert_file<R: ProcessRunner>(
    runner: &R,
    tools: &Toolchain,
    input_path: &Path,
    output_path: &Path,
    codec: Option<&str>,
) -> ConversionResult {
    if !input_path.is_file() {
        let msg = format!("Input file not found: {}", input_path.display());
        log::error!("{}", msg);
        return ConversionResult::failed(input_path, output_path, msg);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ConversionResult::failed(
                    input_path,
                    output_path,
                    format!("Failed to create output directory: {}", e),
                );
            }
        }
    }

    log::info!(
        "Converting: {} -> {}",
        input_path.display(),
        output_path.display()
    );

    let args = conversion_args(input_path, output_path, codec, super::thread_count());
    let result = runner.run(&tools.ffmpeg, &args);
    conversion_outcome(&result, input_path, output_path)
}

/// Turn a finished ffmpeg invocation into a `ConversionResult`
///
/// Failures carry the full stderr. A zero exit without an output file is
/// still a failure.
pub fn conversion_outcome(
    result: &Invocation,
    input_path: &Path,
    output_path: &Path,
) -> ConversionResult {
    if !result.ok {
        let error_msg = format!("FFmpeg error:\n{}", result.diagnostic());
        log::error!("Conversion failed: {}", error_msg);
        return ConversionResult::failed(input_path, output_path, error_msg);
    }

    if !output_path.exists() {
        let error_msg = format!(
            "ffmpeg reported success but {} was not created",
            output_path.display()
        );
        log::error!("{}", error_msg);
        return ConversionResult::failed(input_path, output_path, error_msg);
    }

    log::info!("Successfully converted: {}", input_path.display());
    ConversionResult::ok(input_path, output_path)
}
