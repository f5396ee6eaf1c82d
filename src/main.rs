//! Audio Merger - command-line front end
//!
//! Merges several audio files into one track with fades and pauses between
//! them, and converts files between formats. All decoding and encoding is
//! done by ffmpeg, which must be installed or bundled next to the binary.

mod audio;
mod conversion;
mod core;
mod error;
mod logging;
mod merge;
mod tools;

#[cfg(test)]
mod test_fixtures;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::audio::formats;
use crate::conversion::{ConversionProgress, ConversionResult};
use crate::core::AppSettings;
use crate::merge::{CancelToken, MergeEvent, MergeRequest, MergeStage, Merger};
use crate::tools::{SystemRunner, Toolchain};

#[derive(Parser, Debug)]
#[command(name = "audio-merger", version, about = "Merge and convert audio files with ffmpeg")]
struct Args {
    /// Path to the ffmpeg binary
    #[arg(long, global = true, env = "AUDIO_MERGER_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long, global = true, env = "AUDIO_MERGER_FFPROBE")]
    ffprobe: Option<PathBuf>,

    /// Show debug output on the terminal
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join tracks into one file with fades and silence between them
    Merge {
        /// Tracks to join, in playback order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file; its extension picks the format
        #[arg(short, long)]
        output: PathBuf,

        /// Seconds of silence between tracks
        #[arg(long, allow_negative_numbers = true)]
        pause: Option<f64>,

        /// Fade length in seconds
        #[arg(long, allow_negative_numbers = true)]
        fade: Option<f64>,
    },

    /// Convert a single file
    Convert {
        input: PathBuf,

        /// Output file; its extension picks the format
        #[arg(short, long)]
        output: PathBuf,

        /// Encoder to use instead of the format default (e.g. libopus)
        #[arg(long)]
        codec: Option<String>,
    },

    /// Convert every file of one format in a directory
    Batch {
        dir: PathBuf,

        /// Source format name or extension
        #[arg(long)]
        from: String,

        /// Target format name or extension
        #[arg(long)]
        to: String,

        /// Write outputs here instead of next to the inputs
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Number of simultaneous conversions
        #[arg(long)]
        workers: Option<usize>,
    },

    /// List supported output formats
    Formats,

    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        pause: Option<f64>,
        #[arg(long)]
        fade: Option<f64>,
        #[arg(long)]
        ffmpeg_path: Option<PathBuf>,
        #[arg(long)]
        ffprobe_path: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Some(log_path) = logging::init_logging(level) {
        log::debug!("Logging to {:?}", log_path);
    }

    let settings = AppSettings::load();

    let outcome = match args.command {
        Command::Merge {
            inputs,
            output,
            pause,
            fade,
        } => Toolchain::resolve(args.ffmpeg, args.ffprobe, &settings).and_then(|tools| {
            for input in inputs.iter().filter(|p| !audio::is_audio_file(p)) {
                log::warn!("{:?} has no known audio extension, ffmpeg will probe it", input);
            }
            let request = MergeRequest::new(
                inputs,
                output,
                pause.unwrap_or(settings.default_pause_seconds),
                fade.unwrap_or(settings.default_fade_seconds),
            );
            run_merge(tools, request)
        }),
        Command::Convert {
            input,
            output,
            codec,
        } => Toolchain::resolve(args.ffmpeg, args.ffprobe, &settings).and_then(|tools| {
            let result =
                conversion::convert_file(&SystemRunner, &tools, &input, &output, codec.as_deref());
            report_conversion(&result);
            result.error.map_or(Ok(()), Err)
        }),
        Command::Batch {
            dir,
            from,
            to,
            out_dir,
            workers,
        } => Toolchain::resolve(args.ffmpeg, args.ffprobe, &settings).and_then(|tools| {
            let workers = workers
                .or(settings.batch_workers)
                .unwrap_or_else(conversion::calculate_worker_count);
            run_batch(tools, &dir, &from, &to, out_dir, workers)
        }),
        Command::Formats => {
            print_formats();
            Ok(())
        }
        Command::Settings { action } => run_settings(settings, action),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run a merge on a blocking thread, cancelling it on Ctrl-C
fn run_merge(tools: Toolchain, request: MergeRequest) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || print_merge_progress(rx));
    let merger = Merger::new(SystemRunner, tools)
        .with_cancel_token(cancel.clone())
        .with_events(tx);

    let watcher_cancel = cancel.clone();
    let joined = runtime.block_on(async move {
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping after the current step");
                watcher_cancel.cancel();
            }
        });
        // The merger owns the event sender, so the printer stops once it drops
        let joined = tokio::task::spawn_blocking(move || merger.run(&request)).await;
        watcher.abort();
        joined
    });

    if printer.join().is_err() {
        log::warn!("Progress printer panicked");
    }

    let result = joined.map_err(|e| format!("Merge task failed: {}", e))?;
    if result.success {
        println!("Merged into {}", result.output_path.display());
        return Ok(());
    }

    if cancel.is_cancelled() {
        return Err("Merge cancelled".to_string());
    }
    Err(result
        .error
        .unwrap_or_else(|| "Merge failed without a diagnostic".to_string()))
}

fn print_merge_progress(events: mpsc::Receiver<MergeEvent>) {
    for event in events {
        match event {
            MergeEvent::StageEntered(MergeStage::GeneratingSilence) => {
                println!("Generating silence...");
            }
            MergeEvent::StageEntered(MergeStage::Concatenating) => {
                println!("Joining tracks...");
            }
            MergeEvent::StageEntered(stage) => log::debug!("Stage: {}", stage),
            MergeEvent::TrackProcessed { index, total, path } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                println!("Track {} of {}: {}", index + 1, total, name);
            }
            MergeEvent::Finished { success } => {
                log::debug!("Merge finished (success: {})", success);
            }
        }
    }
}

fn report_conversion(result: &ConversionResult) {
    if result.success {
        println!(
            "{} -> {}",
            result.input_path.display(),
            result.output_path.display()
        );
    } else {
        eprintln!(
            "Failed: {}: {}",
            result.input_path.display(),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn run_batch(
    tools: Toolchain,
    dir: &std::path::Path,
    from: &str,
    to: &str,
    out_dir: Option<PathBuf>,
    workers: usize,
) -> Result<(), String> {
    let source = formats::lookup(from).ok_or_else(|| format!("Unknown format: {}", from))?;
    let target = formats::lookup(to).ok_or_else(|| format!("Unknown format: {}", to))?;

    let jobs = conversion::discover_jobs(dir, source, target, out_dir.as_deref())?;
    if jobs.is_empty() {
        println!("No {} files found in {}", source.name, dir.display());
        return Ok(());
    }

    if let Some(out_dir) = &out_dir {
        std::fs::create_dir_all(out_dir)
            .map_err(|e| format!("Failed to create output directory: {}", e))?;
    }

    let total = jobs.len();
    log::info!(
        "Converting {} {} file(s) to {} with {} worker(s)",
        total,
        source.name,
        target.name,
        workers
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let progress = Arc::new(ConversionProgress::new(total));
    let cancel = Arc::new(AtomicBool::new(false));

    let summary = runtime.block_on(async {
        let watcher_cancel = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, no new conversions will start");
                watcher_cancel.store(true, Ordering::SeqCst);
            }
        });

        let summary = conversion::convert_files_parallel_with_callback(
            tools.ffmpeg.clone(),
            jobs,
            workers,
            progress.clone(),
            cancel.clone(),
            report_conversion,
        )
        .await;
        watcher.abort();
        summary
    });

    println!(
        "{} converted, {} failed{}",
        summary.completed,
        summary.failed,
        if summary.cancelled { " (cancelled)" } else { "" }
    );

    if summary.cancelled {
        Err("Batch conversion cancelled".to_string())
    } else if summary.failed > 0 {
        Err(format!("{} of {} conversions failed", summary.failed, total))
    } else {
        Ok(())
    }
}

fn print_formats() {
    println!("{:<6} {:<10} {:<12} QUALITY", "NAME", "EXTENSION", "CODEC");
    for format in formats::FORMATS {
        println!(
            "{:<6} {:<10} {:<12} {}",
            format.name,
            format.extension,
            format.codec,
            format.quality.join(" ")
        );
    }
}

fn run_settings(mut settings: AppSettings, action: SettingsAction) -> Result<(), String> {
    match action {
        SettingsAction::Show => {
            let path = AppSettings::settings_path()?;
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| format!("Failed to serialize settings: {}", e))?;
            println!("# {}", path.display());
            println!("{}", json);
            Ok(())
        }
        SettingsAction::Set {
            pause,
            fade,
            ffmpeg_path,
            ffprobe_path,
            workers,
        } => {
            if let Some(pause) = pause {
                settings.default_pause_seconds = pause;
            }
            if let Some(fade) = fade {
                settings.default_fade_seconds = fade;
            }
            if ffmpeg_path.is_some() {
                settings.ffmpeg_path = ffmpeg_path;
            }
            if ffprobe_path.is_some() {
                settings.ffprobe_path = ffprobe_path;
            }
            if workers.is_some() {
                settings.batch_workers = workers;
            }

            let path = settings.save()?;
            println!("Saved settings to {}", path.display());
            Ok(())
        }
    }
}
