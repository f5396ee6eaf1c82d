//! Parallel batch conversion using tokio
//!
//! Converts every file of one format in a directory to another format,
//! using a worker pool sized based on CPU cores.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

use super::ffmpeg::{conversion_args, conversion_outcome};
use super::ConversionResult;
use crate::audio::{has_format, FormatDescriptor};
use crate::tools::Invocation;

/// Calculate the optimal number of parallel workers based on CPU cores
pub fn calculate_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    // Use 75% of cores, clamped between 2 and 8
    ((available as f32 * 0.75).ceil() as usize).clamp(2, 8)
}

/// Progress tracking for conversion
#[derive(Debug)]
pub struct ConversionProgress {
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
    pub total: usize,
}

impl ConversionProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            total,
        }
    }

    pub fn increment_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn increment_failed(&self) -> usize {
        self.failed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

/// A file to be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Summary of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Results of the files that failed
    pub failures: Vec<ConversionResult>,
}

/// Find every `source` file directly inside `dir` and plan its conversion
///
/// Outputs keep the input's stem with the target extension, next to the
/// input or inside `out_dir`. Jobs are sorted by input path.
pub fn discover_jobs(
    dir: &Path,
    source: &FormatDescriptor,
    target: &FormatDescriptor,
    out_dir: Option<&Path>,
) -> Result<Vec<ConversionJob>, String> {
    if !dir.is_dir() {
        return Err(format!("Not a directory: {}", dir.display()));
    }

    let mut jobs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| format!("Failed to read directory entry: {}", e))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_format(path, source) {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            log::warn!("Skipping file with unreadable name: {:?}", path);
            continue;
        };
        let output_dir = out_dir.unwrap_or(dir);
        jobs.push(ConversionJob {
            input_path: path.to_path_buf(),
            output_path: output_dir.join(target.file_name(stem)),
        });
    }

    log::debug!(
        "Found {} {} files in {}",
        jobs.len(),
        source.name,
        dir.display()
    );
    Ok(jobs)
}

/// Convert a single file asynchronously
async fn convert_file_async(ffmpeg_path: &Path, job: &ConversionJob, threads: usize) -> ConversionResult {
    let input_path = &job.input_path;
    let output_path = &job.output_path;

    // Create output directory if needed
    if let Some(parent) = output_path.parent() {
        if !parent.exists() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ConversionResult::failed(
                    input_path,
                    output_path,
                    format!("Failed to create output directory: {}", e),
                );
            }
        }
    }

    let args = conversion_args(input_path, output_path, None, threads);
    let result = match Command::new(ffmpeg_path)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .output()
        .await
    {
        Ok(output) => Invocation::from_output(ffmpeg_path, &output),
        Err(e) => Invocation::spawn_failed(ffmpeg_path, &e),
    };

    conversion_outcome(&result, input_path, output_path)
}

/// Convert multiple files in parallel with a callback after each file completes
///
/// The `on_file_complete` callback receives each file's result as soon as it
/// finishes (success or failure).
///
/// The `cancel_token` can be set to true to stop processing new files.
/// Files that are already in progress will complete, but no new files will start.
pub async fn convert_files_parallel_with_callback<F>(
    ffmpeg_path: PathBuf,
    jobs: Vec<ConversionJob>,
    workers: usize,
    progress: Arc<ConversionProgress>,
    cancel_token: Arc<AtomicBool>,
    on_file_complete: F,
) -> BatchSummary
where
    F: Fn(&ConversionResult) + Send + Sync + 'static,
{
    let worker_count = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(worker_count));
    let on_complete = Arc::new(on_file_complete);
    let failures = Arc::new(Mutex::new(Vec::new()));
    // Split the cores between concurrent ffmpeg processes
    let threads = (super::thread_count() / worker_count).max(1);

    log::info!(
        "Starting parallel conversion: {} files with {} workers",
        jobs.len(),
        worker_count
    );

    // Use FuturesUnordered to process completions as they happen
    let mut futures = FuturesUnordered::new();
    let mut was_cancelled = false;

    for job in jobs {
        // Check for cancellation before starting each new job
        if cancel_token.load(Ordering::SeqCst) {
            log::info!("Cancellation requested - skipping remaining files");
            was_cancelled = true;
            break;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let ffmpeg = ffmpeg_path.clone();
        let progress = progress.clone();
        let on_complete = on_complete.clone();
        let failures = failures.clone();

        let handle = tokio::spawn(async move {
            let input_name = job
                .input_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());
            log::debug!("Processing: {}", input_name);

            let result = convert_file_async(&ffmpeg, &job, threads).await;

            if result.success {
                let count = progress.increment_completed();
                log::info!("Completed ({}/{}): {}", count, progress.total, input_name);
            } else {
                progress.increment_failed();
                if let Some(ref error) = result.error {
                    log::error!("Failed: {} - {}", input_name, error);
                }
                if let Ok(mut guard) = failures.lock() {
                    guard.push(result.clone());
                }
            }

            on_complete(&result);

            drop(permit); // Release the semaphore permit
        });

        futures.push(handle);
    }

    // Wait for all in-flight tasks to complete (even if cancelled)
    while let Some(joined) = futures.next().await {
        if let Err(e) = joined {
            log::error!("Conversion task panicked: {}", e);
        }
    }

    let failures = failures.lock().map(|g| g.clone()).unwrap_or_default();
    BatchSummary {
        completed: progress.completed_count(),
        failed: progress.failed_count(),
        cancelled: was_cancelled,
        failures,
    }
}
