//! Audio conversion module
//!
//! One-shot conversion of a single file, and batch conversion of a whole
//! directory from one format to another.

mod ffmpeg;
mod parallel;

pub use ffmpeg::{convert_file, ConversionResult};
pub use parallel::{
    calculate_worker_count, convert_files_parallel_with_callback, discover_jobs, BatchSummary,
    ConversionJob, ConversionProgress,
};

/// Number of encoder threads to ask ffmpeg for
pub fn thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
