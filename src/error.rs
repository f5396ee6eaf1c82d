//! Error types for the merge pipeline
//!
//! Validation errors are raised before any external process runs.
//! Invocation errors carry the tool's stderr. Post-condition errors mean a
//! tool reported success but did not produce its file.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::merge::MergeStage;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("At least two input files are required, got {0}")]
    TooFewInputs(usize),

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Input is not a regular file: {}", .0.display())]
    InputNotAFile(PathBuf),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid {name}: {value} (must be a finite number of seconds >= 0)")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("Failed to process {}: {diagnostic}", path.display())]
    Track { path: PathBuf, diagnostic: String },

    #[error("Failed to generate silence: {0}")]
    Silence(String),

    #[error("Failed to concatenate tracks: {0}")]
    Concat(String),

    #[error("{stage} reported success but {} was not created", path.display())]
    MissingOutput { stage: MergeStage, path: PathBuf },

    #[error("Workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while {stage} at {}: {source}", path.display())]
    Io {
        stage: MergeStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Merge cancelled")]
    Cancelled,
}

impl MergeError {
    /// Adapter for `map_err` that tags an I/O failure with its stage and path
    pub fn io(stage: MergeStage, path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            stage,
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for errors detected before any workspace or process exists
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TooFewInputs(_)
                | Self::InputNotFound(_)
                | Self::InputNotAFile(_)
                | Self::UnsupportedFormat(_)
                | Self::InvalidDuration { .. }
        )
    }

    /// Stage the error belongs to, when it is tied to one
    pub fn stage(&self) -> Option<MergeStage> {
        match self {
            Self::TooFewInputs(_)
            | Self::InputNotFound(_)
            | Self::InputNotAFile(_)
            | Self::UnsupportedFormat(_)
            | Self::InvalidDuration { .. } => Some(MergeStage::ValidatingInputs),
            Self::Track { .. } => Some(MergeStage::FadingTracks),
            Self::Silence(_) => Some(MergeStage::GeneratingSilence),
            Self::Concat(_) => Some(MergeStage::Concatenating),
            Self::MissingOutput { stage, .. } | Self::Io { stage, .. } => Some(*stage),
            Self::Workspace { .. } => Some(MergeStage::PreparingWorkspace),
            Self::Cancelled => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
