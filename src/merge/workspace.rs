//! Per-run scratch directory
//!
//! Each merge run owns one directory next to its output file:
//! `<output dir>/.audio-merge-<run id>/`. The run id is a fresh UUID, so
//! concurrent runs into the same output directory never share files.
//! Closing is best-effort: files that cannot be deleted are logged and left
//! behind rather than failing an otherwise successful merge.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::error::{MergeError, Result};

const WORKSPACE_PREFIX: &str = ".audio-merge-";

/// Age after which a workspace is assumed abandoned by a crashed run
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Scratch directory owned by a single merge run
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    run_id: String,
    closed: bool,
}

impl Workspace {
    /// Create a workspace under `parent` with a fresh run id
    pub fn open(parent: &Path) -> Result<Self> {
        Self::open_with_id(parent, &generate_run_id())
    }

    /// Create a workspace under `parent` for the given run id
    ///
    /// A leftover directory at the same path (from a crashed run) is purged
    /// and reused.
    pub fn open_with_id(parent: &Path, run_id: &str) -> Result<Self> {
        let dir = parent.join(format!("{}{}", WORKSPACE_PREFIX, run_id));

        if dir.exists() {
            log::warn!("Purging stale workspace {:?}", dir);
            purge_files(&dir);
        }

        fs::create_dir_all(&dir).map_err(|source| MergeError::Workspace {
            path: dir.clone(),
            source,
        })?;

        log::debug!("Opened workspace {} at {:?}", run_id, dir);

        Ok(Self {
            dir,
            run_id: run_id.to_string(),
            closed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path for a derived file inside the workspace
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Path for the processed copy of track `index`
    pub fn track_path(&self, index: usize, extension: &str) -> PathBuf {
        self.path(&format!("track_{:03}.{}", index, extension))
    }

    /// Remove every file and then the directory itself
    ///
    /// Deletion errors are logged and swallowed.
    pub fn close(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.dir.exists() {
            return;
        }

        purge_files(&self.dir);
        match fs::remove_dir(&self.dir) {
            Ok(()) => log::debug!("Removed workspace {:?}", self.dir),
            Err(e) => log::warn!("Could not remove workspace {:?}: {}", self.dir, e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Delete everything inside `dir`, ignoring individual failures
fn purge_files(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Could not list {:?}: {}", dir, e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = result {
            log::warn!("Could not delete temp file {:?}: {}", path, e);
        }
    }
}

/// Generate a unique run id
pub fn generate_run_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// True if `path` looks like a workspace directory
pub fn is_workspace_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(WORKSPACE_PREFIX))
}

/// Remove abandoned workspaces under `parent`, returning how many went
///
/// Only directories named like a workspace whose modification time is at
/// least `max_age` old are touched. A live run keeps writing into its
/// directory, so its modification time stays fresh.
pub fn sweep_stale(parent: &Path, max_age: Duration) -> usize {
    let Ok(entries) = fs::read_dir(parent) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() || !is_workspace_dir(&path) {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        if !age.is_some_and(|age| age >= max_age) {
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                log::info!("Removed abandoned workspace {:?}", path);
                removed += 1;
            }
            Err(e) => log::warn!("Could not remove abandoned workspace {:?}: {}", path, e),
        }
    }
    removed
}
