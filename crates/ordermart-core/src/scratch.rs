use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::warn;

use crate::error::CleanupError;

/// Run-scoped working directory. Dropping it removes every file and then the directory,
/// logging (never raising) whatever could not be removed.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ordermart-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory now and reports what failed. The failures are already
    /// logged.
    pub fn release(mut self) -> Vec<CleanupError> {
        self.remove_all()
    }

    fn remove_all(&mut self) -> Vec<CleanupError> {
        let Some(dir) = self.dir.take() else {
            return Vec::new();
        };

        let mut failures = Vec::new();
        match fs::read_dir(&self.path) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let removed = if path.is_dir() {
                        fs::remove_dir_all(&path)
                    } else {
                        fs::remove_file(&path)
                    };
                    if let Err(source) = removed {
                        failures.push(CleanupError { path, source });
                    }
                }
            }
            Err(source) => failures.push(CleanupError {
                path: self.path.clone(),
                source,
            }),
        }

        if let Err(source) = dir.close() {
            failures.push(CleanupError {
                path: self.path.clone(),
                source,
            });
        }

        for failure in &failures {
            warn!(error = %failure, "scratch cleanup failed");
        }
        failures
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove_all();
    }
}
