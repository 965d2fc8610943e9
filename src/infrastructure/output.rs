//! Filesystem output sink.

use std::fs;
use std::path::{Path, PathBuf};

use crate::application::OutputSink;
use crate::domain::{AppError, OutputUnit, Result};

/// Writes archive files into one directory.
///
/// Each file is written to a hidden sibling first and renamed into place, so
/// an interrupted run never leaves a truncated archive under its final name.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Open (and create) the output directory.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::io(format!("Failed to create output directory: {}", dir.display()), e)
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

impl OutputSink for DirectorySink {
    fn write_unit(&mut self, unit: &OutputUnit) -> Result<()> {
        let target = self.dir.join(&unit.name);
        let staging = self.dir.join(format!(".{}.partial", unit.name));

        fs::write(&staging, unit.content.as_bytes()).map_err(|e| {
            AppError::io(format!("Failed to write {}", staging.display()), e)
        })?;

        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(AppError::io(format!("Failed to move {} into place", target.display()), e));
        }

        tracing::debug!(path = %target.display(), bytes = unit.content.len(), "Archive file written");
        Ok(())
    }
}
