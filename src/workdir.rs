//! Scratch directory for the query, raw response and rendered report.
//!
//! Nothing reads these files back; they exist so a failed or suspicious run
//! can be inspected. With `clean` disabled the directory survives the run.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const QUERY_FILE: &str = "query.overpassql";
pub const RESPONSE_FILE: &str = "survey_points.csv";
pub const REPORT_FILE: &str = "report.txt";

pub struct WorkDir {
    dir: TempDir,
    keep: bool,
}

impl WorkDir {
    /// Create a fresh directory under `root`, or the system temp dir
    pub fn create(root: Option<&Path>, keep: bool) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("surveycheck-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "Created work directory");
        Ok(Self { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Save an artifact; failures are logged and otherwise ignored
    pub fn save(&self, name: &str, contents: &str) -> Option<PathBuf> {
        let path = self.dir.path().join(name);
        match std::fs::write(&path, contents) {
            Ok(()) => Some(path),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to save work file");
                None
            }
        }
    }

    /// Remove the directory, or keep it and return its path
    pub fn finish(self) -> io::Result<Option<PathBuf>> {
        if self.keep {
            let path = self.dir.keep();
            tracing::info!(path = %path.display(), "Keeping work files");
            Ok(Some(path))
        } else {
            let path = self.dir.path().to_path_buf();
            self.dir.close()?;
            tracing::debug!(path = %path.display(), "Removed work directory");
            Ok(None)
        }
    }
}
