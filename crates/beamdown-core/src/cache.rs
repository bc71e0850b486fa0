//! Artifact-presence cache.
//!
//! A case directory holds at most one lookup table. If it is already there
//! the run is skipped entirely, whatever parameters were supplied this time:
//! use one case directory per design.

use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::table::TableError;

/// File name of the lookup table inside a case directory.
pub const TABLE_FILE_NAME: &str = "OELT_Solstice.motab";

/// Outcome of the cache check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// A table already exists at this path; do not recompute.
    Reuse(PathBuf),
    /// No table yet.
    Compute,
}

/// Decides whether a case directory needs computing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheGate;

impl CacheGate {
    /// Canonical table path for `casedir`.
    pub fn table_path(casedir: &Path) -> PathBuf {
        casedir.join(TABLE_FILE_NAME)
    }

    /// Anything other than a regular file at the table path (a directory, a
    /// socket) can never become a table, so it fails with
    /// [`TableError::NotAFile`] rather than starting a run.
    pub fn resolve(casedir: &Path) -> Result<CacheDecision, TableError> {
        let path = Self::table_path(casedir);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                info!("Loading existing OELT: {}", path.display());
                Ok(CacheDecision::Reuse(path))
            }
            Ok(_) => Err(TableError::NotAFile(path)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CacheDecision::Compute),
            Err(e) => Err(TableError::Io(e)),
        }
    }
}
