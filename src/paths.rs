//! Search path configuration for metadata source files
//!
//! Search directories are registered once at construction, resolved
//! against a validated base path, and never change afterwards: the
//! in-process lineage and identifier caches assume a stable path set.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MetadataError, Result};

/// Validated, ordered set of metadata search directories
#[derive(Debug, Clone)]
pub struct SearchPaths {
    base: PathBuf,
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    /// Build a search path set from a base directory and path entries.
    ///
    /// The base must be an existing directory. Each entry is resolved
    /// relative to the base unless already absolute; entries that do not
    /// exist as directories are dropped. Registration order is preserved
    /// and doubles as precedence order (first registered wins conflicts).
    pub fn new<P, I, E>(base: P, entries: I) -> Result<Self>
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = E>,
        E: Into<PathBuf>,
    {
        let base = base.into();
        if !base.is_dir() {
            return Err(MetadataError::InvalidBasePath(base));
        }
        let base = fs::canonicalize(&base).map_err(|_| MetadataError::InvalidBasePath(base.clone()))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.into();
            let resolved = if entry.is_absolute() {
                entry
            } else {
                base.join(entry)
            };

            match fs::canonicalize(&resolved) {
                Ok(canonical) if canonical.is_dir() => dirs.push(canonical),
                _ => {
                    tracing::warn!(path = %resolved.display(), "dropping search path: not a directory");
                }
            }
        }

        Ok(Self { base, dirs })
    }

    /// Base directory all relative entries were resolved against
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Search directories in registration order
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Search directories in reverse registration order.
    ///
    /// This is the read order: the last-registered directory is visited
    /// first and overridden by everything registered before it, so the
    /// first-registered directory wins conflicts.
    pub fn read_order(&self) -> impl Iterator<Item = &PathBuf> {
        self.dirs.iter().rev()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}
