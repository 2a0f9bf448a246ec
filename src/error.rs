//! Error types for metadata resolution

use std::path::PathBuf;

use thiserror::Error;

/// Result type for metadata operations
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Metadata resolution errors
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Invalid identifier: {0:?} (expected a non-empty type name or meta-key)")]
    InvalidIdentifier(String),

    #[error("Invalid base path: {} is not an existing directory", .0.display())]
    InvalidBasePath(PathBuf),

    #[error("Unreadable metadata file {}: {}", .path.display(), .source)]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed metadata file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metadata file {} does not contain a top-level object", .path.display())]
    NotAnObject { path: PathBuf },

    #[error("Invalid metadata container: {0}")]
    InvalidContainer(String),

    #[error("Type graph contains an inheritance cycle: {}", .0.join(" -> "))]
    TypeCycle(Vec<String>),

    #[error("Cache store error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
