//! Resolution errors.

use std::path::PathBuf;
use thiserror::Error;

/// A failure that stops a whole resolution pass.
///
/// Per-file load failures are not errors; they are reported in
/// [`Resolution::failures`](crate::Resolution::failures).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A directory to scan does not exist or is not a directory.
    #[error("functions directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A path could not be made absolute.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The directory walk itself failed.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
