//! Engine errors.

use faas_resolver::ResolutionError;
use faas_shell::ShellError;
use faas_source::AcquisitionError;
use thiserror::Error;

/// Why a deploy cycle or the engine itself failed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fetching source failed; nothing was resolved or mounted.
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// The scan itself failed (not a single module).
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Binding or serving failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The start script failed.
    #[error("start script failed: {0}")]
    Shell(#[from] ShellError),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
