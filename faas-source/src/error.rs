//! Acquisition errors.

use faas_shell::ShellError;
use thiserror::Error;

/// Why acquiring source failed. Any of these aborts the cycle and leaves
/// the committed working directory untouched.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The clone or download URL is not an absolute http(s) URL.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why.
        reason: String,
    },

    /// The selected mode needs a setting that is not configured.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Cloning failed.
    #[error("git: {0}")]
    Git(#[from] git2::Error),

    /// The tarball download failed.
    #[error("download of {url} failed: {reason}")]
    Download {
        /// The URL.
        url: String,
        /// Transport error or HTTP status.
        reason: String,
    },

    /// An external command (install, pack, extract) failed.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The archive extracted to nothing.
    #[error("archive is empty")]
    EmptyArchive,

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
