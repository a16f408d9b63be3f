//! Error types for each protocol boundary.

use thiserror::Error;

/// Errors raised by a function handler while serving one invocation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler ran and failed. Served as 500.
    #[error("{0}")]
    Failed(String),

    /// The handler did not finish in time. Served as 504.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The handler finished but produced output that cannot be served.
    #[error("invalid handler output: {0}")]
    InvalidOutput(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors loading one module file. Contained to that file.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid in its format.
    #[error("parse error in {path}: {message}")]
    Parse {
        /// Path of the module file.
        path: String,
        /// Parser message.
        message: String,
    },

    /// The file parsed but its shape is not a module.
    #[error("invalid module {path}: {message}")]
    InvalidModule {
        /// Path of the module file.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// The loader itself crashed while loading.
    #[error("loader crashed: {0}")]
    Crashed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors projecting one descriptor onto a surface.
/// Reported per descriptor; never fatal to a mount.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MountError {
    /// The route path or guard prefix cannot be mounted.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP method is not one the router supports.
    #[error("unsupported method {0:?}")]
    InvalidMethod(String),

    /// The job rule is not a valid cron expression.
    #[error("invalid rule {rule:?}: {reason}")]
    InvalidRule {
        /// The offending rule.
        rule: String,
        /// Parser message.
        reason: String,
    },

    /// The pub/sub transport refused the namespace.
    #[error("transport error: {0}")]
    Transport(#[from] PubSubError),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Pub/sub transport errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PubSubError {
    /// No namespace with this name is open.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// The namespace is already open.
    #[error("namespace already open: {0}")]
    NamespaceTaken(String),

    /// No live connection with this id in the namespace.
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
