//! Supervisor errors and their HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use faas_source::AcquisitionError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// The engine process failed to start or stop.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be spawned.
    #[error("failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process exited before it was listening.
    #[error("engine exited during startup: {status}")]
    ExitedEarly {
        /// Exit status as reported by the OS.
        status: String,
    },

    /// The port never accepted connections.
    #[error("engine not listening after {after:?}")]
    NotReady {
        /// The startup timeout.
        after: Duration,
    },

    /// Signalling the process failed.
    #[error("signal failed: {0}")]
    Signal(#[from] nix::Error),

    /// Waiting on the process failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a supervisor operation failed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Missing or wrong application id. Nothing was changed.
    #[error("Unauthorized request")]
    Unauthorized,

    /// Source could not be acquired. The running engine was left alone.
    #[error("{0}")]
    Acquisition(#[from] AcquisitionError),

    /// The engine process failed.
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// No engine is running to take proxied traffic.
    #[error("functions engine is not running")]
    NotRunning,

    /// The engine did not answer a proxied request.
    #[error("functions engine unreachable: {0}")]
    Upstream(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SupervisorError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Acquisition(_) => StatusCode::FORBIDDEN,
            Self::Process(_) | Self::NotRunning | Self::Upstream(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SupervisorError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({"message": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(SupervisorError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            SupervisorError::from(AcquisitionError::EmptyArchive).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            SupervisorError::from(ProcessError::NotReady {
                after: Duration::from_secs(1)
            })
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SupervisorError::NotRunning.to_string(),
            "functions engine is not running"
        );
    }
}
