//! Handler traits, one per descriptor role.
//!
//! Implementations:
//! - `faas-resolver` `CommandHandler`: runs an external command (all four roles)
//! - `faas-resolver` built-ins: health probe and catalog page (request role)
//! - `test_utils` closure adapters (feature `test-utils`)

use crate::error::HandlerError;
use crate::event::{EventRequest, EventResponse};
use crate::http::{FunctionRequest, FunctionResponse};
use async_trait::async_trait;

/// Serves HTTP requests bound to a route.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produce the response for one request.
    async fn handle(&self, request: FunctionRequest) -> Result<FunctionResponse, HandlerError>;
}

/// What a guard decided about a request.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Let the request through to later guards and the route.
    Continue,
    /// Stop here and send this response.
    Respond(FunctionResponse),
}

/// Intercepts requests ahead of every route under its prefix.
///
/// A guard may annotate the request (for example add headers carrying a
/// resolved identity) before returning [`GuardOutcome::Continue`].
#[async_trait]
pub trait GuardHandler: Send + Sync {
    /// Inspect and possibly annotate the request.
    async fn check(&self, request: &mut FunctionRequest) -> Result<GuardOutcome, HandlerError>;
}

/// Receives real-time messages on one channel.
///
/// The [`EventResponse`] is built for this invocation only and is dropped
/// when the handler returns.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one `{auth, body}` message.
    async fn on_event(
        &self,
        request: EventRequest,
        response: EventResponse,
    ) -> Result<(), HandlerError>;
}

/// Runs on a schedule.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job once.
    async fn run(&self) -> Result<(), HandlerError>;
}
