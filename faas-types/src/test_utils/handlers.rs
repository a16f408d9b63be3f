//! Closure-backed handlers.

use crate::error::HandlerError;
use crate::event::{EventRequest, EventResponse};
use crate::handler::{EventHandler, GuardHandler, GuardOutcome, JobHandler, RequestHandler};
use crate::http::{FunctionRequest, FunctionResponse};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

struct RequestFn<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for RequestFn<F>
where
    F: Fn(FunctionRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FunctionResponse, HandlerError>> + Send,
{
    async fn handle(&self, request: FunctionRequest) -> Result<FunctionResponse, HandlerError> {
        (self.0)(request).await
    }
}

/// A request handler from an async closure.
pub fn request_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(FunctionRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FunctionResponse, HandlerError>> + Send + 'static,
{
    Arc::new(RequestFn(f))
}

struct GuardFn<F>(F);

#[async_trait]
impl<F> GuardHandler for GuardFn<F>
where
    F: Fn(&mut FunctionRequest) -> GuardOutcome + Send + Sync,
{
    async fn check(&self, request: &mut FunctionRequest) -> Result<GuardOutcome, HandlerError> {
        Ok((self.0)(request))
    }
}

/// A guard from a synchronous closure that may annotate the request.
pub fn guard_fn<F>(f: F) -> Arc<dyn GuardHandler>
where
    F: Fn(&mut FunctionRequest) -> GuardOutcome + Send + Sync + 'static,
{
    Arc::new(GuardFn(f))
}

struct EventFn<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for EventFn<F>
where
    F: Fn(EventRequest, EventResponse) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn on_event(
        &self,
        request: EventRequest,
        response: EventResponse,
    ) -> Result<(), HandlerError> {
        (self.0)(request, response).await
    }
}

/// An event handler from an async closure.
pub fn event_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(EventRequest, EventResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(EventFn(f))
}

struct JobFn<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for JobFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn run(&self) -> Result<(), HandlerError> {
        (self.0)().await
    }
}

/// A job from an async closure.
pub fn job_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(JobFn(f))
}
