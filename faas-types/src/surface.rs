//! The serving surface a catalog is mounted onto.
//!
//! Implementations:
//! - `faas-surface`: `RouteTable`, `LocalPubSub`, `CronScheduler`
//! - `test_utils`: recording doubles (feature `test-utils`)

use crate::error::{MountError, PubSubError};
use crate::event::Delivery;
use crate::handler::{GuardHandler, JobHandler, RequestHandler};
use crate::http::MethodSpec;
use crate::id::ConnectionId;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Holds guards and routes.
pub trait HttpRouter: Send {
    /// Attach a guard at a path prefix. `/` covers every request.
    fn guard(&mut self, prefix: &str, handler: Arc<dyn GuardHandler>) -> Result<(), MountError>;

    /// Bind a request handler to a path pattern and method.
    fn route(
        &mut self,
        path: &str,
        method: MethodSpec,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), MountError>;
}

/// Receives every message arriving in a namespace.
#[async_trait]
pub trait NamespaceHandler: Send + Sync {
    /// One client message: the channel it was sent on and its raw `data`.
    async fn on_message(&self, connection: ConnectionId, channel: String, data: Value);
}

/// Real-time transport with namespaces, topics and per-connection sends.
pub trait PubSub: Send + Sync {
    /// Open a namespace and route its inbound messages to `handler`.
    fn open_namespace(
        &self,
        namespace: &str,
        handler: Arc<dyn NamespaceHandler>,
    ) -> Result<(), PubSubError>;

    /// Send `body` on `channel` to the targeted connections.
    fn deliver(
        &self,
        namespace: &str,
        target: Delivery,
        channel: &str,
        body: Value,
    ) -> Result<(), PubSubError>;

    /// Add a connection to a topic.
    fn join(&self, namespace: &str, connection: &ConnectionId, topic: &str)
    -> Result<(), PubSubError>;
}

/// Runs jobs on cron rules.
pub trait Scheduler: Send + Sync {
    /// Register a job. Fails for a rule the scheduler cannot parse.
    fn schedule(&self, name: &str, rule: &str, job: Arc<dyn JobHandler>) -> Result<(), MountError>;
}

/// Everything a mount touches. Side effects of mounting are confined to
/// these three.
pub struct Surface<'a> {
    /// HTTP guards and routes.
    pub router: &'a mut dyn HttpRouter,
    /// Event channels. Owned so event responses can hold it.
    pub pubsub: Arc<dyn PubSub>,
    /// Jobs.
    pub scheduler: &'a dyn Scheduler,
}
