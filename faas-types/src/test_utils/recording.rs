//! Recording surfaces: remember every call so tests can assert on order
//! and content.

use crate::error::{MountError, PubSubError};
use crate::event::Delivery;
use crate::handler::{GuardHandler, JobHandler, RequestHandler};
use crate::http::MethodSpec;
use crate::id::ConnectionId;
use crate::surface::{HttpRouter, NamespaceHandler, PubSub, Scheduler};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// One call made on a [`RecordingRouter`].
#[derive(Clone)]
pub enum RouterCall {
    /// A guard was attached.
    Guard {
        /// Prefix it was attached at.
        prefix: String,
        /// The guard.
        handler: Arc<dyn GuardHandler>,
    },
    /// A route was bound.
    Route {
        /// Path pattern.
        path: String,
        /// Method.
        method: MethodSpec,
        /// The handler.
        handler: Arc<dyn RequestHandler>,
    },
}

/// Router that records calls in order. Rejects paths not starting with `/`.
#[derive(Default)]
pub struct RecordingRouter {
    /// Calls in the order they were made.
    pub calls: Vec<RouterCall>,
}

impl RecordingRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// `"guard:<prefix>"` / `"route:<METHOD> <path>"` labels, in call order.
    pub fn labels(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|c| match c {
                RouterCall::Guard { prefix, .. } => format!("guard:{prefix}"),
                RouterCall::Route { path, method, .. } => format!("route:{method} {path}"),
            })
            .collect()
    }

    /// The handler bound at exactly this path.
    pub fn route_handler(&self, path: &str) -> Option<Arc<dyn RequestHandler>> {
        self.calls.iter().find_map(|c| match c {
            RouterCall::Route { path: p, handler, .. } if p == path => Some(handler.clone()),
            _ => None,
        })
    }
}

impl HttpRouter for RecordingRouter {
    fn guard(&mut self, prefix: &str, handler: Arc<dyn GuardHandler>) -> Result<(), MountError> {
        self.calls.push(RouterCall::Guard {
            prefix: prefix.to_owned(),
            handler,
        });
        Ok(())
    }

    fn route(
        &mut self,
        path: &str,
        method: MethodSpec,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), MountError> {
        if !path.starts_with('/') {
            return Err(MountError::InvalidPath {
                path: path.to_owned(),
                reason: "must start with '/'".into(),
            });
        }
        self.calls.push(RouterCall::Route {
            path: path.to_owned(),
            method,
            handler,
        });
        Ok(())
    }
}

/// One payload handed to [`RecordingPubSub::deliver`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDelivery {
    /// Namespace.
    pub namespace: String,
    /// Target.
    pub target: Delivery,
    /// Channel.
    pub channel: String,
    /// Payload.
    pub body: Value,
}

/// Pub/sub that records namespaces, deliveries and joins.
#[derive(Default)]
pub struct RecordingPubSub {
    namespaces: Mutex<Vec<(String, Arc<dyn NamespaceHandler>)>>,
    deliveries: Mutex<Vec<RecordedDelivery>>,
    joins: Mutex<Vec<(String, ConnectionId, String)>>,
}

impl RecordingPubSub {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of opened namespaces, in order.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// The handler of an opened namespace.
    pub fn handler(&self, namespace: &str) -> Option<Arc<dyn NamespaceHandler>> {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(n, _)| n == namespace)
            .map(|(_, h)| h.clone())
    }

    /// Every delivery so far.
    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every `(namespace, connection, topic)` join so far.
    pub fn joins(&self) -> Vec<(String, ConnectionId, String)> {
        self.joins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PubSub for RecordingPubSub {
    fn open_namespace(
        &self,
        namespace: &str,
        handler: Arc<dyn NamespaceHandler>,
    ) -> Result<(), PubSubError> {
        let mut namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if namespaces.iter().any(|(n, _)| n == namespace) {
            return Err(PubSubError::NamespaceTaken(namespace.to_owned()));
        }
        namespaces.push((namespace.to_owned(), handler));
        Ok(())
    }

    fn deliver(
        &self,
        namespace: &str,
        target: Delivery,
        channel: &str,
        body: Value,
    ) -> Result<(), PubSubError> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedDelivery {
                namespace: namespace.to_owned(),
                target,
                channel: channel.to_owned(),
                body,
            });
        Ok(())
    }

    fn join(
        &self,
        namespace: &str,
        connection: &ConnectionId,
        topic: &str,
    ) -> Result<(), PubSubError> {
        self.joins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((namespace.to_owned(), connection.clone(), topic.to_owned()));
        Ok(())
    }
}

/// Scheduler that records jobs. Accepts rules of 5 to 7 fields.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<(String, String, Arc<dyn JobHandler>)>>,
}

impl RecordingScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// `(name, rule)` of every scheduled job, in order.
    pub fn scheduled(&self) -> Vec<(String, String)> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, r, _)| (n.clone(), r.clone()))
            .collect()
    }

    /// The job registered under `name`.
    pub fn job(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, j)| j.clone())
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, name: &str, rule: &str, job: Arc<dyn JobHandler>) -> Result<(), MountError> {
        let fields = rule.split_whitespace().count();
        if !(5..=7).contains(&fields) {
            return Err(MountError::InvalidRule {
                rule: rule.to_owned(),
                reason: format!("expected 5 to 7 fields, found {fields}"),
            });
        }
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_owned(), rule.to_owned(), job));
        Ok(())
    }
}
