//! In-process pub/sub with namespaces, topics and per-connection queues.

use faas_types::{ConnectionId, Delivery, NamespaceHandler, PubSub, PubSubError};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// One payload queued for a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    /// Channel the payload is sent on.
    pub channel: String,
    /// The payload.
    pub body: Value,
}

impl OutboundFrame {
    /// Wire form: `{"channel": ..., "data": {"body": ...}}`.
    pub fn to_json(&self) -> Value {
        json!({ "channel": self.channel, "data": { "body": self.body } })
    }
}

struct Namespace {
    handler: Arc<dyn NamespaceHandler>,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<OutboundFrame>>,
    topics: HashMap<String, HashSet<ConnectionId>>,
}

impl Namespace {
    fn send(&self, connection: &ConnectionId, frame: &OutboundFrame) {
        if let Some(queue) = self.connections.get(connection) {
            // A closed queue means the socket is going away.
            let _ = queue.send(frame.clone());
        }
    }
}

/// A [`PubSub`] whose connections are local queues.
///
/// A transport (the WebSocket endpoint) calls [`connect`](Self::connect),
/// forwards inbound messages to [`receive`](Self::receive) and drains the
/// returned queue to the client.
#[derive(Default)]
pub struct LocalPubSub {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl LocalPubSub {
    /// Create a transport with no namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `namespace` is open.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(namespace)
    }

    /// Names of open namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Register a new connection and return its id and outbound queue.
    pub fn connect(
        &self,
        namespace: &str,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<OutboundFrame>), PubSubError> {
        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| PubSubError::UnknownNamespace(namespace.to_owned()))?;
        let id = ConnectionId::new(uuid::Uuid::new_v4().to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        ns.connections.insert(id.clone(), tx);
        debug!(namespace, connection = %id, "connected");
        Ok((id, rx))
    }

    /// Drop a connection and its topic memberships.
    pub fn disconnect(&self, namespace: &str, connection: &ConnectionId) {
        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.connections.remove(connection);
            for members in ns.topics.values_mut() {
                members.remove(connection);
            }
            ns.topics.retain(|_, members| !members.is_empty());
            debug!(namespace, connection = %connection, "disconnected");
        }
    }

    /// Hand one inbound message to the namespace handler.
    pub async fn receive(
        &self,
        namespace: &str,
        connection: ConnectionId,
        channel: String,
        data: Value,
    ) -> Result<(), PubSubError> {
        let handler = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map(|ns| ns.handler.clone())
            .ok_or_else(|| PubSubError::UnknownNamespace(namespace.to_owned()))?;
        handler.on_message(connection, channel, data).await;
        Ok(())
    }
}

impl PubSub for LocalPubSub {
    fn open_namespace(
        &self,
        namespace: &str,
        handler: Arc<dyn NamespaceHandler>,
    ) -> Result<(), PubSubError> {
        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if namespaces.contains_key(namespace) {
            return Err(PubSubError::NamespaceTaken(namespace.to_owned()));
        }
        namespaces.insert(
            namespace.to_owned(),
            Namespace {
                handler,
                connections: HashMap::new(),
                topics: HashMap::new(),
            },
        );
        Ok(())
    }

    fn deliver(
        &self,
        namespace: &str,
        target: Delivery,
        channel: &str,
        body: Value,
    ) -> Result<(), PubSubError> {
        let namespaces = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces
            .get(namespace)
            .ok_or_else(|| PubSubError::UnknownNamespace(namespace.to_owned()))?;
        let frame = OutboundFrame {
            channel: channel.to_owned(),
            body,
        };
        match target {
            Delivery::Connection(id) => {
                if !ns.connections.contains_key(&id) {
                    return Err(PubSubError::UnknownConnection(id.to_string()));
                }
                ns.send(&id, &frame);
            }
            Delivery::Namespace { except } => {
                for id in ns.connections.keys() {
                    if except.as_ref() != Some(id) {
                        ns.send(id, &frame);
                    }
                }
            }
            Delivery::Topic { topic, except } => {
                for id in ns.topics.get(&topic).into_iter().flatten() {
                    if except.as_ref() != Some(id) {
                        ns.send(id, &frame);
                    }
                }
            }
        }
        Ok(())
    }

    fn join(
        &self,
        namespace: &str,
        connection: &ConnectionId,
        topic: &str,
    ) -> Result<(), PubSubError> {
        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| PubSubError::UnknownNamespace(namespace.to_owned()))?;
        if !ns.connections.contains_key(connection) {
            return Err(PubSubError::UnknownConnection(connection.to_string()));
        }
        ns.topics
            .entry(topic.to_owned())
            .or_default()
            .insert(connection.clone());
        Ok(())
    }
}
