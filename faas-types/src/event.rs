//! Real-time event request and the per-invocation response capability.

use crate::error::PubSubError;
use crate::id::ConnectionId;
use crate::surface::PubSub;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Payload handed to an event handler: exactly `{auth, body}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    /// Credentials or identity the client attached.
    #[serde(default)]
    pub auth: Value,
    /// The message body.
    #[serde(default)]
    pub body: Value,
}

impl EventRequest {
    /// Split a client `data` value into auth and body. Missing keys are `null`.
    pub fn from_data(data: &Value) -> Self {
        Self {
            auth: data.get("auth").cloned().unwrap_or(Value::Null),
            body: data.get("body").cloned().unwrap_or(Value::Null),
        }
    }
}

/// Who receives a delivered payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// One connection.
    Connection(ConnectionId),
    /// Every connection in the namespace, optionally minus one.
    Namespace {
        /// Connection to leave out.
        except: Option<ConnectionId>,
    },
    /// Every member of a topic, optionally minus one.
    Topic {
        /// Topic name.
        topic: String,
        /// Connection to leave out.
        except: Option<ConnectionId>,
    },
}

/// The event analogue of an HTTP response object.
///
/// Built once per handler invocation, bound to the sending connection and
/// the channel the message arrived on. Every send goes out on that channel.
pub struct EventResponse {
    pubsub: Arc<dyn PubSub>,
    namespace: String,
    channel: String,
    connection: ConnectionId,
}

impl EventResponse {
    /// Bind a response to one sender on one channel.
    pub fn new(
        pubsub: Arc<dyn PubSub>,
        namespace: impl Into<String>,
        channel: impl Into<String>,
        connection: ConnectionId,
    ) -> Self {
        Self {
            pubsub,
            namespace: namespace.into(),
            channel: channel.into(),
            connection,
        }
    }

    /// Id of the connection that sent the message.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection
    }

    /// Namespace the message arrived in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Send to the sender only.
    pub fn emit(&self, body: Value) -> Result<(), PubSubError> {
        self.send(Delivery::Connection(self.connection.clone()), body)
    }

    /// Send to every other connection in the namespace.
    pub fn broadcast(&self, body: Value) -> Result<(), PubSubError> {
        self.send(
            Delivery::Namespace {
                except: Some(self.connection.clone()),
            },
            body,
        )
    }

    /// Send to every connection in the namespace, sender included.
    pub fn announce(&self, body: Value) -> Result<(), PubSubError> {
        self.send(Delivery::Namespace { except: None }, body)
    }

    /// Send to one specific connection.
    pub fn emit_to(&self, connection: &ConnectionId, body: Value) -> Result<(), PubSubError> {
        self.send(Delivery::Connection(connection.clone()), body)
    }

    /// Operations scoped to a topic.
    pub fn topic(&self, topic: impl Into<String>) -> TopicHandle<'_> {
        TopicHandle {
            response: self,
            topic: topic.into(),
        }
    }

    fn send(&self, target: Delivery, body: Value) -> Result<(), PubSubError> {
        self.pubsub
            .deliver(&self.namespace, target, &self.channel, body)
    }
}

impl std::fmt::Debug for EventResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventResponse")
            .field("namespace", &self.namespace)
            .field("channel", &self.channel)
            .field("connection", &self.connection)
            .finish()
    }
}

/// Topic-scoped sends, from [`EventResponse::topic`].
pub struct TopicHandle<'a> {
    response: &'a EventResponse,
    topic: String,
}

impl TopicHandle<'_> {
    /// Add the sender to the topic.
    pub fn join(&self) -> Result<(), PubSubError> {
        self.response.pubsub.join(
            &self.response.namespace,
            &self.response.connection,
            &self.topic,
        )
    }

    /// Send to every member of the topic, sender included.
    pub fn announce(&self, body: Value) -> Result<(), PubSubError> {
        self.response.send(
            Delivery::Topic {
                topic: self.topic.clone(),
                except: None,
            },
            body,
        )
    }

    /// Send to every member of the topic except the sender.
    pub fn broadcast(&self, body: Value) -> Result<(), PubSubError> {
        self.response.send(
            Delivery::Topic {
                topic: self.topic.clone(),
                except: Some(self.response.connection.clone()),
            },
            body,
        )
    }
}
