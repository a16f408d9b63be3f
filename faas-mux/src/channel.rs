//! The namespace handler behind an event descriptor.

use async_trait::async_trait;
use faas_types::{
    ConnectionId, EventHandler, EventRequest, EventResponse, NamespaceHandler, PubSub,
};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Feeds messages on one channel to one event handler.
///
/// Holds the transport weakly: the transport owns this handler, so a
/// strong reference would keep both alive forever.
pub(crate) struct EventChannel {
    channel: String,
    handler: Arc<dyn EventHandler>,
    pubsub: Weak<dyn PubSub>,
}

impl EventChannel {
    pub(crate) fn new(
        channel: &str,
        handler: Arc<dyn EventHandler>,
        pubsub: &Arc<dyn PubSub>,
    ) -> Self {
        Self {
            channel: channel.to_owned(),
            handler,
            pubsub: Arc::downgrade(pubsub),
        }
    }
}

#[async_trait]
impl NamespaceHandler for EventChannel {
    async fn on_message(&self, connection: ConnectionId, channel: String, data: Value) {
        if channel != self.channel {
            debug!(namespace = %self.channel, channel = %channel, "no handler for channel");
            return;
        }
        let Some(pubsub) = self.pubsub.upgrade() else {
            return;
        };
        let request = EventRequest::from_data(&data);
        let response = EventResponse::new(pubsub, &self.channel, channel, connection.clone());
        if let Err(error) = self.handler.on_event(request, response).await {
            warn!(
                namespace = %self.channel,
                connection = %connection,
                error = %error,
                "event handler failed"
            );
        }
    }
}
