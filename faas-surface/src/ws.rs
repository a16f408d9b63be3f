//! WebSocket transport for [`LocalPubSub`] namespaces: `GET /ws/{namespace}`.
//!
//! Client frames are `{"channel": ..., "data": {"auth": ..., "body": ...}}`;
//! server frames are `{"channel": ..., "data": {"body": ...}}`.

use crate::convert::into_response;
use crate::pubsub::LocalPubSub;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use faas_types::FunctionResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ClientFrame {
    channel: String,
    #[serde(default)]
    data: Value,
}

pub(crate) async fn upgrade(
    State(pubsub): State<Arc<LocalPubSub>>,
    Path(namespace): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !pubsub.has_namespace(&namespace) {
        return into_response(FunctionResponse::message(
            404,
            format!("{namespace} namespace not found"),
        ));
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.on_upgrade(move |socket| session(socket, pubsub, namespace))
}

async fn session(socket: WebSocket, pubsub: Arc<LocalPubSub>, namespace: String) {
    let (id, mut outbound) = match pubsub.connect(&namespace) {
        Ok(pair) => pair,
        Err(e) => {
            warn!(namespace = %namespace, error = %e, "rejecting socket");
            return;
        }
    };
    info!(namespace = %namespace, connection = %id, "socket connected");

    let (mut sender, mut receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = frame.to_json().to_string();
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(message) = receiver.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let frame: ClientFrame = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(namespace = %namespace, connection = %id, error = %e, "ignoring malformed frame");
                continue;
            }
        };
        if let Err(e) = pubsub
            .receive(&namespace, id.clone(), frame.channel, frame.data)
            .await
        {
            warn!(namespace = %namespace, connection = %id, error = %e, "message not delivered");
        }
    }

    pubsub.disconnect(&namespace, &id);
    writer.abort();
    info!(namespace = %namespace, connection = %id, "socket closed");
}
