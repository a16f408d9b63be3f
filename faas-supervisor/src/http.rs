//! The supervisor's HTTP face: `/deploy`, and a reverse proxy for the rest.

use crate::error::SupervisorError;
use crate::supervisor::Supervisor;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Header carrying the application id.
pub const APPLICATION_ID_HEADER: &str = "bfast-application-id";

/// Query parameter carrying the application id.
pub const APPLICATION_ID_PARAM: &str = "appId";

/// Largest request body forwarded to the engine.
const PROXY_BODY_LIMIT: usize = 8 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Clone)]
struct AppState {
    supervisor: Arc<Supervisor>,
    client: reqwest::Client,
}

/// Build the supervisor application.
pub fn router(supervisor: Arc<Supervisor>) -> Router {
    let state = AppState {
        supervisor,
        client: reqwest::Client::new(),
    };
    Router::new()
        .route("/deploy", any(deploy))
        .fallback(proxy)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The application id presented with a request: the header first, then
/// the query parameter.
pub fn credential(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(value) = headers
        .get(APPLICATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return Some(value.to_owned());
    }
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, _)| key == APPLICATION_ID_PARAM)
        .map(|(_, value)| value.into_owned())
}

async fn deploy(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>, SupervisorError> {
    let credential = credential(&headers, &uri);
    state.supervisor.deploy(credential.as_deref()).await?;
    Ok(Json(json!({"message": "functions deployed"})))
}

async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "proxy refused");
            e.into_response()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

async fn forward(state: &AppState, request: Request) -> Result<Response, SupervisorError> {
    let supervisor = &state.supervisor;
    if supervisor.config().proxy_requires_auth {
        let presented = credential(request.headers(), request.uri());
        supervisor.authorize(presented.as_deref())?;
    }
    let addr = supervisor
        .engine_address()
        .await
        .ok_or(SupervisorError::NotRunning)?;

    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let url = format!("http://{addr}{target}");
    let body = to_bytes(body, PROXY_BODY_LIMIT)
        .await
        .map_err(|e| SupervisorError::Other(Box::new(e)))?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            warn!(%url, error = %e, "engine did not answer");
            SupervisorError::Upstream(e.to_string())
        })?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
