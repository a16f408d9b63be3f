//! A directory of module files, resolved, mounted and served.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use faas_mux::mount;
use faas_resolver::Resolver;
use faas_surface::ServingSurface;
use serde_json::{Value, json};
use std::path::Path;
use tower::ServiceExt;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn functions_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "api.fn.json",
        &json!({
            "auth": {
                "path": "/api",
                "onGuard": "grep -q '\"x-token\":\"let-me-in\"' || { echo denied >&2; exit 1; }"
            }
        })
        .to_string(),
    );
    write(
        dir.path(),
        "items.fn.yaml",
        "items:\n  path: /api/items/:id\n  method: get\n  description: One item\n  onRequest: \"printf '{\\\"item\\\": \\\"widget\\\"}'\"\n",
    );
    write(
        dir.path(),
        "room.fn.toml",
        "[room]\nname = \"room\"\nonEvent = \"cat\"\n",
    );
    write(
        dir.path(),
        "specs/items.fn.json",
        &json!({"items": {"description": "ignored"}}).to_string(),
    );
    dir
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, String, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, bytes.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn resolve_mount_and_serve() {
    let dir = functions_dir();
    let resolution = Resolver::default()
        .resolve(&[dir.path()], dir.path().join("bfast.json"))
        .await
        .unwrap();
    assert!(resolution.failures.is_empty(), "{:?}", resolution.failures);
    let catalog = &resolution.catalog;
    assert_eq!(
        catalog.get("items").unwrap().docs.get("description"),
        Some(&json!("One item"))
    );

    let mut serving = ServingSurface::new();
    let report = mount(catalog, serving.surface());
    assert!(report.failures.is_empty());
    assert_eq!(report.guards.len(), 1);
    assert_eq!(report.events.len(), 1);
    let app = serving.into_router(None);

    // ━━━ Guards run first ━━━
    let (status, _, _) = send(&app, get("/api/items/7")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/items/7")
        .header("x-token", "let-me-in")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"item": "widget"}));

    // ━━━ Built-ins ━━━
    let (status, _, body) = send(&app, get("/functions-health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"message": "running"}));

    let (status, _, body) = send(&app, get("/functions-all?format=json")).await;
    assert_eq!(status, StatusCode::OK);
    let listing: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing["items"]["path"], "/api/items/:id");
    for (_, entry) in listing.as_object().unwrap() {
        for executable in ["onRequest", "onGuard", "onEvent", "onJob"] {
            assert!(entry.get(executable).is_none());
        }
    }

    let (status, content_type, body) = send(&app, get("/functions-all")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/html"));
    assert!(String::from_utf8(body).unwrap().contains("One item"));
}

#[tokio::test]
async fn events_reach_the_handler_and_answer_the_sender() {
    let dir = functions_dir();
    let resolution = Resolver::default()
        .resolve(&[dir.path()], dir.path().join("bfast.json"))
        .await
        .unwrap();
    let mut serving = ServingSurface::new();
    mount(&resolution.catalog, serving.surface());
    let pubsub = serving.pubsub().clone();

    let (id, mut outbound) = pubsub.connect("room").unwrap();
    pubsub
        .receive(
            "room",
            id.clone(),
            "room".into(),
            json!({"auth": "token", "body": {"n": 1}}),
        )
        .await
        .unwrap();

    let frame = outbound.recv().await.unwrap();
    assert_eq!(frame.channel, "room");
    assert_eq!(frame.body["auth"], "token");
    assert_eq!(frame.body["body"], json!({"n": 1}));
    assert_eq!(frame.body["connection"], id.as_str());
}
