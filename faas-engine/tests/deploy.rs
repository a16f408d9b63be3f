//! Deploy cycles end to end, with real module files.

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use faas_engine::{DeploymentController, EngineError, EngineOptions};
use faas_resolver::Resolver;
use faas_source::{SourceAcquirer, SourcePlan};
use faas_types::{LoadError, ModuleExports, ModuleLoader};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

fn controller(work_dir: &Path) -> DeploymentController {
    DeploymentController::new(SourceAcquirer::new(work_dir), Resolver::default())
}

fn functions_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("hello.fn.json"),
        json!({
            "hello": {"path": "/hello", "method": "get", "onRequest": "printf hi"},
            "notes": {"description": "documentation only"}
        })
        .to_string(),
    )
    .unwrap();
    dir
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

// ━━━ Cycles ━━━

#[tokio::test]
async fn local_deploy_serves_functions_and_builtins() {
    let dir = functions_dir();
    let deployment = controller(dir.path())
        .deploy(
            &SourcePlan::Local {
                dir: dir.path().to_path_buf(),
            },
            &EngineOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(deployment.source_dir, dir.path());
    assert!(deployment.catalog().contains("hello"));
    assert_eq!(deployment.report.inert.len(), 1);
    assert!(deployment.report.failures.is_empty());

    let (status, body) = get(deployment.app.clone(), "/hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hi");

    let (status, body) = get(deployment.app.clone(), "/functions-health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"message": "running"}));

    let (status, _) = get(deployment.app, "/functions/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_acquisition_mounts_nothing() {
    let dir = functions_dir();
    let err = controller(dir.path())
        .deploy(
            &SourcePlan::Git {
                url: "not a url".into(),
                username: None,
                token: None,
            },
            &EngineOptions::default(),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Acquisition(_)), "{err}");
    assert!(dir.path().join("hello.fn.json").exists());
}

#[tokio::test]
async fn missing_directory_is_a_resolution_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = controller(dir.path())
        .load(dir.path().join("absent"), &EngineOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Resolution(_)), "{err}");
}

/// Records when each load starts and ends, taking a while in between.
#[derive(Default)]
struct SlowLoader {
    events: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl ModuleLoader for SlowLoader {
    fn suffixes(&self) -> &[&'static str] {
        &[".fn.slow"]
    }

    async fn load(&self, _path: &Path) -> Result<ModuleExports, LoadError> {
        self.events.lock().unwrap().push("enter");
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.events.lock().unwrap().push("exit");
        Ok(ModuleExports::new())
    }
}

#[tokio::test]
async fn concurrent_cycles_never_overlap() {
    let dir = functions_dir();
    std::fs::write(dir.path().join("wait.fn.slow"), "").unwrap();
    let loader = Arc::new(SlowLoader::default());
    let controller = DeploymentController::new(
        SourceAcquirer::new(dir.path()),
        Resolver::default().with_loader(loader.clone()),
    );
    let options = EngineOptions::default();

    let (a, b) = tokio::join!(
        controller.load(dir.path(), &options),
        controller.load(dir.path(), &options)
    );
    assert_eq!(a.unwrap().catalog().len(), b.unwrap().catalog().len());
    assert_eq!(
        *loader.events.lock().unwrap(),
        vec!["enter", "exit", "enter", "exit"]
    );
}

// ━━━ Assets and serving ━━━

#[tokio::test]
async fn assets_directory_is_picked_up() {
    let dir = functions_dir();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets/site.css"), "body{}").unwrap();
    let deployment = controller(dir.path())
        .load(dir.path(), &EngineOptions::default())
        .await
        .unwrap();
    let (status, body) = get(deployment.app, "/assets/site.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"body{}");
}

#[tokio::test]
async fn serve_answers_until_shutdown() {
    let dir = functions_dir();
    let deployment = controller(dir.path())
        .load(dir.path(), &EngineOptions::default())
        .await
        .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(deployment.serve(listener, async {
        let _ = stopped.await;
    }));

    let body: Value = reqwest::get(format!("http://{addr}/functions-health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "running");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
