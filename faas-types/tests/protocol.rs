//! Acceptance tests for the faas-types protocol crate.
//!
//! Tests cover:
//! - Trait object safety (Arc<dyn Trait> is Send + Sync)
//! - Descriptor classification into roles
//! - Sanitization of executable fields
//! - EventResponse targeting

#![cfg(feature = "test-utils")]

use faas_types::test_utils::*;
use faas_types::*;
use serde_json::json;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Object Safety
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn _assert_send_sync<T: Send + Sync>() {}

#[test]
fn handler_traits_are_object_safe_send_sync() {
    _assert_send_sync::<Arc<dyn RequestHandler>>();
    _assert_send_sync::<Arc<dyn GuardHandler>>();
    _assert_send_sync::<Arc<dyn EventHandler>>();
    _assert_send_sync::<Arc<dyn JobHandler>>();
}

#[test]
fn surface_traits_are_object_safe_send_sync() {
    _assert_send_sync::<Arc<dyn PubSub>>();
    _assert_send_sync::<Arc<dyn Scheduler>>();
    _assert_send_sync::<Arc<dyn NamespaceHandler>>();
    _assert_send_sync::<Arc<dyn ModuleLoader>>();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn ok_handler() -> Arc<dyn RequestHandler> {
    request_fn(|_req| async { Ok(FunctionResponse::empty(200)) })
}

fn ok_event() -> Arc<dyn EventHandler> {
    event_fn(|_req, _res| async { Ok(()) })
}

fn ok_job() -> Arc<dyn JobHandler> {
    job_fn(|| async { Ok(()) })
}

#[test]
fn descriptor_without_handlers_is_inert() {
    let mut d = FunctionDescriptor::default();
    d.path = Some("/x".into());
    d.docs.insert("description".into(), json!("nothing to run"));
    assert!(d.is_inert());
    assert!(d.capabilities("x").is_empty());
}

#[test]
fn http_path_defaults_to_functions_name() {
    let d = FunctionDescriptor {
        on_request: Some(ok_handler()),
        ..Default::default()
    };
    match d.capabilities("hello").as_slice() {
        [Capability::Http { path, method, .. }] => {
            assert_eq!(path, "/functions/hello");
            assert!(method.is_none());
        }
        other => panic!("unexpected capabilities: {other:?}"),
    }
}

#[test]
fn guard_prefix_falls_back_to_root() {
    for declared in [None, Some(""), Some("admin")] {
        let d = FunctionDescriptor {
            path: declared.map(String::from),
            on_guard: Some(guard_fn(|_| GuardOutcome::Continue)),
            ..Default::default()
        };
        match d.capabilities("g").as_slice() {
            [Capability::Guard { prefix, .. }] => assert_eq!(prefix, "/"),
            other => panic!("unexpected capabilities: {other:?}"),
        }
    }

    let d = FunctionDescriptor {
        path: Some("/admin".into()),
        on_guard: Some(guard_fn(|_| GuardOutcome::Continue)),
        ..Default::default()
    };
    assert!(matches!(
        d.capabilities("g").as_slice(),
        [Capability::Guard { prefix, .. }] if prefix == "/admin"
    ));
}

#[test]
fn event_and_job_need_both_fields() {
    let missing_name = FunctionDescriptor {
        on_event: Some(ok_event()),
        ..Default::default()
    };
    assert!(missing_name.is_inert());

    let missing_rule = FunctionDescriptor {
        on_job: Some(ok_job()),
        ..Default::default()
    };
    assert!(missing_rule.is_inert());

    let both = FunctionDescriptor {
        name: Some("room".into()),
        on_event: Some(ok_event()),
        rule: Some("* * * * *".into()),
        on_job: Some(ok_job()),
        ..Default::default()
    };
    assert_eq!(both.roles("x"), vec![Role::Event, Role::Job]);
}

#[test]
fn one_descriptor_can_hold_every_role() {
    let d = FunctionDescriptor {
        path: Some("/api".into()),
        name: Some("room".into()),
        rule: Some("0 * * * *".into()),
        on_request: Some(ok_handler()),
        on_guard: Some(guard_fn(|_| GuardOutcome::Continue)),
        on_event: Some(ok_event()),
        on_job: Some(ok_job()),
        ..Default::default()
    };
    assert_eq!(
        d.roles("all"),
        vec![Role::Guard, Role::Http, Role::Event, Role::Job]
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sanitization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn sanitized_drops_executable_fields() {
    let mut d = FunctionDescriptor {
        path: Some("/hello".into()),
        method: Some("get".into()),
        on_request: Some(ok_handler()),
        ..Default::default()
    };
    d.docs.insert("description".into(), json!("says hello"));
    // A doc field that shadows an executable key never leaks.
    d.docs.insert("onRequest".into(), json!("echo secret"));

    let value = d.sanitized();
    assert_eq!(
        value,
        json!({"path": "/hello", "method": "get", "description": "says hello"})
    );
}

#[test]
fn catalog_sanitized_is_keyed_by_name() {
    let mut catalog = FunctionCatalog::new();
    catalog.insert(
        "hello",
        FunctionDescriptor {
            on_request: Some(ok_handler()),
            ..Default::default()
        },
    );
    assert_eq!(catalog.sanitized(), json!({"hello": {}}));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventResponse targeting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn event_response_targets() {
    let pubsub = Arc::new(RecordingPubSub::new());
    let me = ConnectionId::new("c1");
    let other = ConnectionId::new("c2");
    let response = EventResponse::new(pubsub.clone(), "room", "room", me.clone());

    response.emit(json!(1)).unwrap();
    response.broadcast(json!(2)).unwrap();
    response.announce(json!(3)).unwrap();
    response.emit_to(&other, json!(4)).unwrap();
    response.topic("blue").join().unwrap();
    response.topic("blue").announce(json!(5)).unwrap();
    response.topic("blue").broadcast(json!(6)).unwrap();

    let targets: Vec<Delivery> = pubsub.deliveries().into_iter().map(|d| d.target).collect();
    assert_eq!(
        targets,
        vec![
            Delivery::Connection(me.clone()),
            Delivery::Namespace {
                except: Some(me.clone())
            },
            Delivery::Namespace { except: None },
            Delivery::Connection(other),
            Delivery::Topic {
                topic: "blue".into(),
                except: None
            },
            Delivery::Topic {
                topic: "blue".into(),
                except: Some(me.clone())
            },
        ]
    );
    assert_eq!(
        pubsub.joins(),
        vec![("room".to_owned(), me, "blue".to_owned())]
    );
    assert!(pubsub.deliveries().iter().all(|d| d.channel == "room"));
}

#[test]
fn event_request_from_data_keeps_exact_shape() {
    let req = EventRequest::from_data(&json!({"auth": {"token": "t"}, "body": {"n": 1}, "x": 9}));
    assert_eq!(
        serde_json::to_value(&req).unwrap(),
        json!({"auth": {"token": "t"}, "body": {"n": 1}})
    );
}
