//! Function descriptors and their classification into roles.

use crate::handler::{EventHandler, GuardHandler, JobHandler, RequestHandler};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Keys of executable fields. Never exposed outside the engine.
pub const EXECUTABLE_FIELDS: &[&str] = &["onRequest", "onGuard", "onEvent", "onJob"];

/// One user-authored function: optional bindings, optional handlers and
/// opaque documentation fields.
///
/// Which fields are present decides the roles (see [`capabilities`]).
/// A descriptor with no complete role is inert: it stays in the catalog
/// but nothing is mounted for it.
///
/// [`capabilities`]: FunctionDescriptor::capabilities
#[derive(Clone, Default)]
pub struct FunctionDescriptor {
    /// HTTP path, or the guard prefix when the descriptor is a guard.
    pub path: Option<String>,
    /// HTTP method. Unset means any.
    pub method: Option<String>,
    /// Event channel name.
    pub name: Option<String>,
    /// Cron rule for jobs.
    pub rule: Option<String>,
    /// HTTP request handler.
    pub on_request: Option<Arc<dyn RequestHandler>>,
    /// Guard handler.
    pub on_guard: Option<Arc<dyn GuardHandler>>,
    /// Event handler.
    pub on_event: Option<Arc<dyn EventHandler>>,
    /// Job handler.
    pub on_job: Option<Arc<dyn JobHandler>>,
    /// Documentation fields (`description`, `requestSample`, ...). Never executed.
    pub docs: Map<String, Value>,
}

/// A role a descriptor can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Request guard.
    Guard,
    /// HTTP route.
    Http,
    /// Real-time event channel.
    Event,
    /// Scheduled job.
    Job,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Guard => "guard",
            Self::Http => "http",
            Self::Event => "event",
            Self::Job => "job",
        })
    }
}

/// One role of a descriptor with the bindings it needs, resolved.
#[derive(Clone)]
pub enum Capability {
    /// Attach as a guard at `prefix`.
    Guard {
        /// Normalized prefix, always starting with `/`.
        prefix: String,
        /// The guard.
        handler: Arc<dyn GuardHandler>,
    },
    /// Bind as an HTTP route.
    Http {
        /// Declared path or `/functions/{name}`.
        path: String,
        /// Declared method, unparsed.
        method: Option<String>,
        /// The handler.
        handler: Arc<dyn RequestHandler>,
    },
    /// Open an event channel.
    Event {
        /// Namespace and channel name.
        channel: String,
        /// The handler.
        handler: Arc<dyn EventHandler>,
    },
    /// Schedule a job.
    Job {
        /// Cron rule, unparsed.
        rule: String,
        /// The job.
        handler: Arc<dyn JobHandler>,
    },
}

impl Capability {
    /// The role this capability fills.
    pub fn role(&self) -> Role {
        match self {
            Self::Guard { .. } => Role::Guard,
            Self::Http { .. } => Role::Http,
            Self::Event { .. } => Role::Event,
            Self::Job { .. } => Role::Job,
        }
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guard { prefix, .. } => f.debug_struct("Guard").field("prefix", prefix).finish(),
            Self::Http { path, method, .. } => f
                .debug_struct("Http")
                .field("path", path)
                .field("method", method)
                .finish(),
            Self::Event { channel, .. } => {
                f.debug_struct("Event").field("channel", channel).finish()
            }
            Self::Job { rule, .. } => f.debug_struct("Job").field("rule", rule).finish(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl FunctionDescriptor {
    /// Classify this descriptor, exported as `export_name`, into its roles.
    ///
    /// - guard: `onGuard`; prefix is `path` when it starts with `/`, else `/`
    /// - http: `onRequest`; path defaults to `/functions/{export_name}`
    /// - event: `onEvent` and a non-empty `name`
    /// - job: `onJob` and a non-empty `rule`
    pub fn capabilities(&self, export_name: &str) -> Vec<Capability> {
        let mut caps = Vec::new();
        if let Some(handler) = &self.on_guard {
            let prefix = match non_empty(&self.path) {
                Some(p) if p.starts_with('/') => p.to_owned(),
                _ => "/".to_owned(),
            };
            caps.push(Capability::Guard {
                prefix,
                handler: handler.clone(),
            });
        }
        if let Some(handler) = &self.on_request {
            let path = non_empty(&self.path)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("/functions/{export_name}"));
            caps.push(Capability::Http {
                path,
                method: self.method.clone(),
                handler: handler.clone(),
            });
        }
        if let (Some(handler), Some(channel)) = (&self.on_event, non_empty(&self.name)) {
            caps.push(Capability::Event {
                channel: channel.to_owned(),
                handler: handler.clone(),
            });
        }
        if let (Some(handler), Some(rule)) = (&self.on_job, non_empty(&self.rule)) {
            caps.push(Capability::Job {
                rule: rule.to_owned(),
                handler: handler.clone(),
            });
        }
        caps
    }

    /// The roles this descriptor plays, in mount order.
    pub fn roles(&self, export_name: &str) -> Vec<Role> {
        self.capabilities(export_name)
            .iter()
            .map(Capability::role)
            .collect()
    }

    /// True when no role is complete.
    pub fn is_inert(&self) -> bool {
        self.capabilities("").is_empty()
    }

    /// Everything except executable fields, as a JSON object.
    pub fn sanitized(&self) -> Value {
        let mut out = Map::new();
        for (key, value) in &self.docs {
            if !EXECUTABLE_FIELDS.contains(&key.as_str()) {
                out.insert(key.clone(), value.clone());
            }
        }
        let bindings = [
            ("path", &self.path),
            ("method", &self.method),
            ("name", &self.name),
            ("rule", &self.rule),
        ];
        for (key, value) in bindings {
            if let Some(v) = value {
                out.insert(key.to_owned(), Value::String(v.clone()));
            }
        }
        Value::Object(out)
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("on_request", &self.on_request.is_some())
            .field("on_guard", &self.on_guard.is_some())
            .field("on_event", &self.on_event.is_some())
            .field("on_job", &self.on_job.is_some())
            .field("docs", &self.docs)
            .finish()
    }
}
