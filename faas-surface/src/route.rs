//! Route patterns, guards and request dispatch.

use faas_types::{
    FunctionRequest, FunctionResponse, GuardHandler, GuardOutcome, HandlerError, HttpRouter,
    MethodSpec, MountError, RequestHandler,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Name under which a trailing `*` segment is captured.
pub const WILDCARD_PARAM: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// An express-style path pattern: literal segments, `:name` segments and an
/// optional trailing `*`. Literal segments match case-insensitively and a
/// trailing slash on the request is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Split a path into its non-empty segments. Routes and guards both see a
/// request path through this.
fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn invalid(path: &str, reason: &str) -> MountError {
    MountError::InvalidPath {
        path: path.to_owned(),
        reason: reason.to_owned(),
    }
}

impl RoutePattern {
    /// Parse a pattern. It must start with `/`.
    pub fn parse(path: &str) -> Result<Self, MountError> {
        if !path.starts_with('/') {
            return Err(invalid(path, "must start with '/'"));
        }
        let parts = path_segments(path);
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if *part == "*" {
                if i + 1 != parts.len() {
                    return Err(invalid(path, "'*' is only allowed as the last segment"));
                }
                Segment::Wildcard
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid(path, "parameter segment needs a name"));
                }
                Segment::Param(name.to_owned())
            } else {
                Segment::Literal((*part).to_owned())
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: path.to_owned(),
            segments,
        })
    }

    /// The pattern as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        self.matches_segments(&path_segments(path))
    }

    fn matches_segments(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    params.insert(WILDCARD_PARAM.to_owned(), parts.get(i..)?.join("/"));
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    if !parts.get(i)?.eq_ignore_ascii_case(literal) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*parts.get(i)?).to_owned());
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(params)
    }
}

/// Whether a guard attached at `prefix` covers `path`. Compared segment by
/// segment with the same rules as route literals: `/api` covers `/api`,
/// `/API/x` and `//api/x` but not `/apis`.
pub fn guard_covers(prefix: &str, path: &str) -> bool {
    covers(&path_segments(prefix), &path_segments(path))
}

fn covers(prefix: &[&str], parts: &[&str]) -> bool {
    prefix.len() <= parts.len()
        && prefix
            .iter()
            .zip(parts)
            .all(|(want, got)| want.eq_ignore_ascii_case(got))
}

struct GuardEntry {
    prefix: String,
    handler: Arc<dyn GuardHandler>,
}

struct RouteEntry {
    pattern: RoutePattern,
    method: MethodSpec,
    handler: Arc<dyn RequestHandler>,
}

impl RouteEntry {
    fn accepts(&self, method: &str) -> bool {
        self.method.matches(method) || (method == "HEAD" && self.method.matches("GET"))
    }
}

/// An [`HttpRouter`] that dispatches [`FunctionRequest`]s itself.
///
/// Guards run in attach order for every request they cover, matched or
/// not; the first route whose pattern and method match handles it.
#[derive(Default)]
pub struct RouteTable {
    guards: Vec<GuardEntry>,
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached guards.
    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    /// Number of bound routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Run guards and the matching route.
    pub async fn dispatch(&self, mut request: FunctionRequest) -> FunctionResponse {
        let path = request.path.clone();
        let parts = path_segments(&path);
        for guard in &self.guards {
            if !covers(&path_segments(&guard.prefix), &parts) {
                continue;
            }
            match guard.handler.check(&mut request).await {
                Ok(GuardOutcome::Continue) => {}
                Ok(GuardOutcome::Respond(response)) => return response,
                Err(error) => return error_response(&request, error),
            }
        }

        let matched = self.routes.iter().find_map(|route| {
            if !route.accepts(&request.method) {
                return None;
            }
            route.pattern.matches_segments(&parts).map(|p| (route, p))
        });
        let Some((route, params)) = matched else {
            return not_found(&request.path);
        };
        request.params = params;
        let context = (request.method.clone(), request.path.clone());
        match route.handler.handle(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(method = %context.0, path = %context.1, error = %error, "function failed");
                handler_failure(error)
            }
        }
    }
}

fn handler_failure(error: HandlerError) -> FunctionResponse {
    let status = match error {
        HandlerError::Timeout(_) => 504,
        _ => 500,
    };
    FunctionResponse::message(status, error.to_string())
}

fn error_response(request: &FunctionRequest, error: HandlerError) -> FunctionResponse {
    warn!(method = %request.method, path = %request.path, error = %error, "guard failed");
    handler_failure(error)
}

/// The 404 for a path no route matched.
pub fn not_found(path: &str) -> FunctionResponse {
    let function = path
        .strip_prefix("/functions/")
        .and_then(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty());
    match function {
        Some(name) => FunctionResponse::message(404, format!("{name} function is not available")),
        None => FunctionResponse::message(404, format!("{path} not found")),
    }
}

impl HttpRouter for RouteTable {
    fn guard(&mut self, prefix: &str, handler: Arc<dyn GuardHandler>) -> Result<(), MountError> {
        if !prefix.starts_with('/') {
            return Err(invalid(prefix, "must start with '/'"));
        }
        self.guards.push(GuardEntry {
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
        let pattern = RoutePattern::parse(path)?;
        self.routes.push(RouteEntry {
            pattern,
            method,
            handler,
        });
        Ok(())
    }
}
