//! Transport-neutral HTTP request and response values.
//!
//! Handlers never see the web framework's types. The serving surface
//! converts inbound requests into [`FunctionRequest`] and renders
//! [`FunctionResponse`] back out.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// One inbound HTTP request as handed to guards and route handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionRequest {
    /// Upper-case method, e.g. `GET`.
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// Decoded query parameters. The last value wins on repeats.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Headers with lower-case names.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Values captured by `:param` and `*` route segments.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Parsed body: JSON when the body is JSON, a form object for
    /// url-encoded forms, a string for other text, `null` when empty.
    #[serde(default)]
    pub body: Value,
}

impl FunctionRequest {
    /// Create a request with the given method and path and nothing else.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Builder: set a header. The name is stored lower-case.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Builder: set a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Builder: set the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Look up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Body of a [`FunctionResponse`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    /// No body.
    #[default]
    Empty,
    /// `application/json`.
    Json(Value),
    /// `text/plain`.
    Text(String),
    /// `text/html`.
    Html(String),
}

/// The response a handler produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    /// HTTP status code.
    pub status: u16,
    /// Extra response headers. They override the content type implied by the body.
    pub headers: BTreeMap<String, String>,
    /// The body.
    pub body: ResponseBody,
}

impl FunctionResponse {
    /// A JSON response.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Json(body),
        }
    }

    /// A JSON `{"message": ...}` response, the shape of every
    /// user-visible error and status payload.
    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "message": message.into() }))
    }

    /// A plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Text(body.into()),
        }
    }

    /// An HTML response.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Html(body.into()),
        }
    }

    /// A response with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Empty,
        }
    }

    /// Builder: add a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// The JSON body, if this is a JSON response.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Methods a route may be bound to.
const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Which request methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSpec {
    /// Any method. Declared as `all` or left unset.
    Any,
    /// Exactly this upper-case method.
    Only(String),
}

impl MethodSpec {
    /// Parse a declared method. Case-insensitive; absent, empty and `all`
    /// mean any method. Returns the rejected input for unknown methods.
    pub fn parse(declared: Option<&str>) -> Result<Self, String> {
        let raw = match declared.map(str::trim) {
            None | Some("") => return Ok(Self::Any),
            Some(raw) => raw,
        };
        if raw.eq_ignore_ascii_case("all") {
            return Ok(Self::Any);
        }
        let upper = raw.to_ascii_uppercase();
        if SUPPORTED_METHODS.contains(&upper.as_str()) {
            Ok(Self::Only(upper))
        } else {
            Err(raw.to_owned())
        }
    }

    /// Whether a request with this method is accepted.
    pub fn matches(&self, method: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(m) => m.eq_ignore_ascii_case(method),
        }
    }
}

impl std::fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("ALL"),
            Self::Only(m) => f.write_str(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_defaults_to_any() {
        assert_eq!(MethodSpec::parse(None), Ok(MethodSpec::Any));
        assert_eq!(MethodSpec::parse(Some("")), Ok(MethodSpec::Any));
        assert_eq!(MethodSpec::parse(Some("ALL")), Ok(MethodSpec::Any));
    }

    #[test]
    fn method_is_case_insensitive() {
        assert_eq!(
            MethodSpec::parse(Some("post")),
            Ok(MethodSpec::Only("POST".into()))
        );
        assert!(MethodSpec::Only("POST".into()).matches("post"));
        assert!(!MethodSpec::Only("POST".into()).matches("GET"));
    }

    #[test]
    fn unknown_method_rejected() {
        assert_eq!(MethodSpec::parse(Some("fetch")), Err("fetch".into()));
    }

    #[test]
    fn request_headers_are_case_insensitive() {
        let req = FunctionRequest::new("get", "/x").with_header("X-Token", "abc");
        assert_eq!(req.method, "GET");
        assert_eq!(req.header("x-token"), Some("abc"));
        assert_eq!(req.header("X-TOKEN"), Some("abc"));
    }

    #[test]
    fn message_response_shape() {
        let resp = FunctionResponse::message(404, "gone");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.json_body(), Some(&json!({"message": "gone"})));
    }
}
