//! Conversion between axum requests/responses and the function types.

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use faas_types::{FunctionRequest, FunctionResponse, ResponseBody};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Largest request body accepted, in bytes.
pub const BODY_LIMIT: usize = 8 * 1024 * 1024;

fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, FunctionResponse> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains("json") {
        return serde_json::from_slice(bytes)
            .map_err(|e| FunctionResponse::message(400, format!("invalid JSON body: {e}")));
    }
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let form: Map<String, Value> = url::form_urlencoded::parse(bytes)
            .into_owned()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        return Ok(Value::Object(form));
    }
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Read an axum request into a [`FunctionRequest`]. Failures come back as
/// the response to send instead.
pub async fn into_function_request(request: Request) -> Result<FunctionRequest, FunctionResponse> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|_| FunctionResponse::message(413, "request body too large"))?;

    let query: BTreeMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = parse_body(content_type, &bytes)?;

    let mut request = FunctionRequest::new(parts.method.as_str(), parts.uri.path());
    request.query = query;
    request.headers = headers;
    request.body = body;
    Ok(request)
}

/// Render a [`FunctionResponse`] as an axum response.
pub fn into_response(response: FunctionResponse) -> Response {
    let (content_type, bytes) = match response.body {
        ResponseBody::Empty => (None, Vec::new()),
        ResponseBody::Json(value) => (
            Some("application/json"),
            serde_json::to_vec(&value).unwrap_or_default(),
        ),
        ResponseBody::Text(text) => (Some("text/plain; charset=utf-8"), text.into_bytes()),
        ResponseBody::Html(html) => (Some("text/html; charset=utf-8"), html.into_bytes()),
    };

    let mut out = Response::new(Body::from(bytes));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or_else(|_| {
        warn!(status = response.status, "invalid status code, sending 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });
    if let Some(content_type) = content_type {
        out.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_query_and_headers_are_read() {
        let request = axum::http::Request::builder()
            .method("post")
            .uri("/hello?name=ada&x=1&x=2")
            .header("Content-Type", "application/json")
            .header("X-Trace", "abc")
            .body(Body::from(r#"{"a": 1}"#))
            .unwrap();
        let request = into_function_request(request).await.unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/hello");
        assert_eq!(request.query.get("name").map(String::as_str), Some("ada"));
        assert_eq!(request.query.get("x").map(String::as_str), Some("2"));
        assert_eq!(request.header("x-trace"), Some("abc"));
        assert_eq!(request.body, json!({"a": 1}));
    }

    #[tokio::test]
    async fn form_and_text_bodies() {
        let form = axum::http::Request::builder()
            .uri("/f")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("a=1&b=two+words"))
            .unwrap();
        assert_eq!(
            into_function_request(form).await.unwrap().body,
            json!({"a": "1", "b": "two words"})
        );

        let text = axum::http::Request::builder()
            .uri("/t")
            .body(Body::from("plain"))
            .unwrap();
        assert_eq!(into_function_request(text).await.unwrap().body, json!("plain"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let request = axum::http::Request::builder()
            .uri("/j")
            .header("content-type", "application/json")
            .body(Body::from("{nope"))
            .unwrap();
        let err = into_function_request(request).await.unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[test]
    fn response_headers_override_content_type() {
        let response = into_response(
            FunctionResponse::text(201, "<x/>").with_header("content-type", "application/xml"),
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/xml"
        );
    }
}
