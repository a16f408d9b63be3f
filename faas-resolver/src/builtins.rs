//! Reserved catalog entries.

use crate::html;
use async_trait::async_trait;
use faas_types::{
    FunctionCatalog, FunctionDescriptor, FunctionRequest, FunctionResponse, HandlerError,
    RequestHandler,
};
use serde_json::Value;
use std::sync::Arc;

/// Health probe: `GET /functions-health`.
pub const HEALTH_FUNCTION: &str = "functions-health";
/// Catalog listing: `GET /functions-all`.
pub const CATALOG_FUNCTION: &str = "functions-all";
/// Placeholder name always removed from a resolved catalog.
pub const PLACEHOLDER_FUNCTION: &str = "mambo";

struct HealthHandler;

#[async_trait]
impl RequestHandler for HealthHandler {
    async fn handle(&self, _request: FunctionRequest) -> Result<FunctionResponse, HandlerError> {
        Ok(FunctionResponse::message(200, "running"))
    }
}

#[derive(Default)]
struct CatalogPage {
    json: Value,
    html: String,
}

#[derive(Default)]
struct CatalogHandler {
    page: CatalogPage,
}

fn wants_json(request: &FunctionRequest) -> bool {
    match request.query.get("format").map(|f| f.to_ascii_lowercase()) {
        Some(f) if f == "json" => true,
        Some(f) if f == "html" => false,
        _ => request.header("accept").is_some_and(|accept| {
            accept.contains("application/json") && !accept.contains("text/html")
        }),
    }
}

#[async_trait]
impl RequestHandler for CatalogHandler {
    async fn handle(&self, request: FunctionRequest) -> Result<FunctionResponse, HandlerError> {
        let page = &self.page;
        if wants_json(&request) {
            Ok(FunctionResponse::json(200, page.json.clone()))
        } else {
            Ok(FunctionResponse::html(200, page.html.clone()))
        }
    }
}

fn describe(text: &str) -> serde_json::Map<String, Value> {
    let mut docs = serde_json::Map::new();
    docs.insert("description".into(), Value::String(text.into()));
    docs
}

/// The health probe descriptor.
pub fn health_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        path: Some(format!("/{HEALTH_FUNCTION}")),
        method: Some("get".into()),
        on_request: Some(Arc::new(HealthHandler)),
        docs: describe("Reports that the functions engine is running."),
        ..Default::default()
    }
}

/// Drop the placeholder and add the reserved entries, overriding any user
/// export with the same names. The listing covers the final catalog,
/// reserved entries included.
pub fn install(catalog: &mut FunctionCatalog) {
    catalog.remove(PLACEHOLDER_FUNCTION);
    catalog.insert(HEALTH_FUNCTION, health_descriptor());

    // The listing lists itself. Render from a copy holding an entry of the
    // same shape, then install the real handler over it.
    let mut listed = catalog.clone();
    listed.insert(
        CATALOG_FUNCTION,
        listing_descriptor(Arc::new(CatalogHandler::default())),
    );
    let page = CatalogPage {
        json: listed.sanitized(),
        html: html::render(&listed),
    };
    catalog.insert(
        CATALOG_FUNCTION,
        listing_descriptor(Arc::new(CatalogHandler { page })),
    );
}

fn listing_descriptor(handler: Arc<dyn RequestHandler>) -> FunctionDescriptor {
    FunctionDescriptor {
        path: Some(format!("/{CATALOG_FUNCTION}")),
        method: Some("get".into()),
        on_request: Some(handler),
        docs: describe(
            "Lists every deployed function. Use ?format=json for JSON, html (default) for a page.",
        ),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_types::ResponseBody;
    use serde_json::json;

    fn listing(catalog: &FunctionCatalog) -> Arc<dyn RequestHandler> {
        catalog
            .get(CATALOG_FUNCTION)
            .and_then(|d| d.on_request.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn health_says_running() {
        let mut catalog = FunctionCatalog::new();
        install(&mut catalog);
        let handler = catalog
            .get(HEALTH_FUNCTION)
            .and_then(|d| d.on_request.clone())
            .unwrap();
        let resp = handler
            .handle(FunctionRequest::new("GET", "/functions-health"))
            .await
            .unwrap();
        assert_eq!(resp, FunctionResponse::json(200, json!({"message": "running"})));
    }

    #[tokio::test]
    async fn placeholder_and_shadowing_exports_are_replaced() {
        let mut catalog = FunctionCatalog::new();
        catalog.insert(PLACEHOLDER_FUNCTION, FunctionDescriptor::default());
        let mut fake = FunctionDescriptor::default();
        fake.docs.insert("description".into(), json!("user health"));
        catalog.insert(HEALTH_FUNCTION, fake);

        install(&mut catalog);
        assert!(!catalog.contains(PLACEHOLDER_FUNCTION));
        assert_eq!(
            catalog.get(HEALTH_FUNCTION).and_then(|d| d.path.clone()),
            Some("/functions-health".into())
        );
    }

    #[tokio::test]
    async fn format_wins_over_accept() {
        let mut catalog = FunctionCatalog::new();
        install(&mut catalog);
        let handler = listing(&catalog);

        let html = handler
            .handle(
                FunctionRequest::new("GET", "/functions-all")
                    .with_header("accept", "application/json")
                    .with_query("format", "html"),
            )
            .await
            .unwrap();
        assert!(matches!(html.body, ResponseBody::Html(_)));

        let json = handler
            .handle(
                FunctionRequest::new("GET", "/functions-all")
                    .with_header("accept", "text/html")
                    .with_query("format", "json"),
            )
            .await
            .unwrap();
        assert!(matches!(json.body, ResponseBody::Json(_)));
    }

    #[tokio::test]
    async fn accept_json_without_format() {
        let mut catalog = FunctionCatalog::new();
        install(&mut catalog);
        let resp = listing(&catalog)
            .handle(FunctionRequest::new("GET", "/functions-all").with_header("Accept", "application/json"))
            .await
            .unwrap();
        let body = resp.json_body().unwrap();
        assert!(body.get(CATALOG_FUNCTION).is_some());
        assert!(body.get(HEALTH_FUNCTION).is_some());
    }

    #[tokio::test]
    async fn html_is_the_default() {
        let mut catalog = FunctionCatalog::new();
        install(&mut catalog);
        let resp = listing(&catalog)
            .handle(FunctionRequest::new("GET", "/functions-all"))
            .await
            .unwrap();
        assert!(matches!(resp.body, ResponseBody::Html(ref page) if page.contains("functions-health")));
    }

    #[tokio::test]
    async fn listing_answers_as_soon_as_installed() {
        let mut catalog = FunctionCatalog::new();
        install(&mut catalog);
        let resp = listing(&catalog)
            .handle(FunctionRequest::new("GET", "/functions-all").with_query("format", "json"))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        let body = resp.json_body().unwrap();
        assert_eq!(body[CATALOG_FUNCTION]["path"], json!("/functions-all"));
        assert_eq!(body[CATALOG_FUNCTION]["method"], json!("get"));

        let page = listing(&catalog)
            .handle(FunctionRequest::new("GET", "/functions-all"))
            .await
            .unwrap();
        assert!(matches!(page.body, ResponseBody::Html(ref html) if html.contains("<code>/functions-all</code>")));
    }
}
