//! Assembling the surfaces into one axum application.

use crate::convert::{into_function_request, into_response};
use crate::pubsub::LocalPubSub;
use crate::route::RouteTable;
use crate::scheduler::CronScheduler;
use crate::ws;
use axum::Router;
use axum::extract::Request;
use axum::routing::get;
use faas_types::Surface;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// The three surfaces a catalog is mounted onto, turned into an axum
/// [`Router`] once mounting is done.
#[derive(Default)]
pub struct ServingSurface {
    routes: RouteTable,
    pubsub: Arc<LocalPubSub>,
    scheduler: Arc<CronScheduler>,
}

impl ServingSurface {
    /// Empty surfaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the surfaces for mounting.
    pub fn surface(&mut self) -> Surface<'_> {
        Surface {
            router: &mut self.routes,
            pubsub: self.pubsub.clone(),
            scheduler: self.scheduler.as_ref(),
        }
    }

    /// The route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The pub/sub transport.
    pub fn pubsub(&self) -> &Arc<LocalPubSub> {
        &self.pubsub
    }

    /// The scheduler. Keep it to stop jobs after the router is gone.
    pub fn scheduler(&self) -> Arc<CronScheduler> {
        self.scheduler.clone()
    }

    /// Build the application: sockets at `/ws/{namespace}`, static files
    /// under `/assets` when `assets` is given, everything else through the
    /// route table.
    ///
    /// Jobs keep running only while a [`scheduler`](Self::scheduler) handle
    /// is held; take one first.
    pub fn into_router(self, assets: Option<PathBuf>) -> Router {
        let routes = Arc::new(self.routes);
        let mut app = Router::new()
            .route("/ws/{namespace}", get(ws::upgrade))
            .with_state(self.pubsub);
        if let Some(dir) = assets {
            app = app.nest_service("/assets", ServeDir::new(dir));
        }
        app.fallback(move |request: Request| {
            let routes = routes.clone();
            async move {
                match into_function_request(request).await {
                    Ok(request) => into_response(routes.dispatch(request).await),
                    Err(rejection) => into_response(rejection),
                }
            }
        })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
    }
}
