//! `api` crate — HTTP REST façade over the engine.
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   PUT    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/execute
//!   GET    /api/v1/workflows/:id/executions
//!   GET    /api/v1/executions/:id
//!   POST   /api/v1/executions/:id/cancel
//!   GET    /api/v1/nodes
//!   POST   /api/v1/nodes/preview
//!   GET    /api/v1/cache/stats

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use engine::{Storage, WorkflowExecutor};
use nodes::NodeRegistry;

#[derive(Clone)]
pub struct AppState {
    pub executor: WorkflowExecutor,
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<NodeRegistry>,
}

pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .route(
            "/workflows",
            get(handlers::workflows::list).post(handlers::workflows::create),
        )
        .route(
            "/workflows/:id",
            get(handlers::workflows::get)
                .put(handlers::workflows::update)
                .delete(handlers::workflows::delete),
        )
        .route("/workflows/:id/execute", post(handlers::executions::execute))
        .route("/workflows/:id/executions", get(handlers::executions::list))
        .route("/executions/:id", get(handlers::executions::get))
        .route("/executions/:id/cancel", post(handlers::executions::cancel))
        .route("/nodes", get(handlers::nodes::list))
        .route("/nodes/preview", post(handlers::nodes::preview))
        .route("/cache/stats", get(handlers::nodes::cache_stats));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<(), std::io::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
