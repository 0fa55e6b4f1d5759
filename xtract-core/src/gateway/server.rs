//! REST server built on axum.

use super::error::{ApiError, ApiResult};
use crate::config::SearchMode;
use crate::normalize::{PaperRecord, SearchResult};
use crate::service::{Health, PaperService, SERVICE_MESSAGE};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared read-only service reference for axum handlers.
pub type SharedService = Arc<PaperService>;

/// Query parameters for `/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub top_k: Option<usize>,
    pub limit: Option<usize>,
    pub mode: Option<SearchMode>,
}

impl SearchParams {
    /// `top_k` wins over `limit`.
    pub fn effective_limit(&self) -> Option<usize> {
        self.top_k.or(self.limit)
    }
}

/// Query parameters for `/recommend/{paper_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub top_k: Option<usize>,
}

/// Build the axum Router with every route and layer.
pub fn router(service: SharedService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/paper/{*paper_id}", get(paper_handler))
        .route("/search", get(search_handler))
        .route("/recommend/{*paper_id}", get(recommend_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn root_handler(State(service): State<SharedService>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": SERVICE_MESSAGE,
        "records": service.len(),
    }))
}

async fn health_handler(State(service): State<SharedService>) -> Json<Health> {
    Json(service.health())
}

/// The still-encoded id following `prefix`. Decoding is left to the resolver,
/// which keeps undecodable ids verbatim.
fn raw_paper_id<'a>(uri: &'a Uri, prefix: &str) -> &'a str {
    uri.path().strip_prefix(prefix).unwrap_or_default()
}

async fn paper_handler(State(service): State<SharedService>, uri: Uri) -> ApiResult<PaperRecord> {
    service
        .get_paper(raw_paper_id(&uri, "/paper/"))
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Paper lookup"))
}

async fn search_handler(
    State(service): State<SharedService>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Vec<SearchResult>> {
    let Query(params) = params?;
    let query = params.query.as_deref().unwrap_or_default();
    service
        .search(query, params.effective_limit(), params.mode)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Search"))
}

async fn recommend_handler(
    State(service): State<SharedService>,
    uri: Uri,
    params: Result<Query<RecommendParams>, QueryRejection>,
) -> ApiResult<Vec<SearchResult>> {
    let Query(params) = params?;
    service
        .recommend(raw_paper_id(&uri, "/recommend/"), params.top_k)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Recommendation"))
}

async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Not found: {}", uri.path()))
}

async fn method_not_allowed_handler() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Bind `host:port` and serve until cancelled or interrupted.
pub async fn run(service: SharedService, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(service);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
