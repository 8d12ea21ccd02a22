//! HTTP routes of the proxy.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use presscache_core::auth::SessionPhase;
use presscache_core::FetchCache;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::render;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FetchCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_status", get(status))
        .route("/{kind}/{id}", get(content))
        .fallback(invalid_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Response {
    invalid_request().await
}

async fn invalid_request() -> Response {
    render::error_page(StatusCode::BAD_REQUEST, "Invalid request", None)
}

async fn content(State(state): State<AppState>, Path((kind, id)): Path<(String, String)>) -> Response {
    match state.cache.get(&kind, &id).await {
        Ok(fetched) => render::content_page(&fetched),
        Err(err) => render::fetch_error_page(&err),
    }
}

#[derive(Serialize)]
struct StatusReport {
    session: &'static str,
    cached_items: usize,
    fresh: u64,
    stale: u64,
    failed: u64,
    rejected: u64,
    open_attempts: u64,
    open_failures: u64,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.cache.session();
    let fetch = state.cache.stats();
    let opens = session.stats();

    Json(StatusReport {
        session: match session.phase() {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Opening => "opening",
            SessionPhase::Valid => "valid",
            SessionPhase::Invalid => "invalid",
        },
        cached_items: state.cache.store().len(),
        fresh: fetch.fresh,
        stale: fetch.stale,
        failed: fetch.failed,
        rejected: fetch.rejected,
        open_attempts: opens.attempts,
        open_failures: opens.failures,
    })
}
