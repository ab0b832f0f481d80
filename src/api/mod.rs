//! HTTP surface: `/top_price_list` and `/health`.

pub mod error;
pub mod format;
pub mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::resolver::CoinResolver;

/// Inclusive range accepted for the `limit` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for LimitBounds {
    fn default() -> Self {
        Self { min: 10, max: 100 }
    }
}

pub struct AppState {
    pub resolver: Arc<CoinResolver>,
    pub limits: LimitBounds,
}

impl AppState {
    pub fn new(resolver: Arc<CoinResolver>, limits: LimitBounds) -> Self {
        Self { resolver, limits }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
