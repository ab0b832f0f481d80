use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::api::error::ApiError;
use crate::api::format::{render, OutputFormat};
use crate::api::{AppState, LimitBounds};
use crate::clock::parse_time;

// ── Query params ─────────────────────────────────────────────────────────

// Everything arrives as text so malformed values get our own 400 body
// instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct TopPriceParams {
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/top_price_list", get(top_price_list))
}

// ── Validation ───────────────────────────────────────────────────────────

pub fn validate_limit(raw: Option<&str>, bounds: LimitBounds) -> Result<usize, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::BadRequest("limit is required".to_string()))?;
    let limit: usize = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("limit must be an integer, got {raw:?}")))?;
    if limit < bounds.min || limit > bounds.max {
        return Err(ApiError::BadRequest(format!(
            "limit must be between {} and {}",
            bounds.min, bounds.max
        )));
    }
    Ok(limit)
}

pub fn validate_timestamp(
    raw: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let timestamp = parse_time(raw).map_err(|_| {
        ApiError::BadRequest("Invalid datetime format. Please use ISO 8601 format.".to_string())
    })?;
    if timestamp > now {
        return Err(ApiError::BadRequest("Datetime must be in the past".to_string()));
    }
    Ok(Some(timestamp))
}

pub fn validate_format(raw: Option<&str>) -> Result<OutputFormat, ApiError> {
    match raw {
        None => Ok(OutputFormat::default()),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::BadRequest("format must be one of json, csv".to_string())),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[instrument(skip(state))]
async fn top_price_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopPriceParams>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();

    let limit = validate_limit(params.limit.as_deref(), state.limits)?;
    let timestamp = validate_timestamp(params.datetime.as_deref(), state.resolver.clock().now())?;
    let format = validate_format(params.format.as_deref())?;

    let entries = state.resolver.fetch_top(limit, timestamp).await?;
    let rendered = render(format, &entries)?;

    debug!(
        entries = entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "served top price list"
    );
    Ok(rendered)
}
