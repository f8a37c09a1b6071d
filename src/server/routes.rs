//! HTTP route handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::AppState;
use crate::config::clamp_limit;
use crate::error::{AppError, FieldError};
use crate::search::{fuzzy_search, run_search, ScoredItem, SearchResult};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchResult>,
    pub query: String,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct FuzzyRequest {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FuzzyResponse {
    pub success: bool,
    pub results: Vec<ScoredItem>,
    pub total: usize,
}

/// `POST /api/search`
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    state
        .limiter
        .check(&client_key(
            &headers,
            connect_info.as_ref(),
            state.config.trust_forwarded,
        ))?;

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected search payload: {}", rejection);
            return Err(AppError::invalid("query", "Query is required"));
        }
    };

    let raw_query = request
        .query
        .ok_or_else(|| AppError::invalid("query", "Query is required"))?;

    let limit = request
        .limit
        .map(|l| clamp_limit(Some(l)))
        .unwrap_or(state.config.result_limit);

    let outcome = run_search(&state.engine, &raw_query, limit).await?;

    Ok(Json(SearchResponse {
        success: true,
        results: outcome.results,
        query: outcome.query,
        total: outcome.total,
    }))
}

/// `POST /api/search/fuzzy`
pub async fn fuzzy_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<FuzzyRequest>, JsonRejection>,
) -> Result<Json<FuzzyResponse>, AppError> {
    state
        .limiter
        .check(&client_key(
            &headers,
            connect_info.as_ref(),
            state.config.trust_forwarded,
        ))?;

    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected fuzzy payload: {}", rejection);
        AppError::invalid("items", "Body must be a JSON object with items, term and fields")
    })?;

    let mut problems = Vec::new();
    if request.term.trim().is_empty() {
        problems.push(FieldError::new("term", "Term cannot be empty"));
    }
    if request.fields.is_empty() {
        problems.push(FieldError::new("fields", "At least one field is required"));
    }
    if !problems.is_empty() {
        return Err(AppError::Validation(problems));
    }

    // Pure CPU work; keep it off the async workers
    let results = tokio::task::spawn_blocking(move || {
        fuzzy_search(&request.items, &request.term, &request.fields)
    })
    .await?;

    Ok(Json(FuzzyResponse {
        success: true,
        total: results.len(),
        results,
    }))
}

/// `GET /health`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.engine.ping().await {
        (StatusCode::OK, Json(json!({ "status": "ok", "engine": "up" })))
    } else {
        warn!("Health check: search engine unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "engine": "down" })),
        )
    }
}

/// Rate limit key: the peer address, else a shared bucket.
///
/// With `trust_forwarded` the first `X-Forwarded-For` entry takes
/// precedence; the header is client-controlled unless a proxy overwrites it.
pub fn client_key(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded: bool,
) -> String {
    let forwarded = if trust_forwarded {
        headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    forwarded
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}
