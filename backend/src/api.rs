//! REST API
//!
//! HTTP endpoints for aggregated market data, source status, and the cache.

use crate::{
    cache::{CacheStats, CachedMarketFetcher},
    error::{MarketError, Result},
    types::{AggregatedMarketData, DataSource, DataSourceMetadata, FetchOptions},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<CachedMarketFetcher>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Market endpoints
        .route("/api/v1/market/:zip", get(get_market))
        .route("/api/v1/sources", get(get_sources))

        // Health endpoints
        .route("/api/v1/health", get(health_check))

        // Admin endpoints
        .route("/api/v1/admin/cache/clear", post(clear_cache))
        .route("/api/v1/admin/cache/stats", get(cache_stats))

        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// MARKET ENDPOINTS
// ============================================================================

/// GET /api/v1/market/:zip
///
/// Aggregated market data for a ZIP code
///
/// Example: GET /api/v1/market/94105?force_refresh=true
async fn get_market(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(params): Query<MarketQuery>,
) -> Result<Json<MarketResponse>> {
    info!("Fetching market data for {}", zip);

    let options = FetchOptions {
        force_refresh: params.force_refresh.unwrap_or(false),
    };
    let data = state.fetcher.fetch(&zip, &options).await?;

    Ok(Json(MarketResponse {
        success: true,
        data,
        timestamp: chrono::Utc::now().timestamp(),
    }))
}

/// GET /api/v1/sources
///
/// Every configured source with its availability
async fn get_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    // One availability probe per adapter; the metadata already carries it
    let data = state.fetcher.aggregator().get_adapter_metadata().await;
    let available = data
        .iter()
        .filter(|metadata| metadata.available)
        .map(|metadata| metadata.source)
        .collect();

    Json(SourcesResponse {
        success: true,
        available,
        data,
    })
}

// ============================================================================
// HEALTH ENDPOINTS
// ============================================================================

/// GET /api/v1/health
///
/// Connection probe of every source plus the cache
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let sources = state.fetcher.aggregator().test_all_connections().await;
    let cache = match state.fetcher.cache() {
        Some(cache) => Some(cache.health_check().await),
        None => None,
    };

    let all_healthy = sources.values().all(|healthy| *healthy) && cache.unwrap_or(true);

    Json(HealthResponse {
        success: all_healthy,
        cache,
        sources,
        timestamp: chrono::Utc::now().timestamp(),
    })
}

// ============================================================================
// ADMIN ENDPOINTS
// ============================================================================

/// POST /api/v1/admin/cache/clear
///
/// Clear all cached market data
async fn clear_cache(State(state): State<AppState>) -> Result<Json<AdminResponse>> {
    let Some(cache) = state.fetcher.cache() else {
        return Ok(Json(AdminResponse {
            success: false,
            message: "Cache is not configured".to_string(),
        }));
    };

    let cleared = cache.clear_all().await?;

    Ok(Json(AdminResponse {
        success: true,
        message: format!("Cleared {} cached entries", cleared),
    }))
}

/// GET /api/v1/admin/cache/stats
async fn cache_stats(State(state): State<AppState>) -> Result<Json<CacheStatsResponse>> {
    let data = match state.fetcher.cache() {
        Some(cache) => Some(cache.get_stats().await?),
        None => None,
    };

    Ok(Json(CacheStatsResponse {
        success: data.is_some(),
        data,
    }))
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    pub force_refresh: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MarketResponse {
    pub success: bool,
    pub data: AggregatedMarketData,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub success: bool,
    pub available: Vec<DataSource>,
    pub data: Vec<DataSourceMetadata>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    /// `None` when no cache is configured
    pub cache: Option<bool>,
    pub sources: BTreeMap<DataSource, bool>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    pub data: Option<CacheStats>,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, retryable, sources) = match &self {
            MarketError::Aggregation(e) => {
                (StatusCode::SERVICE_UNAVAILABLE, true, e.sources().to_vec())
            }
            MarketError::RedisError(_) | MarketError::ParseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, false, Vec::new())
            }
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "retryable": retryable,
            "sources": sources,
        }));

        (status, body).into_response()
    }
}
