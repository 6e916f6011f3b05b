use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use market_aggregator::{
    api::{create_router, AppState},
    cache::CachedMarketFetcher,
    AggregationConfig, DataSource, DataSourceConfig, DataSourceMetadata, FetchOptions,
    MarketDataAdapter, MarketDataAggregator, SourceAdapter, SourceError, SourceErrorKind,
    SourceProfile, StandardMarketData,
};
use serde_json::Value;
use tower::ServiceExt;

/// Router over the four simulated sources; `disabled` sources are switched off
fn app(config: AggregationConfig, disabled: &[DataSource]) -> Router {
    let adapters: Vec<Arc<dyn SourceAdapter>> = DataSource::UPSTREAM
        .iter()
        .filter_map(|source| SourceProfile::for_source(*source))
        .map(|profile| {
            let mut source_config = profile.default_config();
            source_config.enabled = !disabled.contains(&profile.source);
            Arc::new(MarketDataAdapter::simulated(
                profile,
                source_config,
                Duration::ZERO,
            )) as Arc<dyn SourceAdapter>
        })
        .collect();

    let aggregator = Arc::new(MarketDataAggregator::new(adapters, config));
    create_router(AppState {
        fetcher: Arc::new(CachedMarketFetcher::new(aggregator, None)),
    })
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_market_endpoint_returns_aggregate() {
    let app = app(AggregationConfig::default(), &[]);

    let (status, body) = send(app, Method::GET, "/api/v1/market/94105").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["zipCode"], "94105");
    assert_eq!(body["data"]["dataSource"], "AGGREGATED");
    assert_eq!(body["data"]["aggregationStrategy"], "WEIGHTED_AVERAGE");
    assert_eq!(
        body["data"]["sources"],
        serde_json::json!(["ZILLOW", "REALTOR", "CENSUS", "MLS"])
    );
    assert!(body["data"]["qualityScores"]["CENSUS"]["overall"].is_string());
    assert!(body["data"]["sourceData"]["MLS"]["medianRent"].is_string());
}

#[tokio::test]
async fn test_force_refresh_is_accepted() {
    let app = app(AggregationConfig::default(), &[]);

    let (status, body) = send(app, Method::GET, "/api/v1/market/94105?force_refresh=true").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_insufficient_sources_is_service_unavailable() {
    let config = AggregationConfig {
        minimum_sources: 3,
        ..AggregationConfig::default()
    };
    let app = app(config, &[DataSource::Realtor, DataSource::Census]);

    let (status, body) = send(app, Method::GET, "/api/v1/market/94105").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["retryable"], true);
    assert_eq!(body["sources"], serde_json::json!(["REALTOR", "CENSUS"]));
}

#[tokio::test]
async fn test_missing_required_source_is_service_unavailable() {
    let config = AggregationConfig {
        required_sources: vec![DataSource::Mls],
        ..AggregationConfig::default()
    };
    let app = app(config, &[DataSource::Mls]);

    let (status, body) = send(app, Method::GET, "/api/v1/market/94105").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["sources"], serde_json::json!(["MLS"]));
}

#[tokio::test]
async fn test_invalid_zip_fails_every_source() {
    let app = app(AggregationConfig::default(), &[]);

    let (status, body) = send(app, Method::GET, "/api/v1/market/abc").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["sources"],
        serde_json::json!(["ZILLOW", "REALTOR", "CENSUS", "MLS"])
    );
}

#[tokio::test]
async fn test_sources_endpoint_lists_availability() {
    let app = app(AggregationConfig::default(), &[DataSource::Census]);

    let (status, body) = send(app, Method::GET, "/api/v1/sources").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], serde_json::json!(["ZILLOW", "REALTOR", "MLS"]));
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"][2]["source"], "CENSUS");
    assert_eq!(body["data"][2]["available"], false);
}

#[tokio::test]
async fn test_health_reports_every_source() {
    let app = app(AggregationConfig::default(), &[]);

    let (status, body) = send(app, Method::GET, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cache"], Value::Null);
    assert_eq!(body["sources"]["ZILLOW"], true);
    assert_eq!(body["sources"]["MLS"], true);
}

#[tokio::test]
async fn test_cache_admin_without_cache() {
    let (status, body) = send(
        app(AggregationConfig::default(), &[]),
        Method::POST,
        "/api/v1/admin/cache/clear",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        app(AggregationConfig::default(), &[]),
        Method::GET,
        "/api/v1/admin/cache/stats",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);
}

/// Source that counts how often its connection is probed
struct CountingAdapter {
    profile: SourceProfile,
    probes: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceAdapter for CountingAdapter {
    fn source(&self) -> DataSource {
        self.profile.source
    }

    async fn fetch_data(
        &self,
        _zip_code: &str,
        _options: &FetchOptions,
    ) -> Result<StandardMarketData, SourceError> {
        Err(SourceError::new(self.profile.source, SourceErrorKind::Timeout))
    }

    async fn is_available(&self) -> bool {
        self.test_connection().await
    }

    async fn test_connection(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn get_metadata(&self) -> DataSourceMetadata {
        DataSourceMetadata {
            name: self.profile.name.to_string(),
            source: self.profile.source,
            available: self.is_available().await,
            api_version: self.profile.api_version.to_string(),
        }
    }

    fn get_config(&self) -> DataSourceConfig {
        self.profile.default_config()
    }
}

#[tokio::test]
async fn test_sources_endpoint_probes_each_adapter_once() {
    let probes = Arc::new(AtomicUsize::new(0));
    let adapters: Vec<Arc<dyn SourceAdapter>> = [DataSource::Zillow, DataSource::Mls]
        .into_iter()
        .filter_map(SourceProfile::for_source)
        .map(|profile| {
            Arc::new(CountingAdapter {
                profile,
                probes: probes.clone(),
            }) as Arc<dyn SourceAdapter>
        })
        .collect();
    let aggregator = Arc::new(MarketDataAggregator::new(
        adapters,
        AggregationConfig::default(),
    ));
    let app = create_router(AppState {
        fetcher: Arc::new(CachedMarketFetcher::new(aggregator, None)),
    });

    let (status, body) = send(app, Method::GET, "/api/v1/sources").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], serde_json::json!(["ZILLOW", "MLS"]));
    assert_eq!(probes.load(Ordering::SeqCst), 2);
}
