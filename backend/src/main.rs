use std::sync::Arc;

use market_aggregator::{
    api::{create_router, AppState},
    cache::{CachedMarketFetcher, MarketCache},
    config::Config,
    MarketDataAdapter, MarketDataAggregator, SourceAdapter,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting Market Aggregator Service...");

    let config = Config::from_env()?;

    let adapters: Vec<Arc<dyn SourceAdapter>> = config
        .sources
        .iter()
        .map(|(profile, source_config)| {
            let adapter = MarketDataAdapter::from_config(
                profile.clone(),
                source_config.clone(),
                config.simulated_latency,
            );
            info!(
                "🔗 {} adapter ready ({}, priority {}, enabled: {})",
                profile.name,
                if adapter.is_simulated() { "simulated" } else { "live" },
                source_config.priority,
                source_config.enabled
            );
            Arc::new(adapter) as Arc<dyn SourceAdapter>
        })
        .collect();

    let aggregator = Arc::new(MarketDataAggregator::new(
        adapters,
        config.aggregation.clone(),
    ));
    info!("📊 Aggregation strategy: {:?}", config.aggregation.strategy);

    // Initialize Redis cache
    let cache = match &config.redis_url {
        Some(url) => {
            info!("💾 Connecting to Redis...");
            match MarketCache::new(url).await {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!("Redis unavailable, serving without cache: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let state = AppState {
        fetcher: Arc::new(CachedMarketFetcher::new(aggregator, cache)),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
