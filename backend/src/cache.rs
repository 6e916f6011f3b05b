//! Redis Cache Layer
//!
//! Caller-side cache for aggregated market data. The aggregator itself never
//! caches; this module sits in front of it.
//!
//! # Architecture
//! ```text
//! Request → force_refresh? ── yes ──────────────┐
//!              ↓ no                             ↓
//!          Check Cache → Hit? → Return     Aggregate → Store Cache → Return
//!              ↓
//!            Miss? ─────────────────────────────┘
//! ```
//!
//! # Cache Strategy
//! - Key format: "market:{zip}"
//! - TTL: the shortest cache TTL among the contributing sources
//! - Stores JSON-serialized AggregatedMarketData
//!
//! Cache faults are logged and bypassed; a broken cache never fails a request.

use crate::{
    aggregator::MarketDataAggregator,
    error::{MarketError, Result},
    types::{AggregatedMarketData, FetchOptions},
};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "market:";

/// Redis cache client
#[derive(Clone)]
pub struct MarketCache {
    /// Redis connection manager (handles reconnection automatically)
    connection: ConnectionManager,
}

impl MarketCache {
    /// Connect to Redis
    ///
    /// # Example
    /// ```ignore
    /// let cache = MarketCache::new("redis://127.0.0.1").await?;
    /// ```
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        debug!("Redis cache connected to {}", redis_url);

        Ok(Self { connection })
    }

    /// Store aggregated data for `ttl`
    pub async fn set_market_data(&self, data: &AggregatedMarketData, ttl: Duration) -> Result<()> {
        let key = cache_key(&data.data.zip_code);
        let json = serde_json::to_string(data)
            .map_err(|e| MarketError::ParseError(format!("JSON serialize error: {}", e)))?;

        let mut connection = self.connection.clone();
        redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut connection)
            .await?;

        debug!("Cached market data for {} (TTL: {}s)", data.data.zip_code, ttl.as_secs());
        Ok(())
    }

    /// Cached data for a ZIP code, `None` on a miss
    pub async fn get_market_data(&self, zip_code: &str) -> Result<Option<AggregatedMarketData>> {
        let key = cache_key(zip_code);
        let mut connection = self.connection.clone();
        let result: Option<String> = connection.get(&key).await?;

        match result {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    MarketError::ParseError(format!("JSON deserialize error: {}", e))
                })?;
                debug!("Cache HIT for {}", zip_code);
                Ok(Some(data))
            }
            None => {
                debug!("Cache MISS for {}", zip_code);
                Ok(None)
            }
        }
    }

    pub async fn delete_market_data(&self, zip_code: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.del::<_, ()>(cache_key(zip_code)).await?;

        debug!("Deleted cache for {}", zip_code);
        Ok(())
    }

    /// Drop every cached market entry; returns how many were removed
    pub async fn clear_all(&self) -> Result<usize> {
        let mut connection = self.connection.clone();
        let keys: Vec<String> = connection.keys(format!("{}*", KEY_PREFIX)).await?;

        if !keys.is_empty() {
            connection.del::<_, ()>(&keys).await?;
            debug!("Cleared {} cached market entries", keys.len());
        }

        Ok(keys.len())
    }

    pub async fn get_stats(&self) -> Result<CacheStats> {
        let mut connection = self.connection.clone();
        let keys: Vec<String> = connection.keys(format!("{}*", KEY_PREFIX)).await?;

        Ok(CacheStats {
            total_keys: keys.len(),
        })
    }

    /// Check if cache is healthy (can connect to Redis)
    pub async fn health_check(&self) -> bool {
        let mut connection = self.connection.clone();
        match redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await
        {
            Ok(response) if response == "PONG" => {
                debug!("Redis health check passed");
                true
            }
            Ok(_) => {
                warn!("Redis health check failed: unexpected response");
                false
            }
            Err(e) => {
                warn!("Redis health check failed: {}", e);
                false
            }
        }
    }
}

/// Generate cache key for a ZIP code
///
/// # Example
/// "market:94105"
pub fn cache_key(zip_code: &str) -> String {
    format!("{}{}", KEY_PREFIX, zip_code.trim())
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of cached market keys
    pub total_keys: usize,
}

// ============================================================================
// CACHED FETCHER (High-level wrapper)
// ============================================================================

/// Aggregator with an optional cache in front of it
pub struct CachedMarketFetcher {
    aggregator: Arc<MarketDataAggregator>,
    cache: Option<MarketCache>,
}

impl CachedMarketFetcher {
    pub fn new(aggregator: Arc<MarketDataAggregator>, cache: Option<MarketCache>) -> Self {
        Self { aggregator, cache }
    }

    pub fn aggregator(&self) -> &MarketDataAggregator {
        &self.aggregator
    }

    pub fn cache(&self) -> Option<&MarketCache> {
        self.cache.as_ref()
    }

    /// Aggregated data for `zip_code`, served from cache when allowed
    ///
    /// # How it works:
    /// 1. Unless `force_refresh`, try the cache
    /// 2. On a miss, aggregate from the sources
    /// 3. Store the fresh result for the shortest TTL of its sources
    pub async fn fetch(
        &self,
        zip_code: &str,
        options: &FetchOptions,
    ) -> Result<AggregatedMarketData> {
        let zip_code = zip_code.trim();

        if let Some(cache) = &self.cache {
            if options.force_refresh {
                debug!("Force refresh for {}, bypassing cache", zip_code);
            } else {
                match cache.get_market_data(zip_code).await {
                    Ok(Some(data)) => return Ok(data),
                    Ok(None) => {}
                    Err(e) => warn!("Cache read failed for {}: {}", zip_code, e),
                }
            }
        }

        let data = self.aggregator.fetch_aggregated_data(zip_code, options).await?;

        if let Some(cache) = &self.cache {
            if let Some(ttl) = self.aggregator.cache_ttl(&data.sources) {
                if let Err(e) = cache.set_market_data(&data, ttl).await {
                    warn!("Cache write failed for {}: {}", zip_code, e);
                }
            }
        }

        Ok(data)
    }
}
