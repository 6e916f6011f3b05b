//! Market Data Aggregator
//!
//! Combines market snapshots from every configured source into one record.
//!
//! # Architecture
//! ```text
//! Zillow  (priority 1) → record ─┐
//! Realtor (priority 2) → record ─┤
//! Census  (priority 3) → error  ─┼→ [Aggregator] → AggregatedMarketData
//! MLS     (priority 4) → record ─┘       ↓
//!                                 quality scores, source policy, strategy
//! ```
//!
//! One failing source never aborts the aggregation. The call only fails
//! when the minimum or required source policy cannot be met.

use crate::{
    adapter::SourceAdapter,
    clock::{Clock, SystemClock},
    error::AggregationError,
    quality::assess_data_quality,
    strategy::{self, SourceSample},
    types::{
        AggregatedMarketData, AggregationConfig, DataSource, DataSourceMetadata, FetchOptions,
    },
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Aggregator over a fixed set of source adapters
///
/// Holds no per-request state, so one instance can serve concurrent callers.
pub struct MarketDataAggregator {
    /// Sorted by ascending priority
    adapters: Vec<Arc<dyn SourceAdapter>>,

    config: AggregationConfig,

    clock: Arc<dyn Clock>,
}

impl MarketDataAggregator {
    /// Create an aggregator over `adapters`
    ///
    /// Adapters are ordered by priority once, here. Equal priorities keep
    /// the order they were passed in.
    pub fn new(mut adapters: Vec<Arc<dyn SourceAdapter>>, config: AggregationConfig) -> Self {
        adapters.sort_by_key(|adapter| adapter.priority());
        Self {
            adapters,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Fetch every source for `zip_code` and merge the results
    ///
    /// # Algorithm:
    /// 1. Call each adapter in priority order, one at a time
    /// 2. Score every record that comes back; log and skip failures
    /// 3. Enforce `minimum_sources` and `required_sources`
    /// 4. Merge with the configured strategy (a single source is returned as is)
    ///
    /// # Errors
    /// * `InsufficientSources` - fewer sources succeeded than the minimum
    /// * `MissingRequiredSources` - a required source failed
    pub async fn fetch_aggregated_data(
        &self,
        zip_code: &str,
        options: &FetchOptions,
    ) -> Result<AggregatedMarketData, AggregationError> {
        debug!("Fetching aggregated market data for {}", zip_code);

        let mut samples: Vec<SourceSample> = Vec::new();
        let mut failed: Vec<DataSource> = Vec::new();

        for adapter in &self.adapters {
            let source = adapter.source();
            match adapter.fetch_data(zip_code, options).await {
                Ok(record) => {
                    let quality = assess_data_quality(&record, self.clock.now());
                    debug!(
                        "{} data for {}: quality {} ({} warnings)",
                        source,
                        zip_code,
                        quality.overall,
                        quality.warnings.len()
                    );
                    samples.push(SourceSample {
                        source,
                        record,
                        quality,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} failed for {} (retryable: {}): {}",
                        source,
                        zip_code,
                        e.retryable(),
                        e
                    );
                    failed.push(source);
                }
            }
        }

        let minimum = self.config.minimum_sources.max(1);
        if samples.len() < minimum {
            error!(
                "Only {} of {} minimum sources returned data for {}",
                samples.len(),
                minimum,
                zip_code
            );
            return Err(AggregationError::InsufficientSources {
                required: minimum,
                succeeded: samples.len(),
                failed,
            });
        }

        let missing: Vec<DataSource> = self
            .config
            .required_sources
            .iter()
            .copied()
            .filter(|required| !samples.iter().any(|s| s.source == *required))
            .collect();
        if !missing.is_empty() {
            error!("Required sources missing for {}: {:?}", zip_code, missing);
            return Err(AggregationError::MissingRequiredSources { missing });
        }

        let data = if let [only] = samples.as_slice() {
            debug!("Single source {} for {}, skipping strategy", only.source, zip_code);
            only.record.clone()
        } else {
            strategy::apply(self.config.strategy, &samples, &self.config).ok_or_else(|| {
                AggregationError::InsufficientSources {
                    required: minimum,
                    succeeded: 0,
                    failed: failed.clone(),
                }
            })?
        };

        debug!(
            "Aggregated {} from {} sources with {:?}",
            zip_code,
            samples.len(),
            self.config.strategy
        );

        let sources = samples.iter().map(|s| s.source).collect();
        let mut source_data = BTreeMap::new();
        let mut quality_scores = BTreeMap::new();
        for sample in samples {
            source_data.insert(sample.source, sample.record);
            quality_scores.insert(sample.source, sample.quality);
        }

        Ok(AggregatedMarketData {
            data,
            sources,
            source_data,
            aggregation_strategy: self.config.strategy,
            quality_scores,
            failed_sources: failed,
        })
    }

    /// Sources whose adapters report themselves available
    pub async fn get_available_adapters(&self) -> Vec<DataSource> {
        let mut available = Vec::new();
        for adapter in &self.adapters {
            if adapter.is_available().await {
                available.push(adapter.source());
            }
        }
        available
    }

    pub async fn get_adapter_metadata(&self) -> Vec<DataSourceMetadata> {
        let mut metadata = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            metadata.push(adapter.get_metadata().await);
        }
        metadata
    }

    /// Probe every adapter, enabled or not
    pub async fn test_all_connections(&self) -> BTreeMap<DataSource, bool> {
        let mut results = BTreeMap::new();
        for adapter in &self.adapters {
            let connected = adapter.test_connection().await;
            if !connected {
                warn!("{} connection test failed", adapter.source());
            }
            results.insert(adapter.source(), connected);
        }
        results
    }

    /// Shortest cache lifetime among `sources`
    pub fn cache_ttl(&self, sources: &[DataSource]) -> Option<Duration> {
        self.adapters
            .iter()
            .filter(|adapter| sources.contains(&adapter.source()))
            .map(|adapter| adapter.get_config().cache_ttl)
            .min()
    }
}
