//! Source Adapters
//!
//! One parameterized adapter covers every upstream provider. A
//! [`SourceProfile`] carries the per-provider defaults and an
//! [`AdapterMode`] decides whether records come from the real API or from
//! the seeded generator.
//!
//! ```text
//!                  ┌── Live ──────→ HttpSource (reqwest)
//! fetch_data(zip) ─┤
//!                  └── Simulated ─→ sleep(latency) → synthetic::generate
//! ```
//!
//! Each attempt is bounded by the configured timeout. Retryable failures are
//! tried again up to `retry_count` times.

use crate::{
    clock::{Clock, SystemClock},
    error::{SourceError, SourceErrorKind},
    http_source::HttpSource,
    synthetic,
    types::{DataSource, DataSourceConfig, DataSourceMetadata, FetchOptions, StandardMarketData},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay added per failed attempt before retrying
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Uniform contract every market data source implements
///
/// The aggregator only depends on this trait, so tests can substitute
/// scripted sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> DataSource;

    /// Lower values are fetched first
    fn priority(&self) -> u8 {
        self.get_config().priority
    }

    async fn fetch_data(
        &self,
        zip_code: &str,
        options: &FetchOptions,
    ) -> Result<StandardMarketData, SourceError>;

    /// Enabled and reachable
    async fn is_available(&self) -> bool;

    async fn test_connection(&self) -> bool;

    async fn get_metadata(&self) -> DataSourceMetadata;

    /// Snapshot of the adapter's configuration
    fn get_config(&self) -> DataSourceConfig;
}

/// Defaults that distinguish one provider from another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProfile {
    pub source: DataSource,
    pub name: &'static str,
    pub priority: u8,
    /// How long a result from this provider stays useful
    pub cache_ttl: Duration,
    pub base_url: &'static str,
    pub api_version: &'static str,
}

impl SourceProfile {
    /// Profile for an upstream provider. `Mock` and `Aggregated` have none.
    pub fn for_source(source: DataSource) -> Option<Self> {
        let profile = match source {
            DataSource::Zillow => Self {
                source,
                name: "Zillow",
                priority: 1,
                cache_ttl: 24 * HOUR,
                base_url: "https://api.zillow.com/v1",
                api_version: "v1",
            },
            DataSource::Realtor => Self {
                source,
                name: "Realtor.com",
                priority: 2,
                cache_ttl: 24 * HOUR,
                base_url: "https://api.realtor.com/v2",
                api_version: "v2",
            },
            DataSource::Census => Self {
                source,
                name: "US Census Bureau",
                priority: 3,
                cache_ttl: 7 * 24 * HOUR,
                base_url: "https://api.census.gov/data",
                api_version: "2022-acs5",
            },
            DataSource::Mls => Self {
                source,
                name: "MLS",
                priority: 4,
                cache_ttl: 6 * HOUR,
                base_url: "https://api.mlsgrid.com/v2",
                api_version: "v2",
            },
            DataSource::Mock | DataSource::Aggregated => return None,
        };
        Some(profile)
    }

    pub fn default_config(&self) -> DataSourceConfig {
        DataSourceConfig {
            enabled: true,
            api_key: None,
            base_url: self.base_url.to_string(),
            timeout: Duration::from_secs(10),
            retry_count: 3,
            cache_ttl: self.cache_ttl,
            priority: self.priority,
        }
    }
}

/// Where an adapter's records come from
pub enum AdapterMode {
    /// Seeded generator behind an artificial delay; always reachable
    Simulated { latency: Duration },
    Live(HttpSource),
}

/// The one adapter implementation shared by every provider
pub struct MarketDataAdapter {
    profile: SourceProfile,
    config: DataSourceConfig,
    mode: AdapterMode,
    clock: Arc<dyn Clock>,
}

impl MarketDataAdapter {
    pub fn simulated(profile: SourceProfile, config: DataSourceConfig, latency: Duration) -> Self {
        Self {
            profile,
            config,
            mode: AdapterMode::Simulated { latency },
            clock: Arc::new(SystemClock),
        }
    }

    pub fn live(profile: SourceProfile, config: DataSourceConfig) -> Self {
        let http = HttpSource::new(profile.source, &config.base_url, config.api_key.clone());
        Self {
            profile,
            config,
            mode: AdapterMode::Live(http),
            clock: Arc::new(SystemClock),
        }
    }

    /// Live when the config carries an API key, simulated otherwise
    pub fn from_config(
        profile: SourceProfile,
        config: DataSourceConfig,
        simulated_latency: Duration,
    ) -> Self {
        if config.api_key.is_some() {
            Self::live(profile, config)
        } else {
            Self::simulated(profile, config, simulated_latency)
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.mode, AdapterMode::Simulated { .. })
    }

    /// Replace the configuration, rebuilding the HTTP client in live mode
    pub fn reconfigure(&mut self, config: DataSourceConfig) {
        if let AdapterMode::Live(_) = self.mode {
            self.mode = AdapterMode::Live(HttpSource::new(
                self.profile.source,
                &config.base_url,
                config.api_key.clone(),
            ));
        }
        self.config = config;
    }

    async fn fetch_once(
        &self,
        zip_code: &str,
        options: &FetchOptions,
    ) -> Result<StandardMarketData, SourceError> {
        match &self.mode {
            AdapterMode::Simulated { latency } => {
                tokio::time::sleep(*latency).await;
                Ok(synthetic::generate(
                    self.profile.source,
                    zip_code,
                    self.clock.now(),
                ))
            }
            AdapterMode::Live(http) => http.fetch_market(zip_code, options.force_refresh).await,
        }
    }
}

#[async_trait]
impl SourceAdapter for MarketDataAdapter {
    fn source(&self) -> DataSource {
        self.profile.source
    }

    async fn fetch_data(
        &self,
        zip_code: &str,
        options: &FetchOptions,
    ) -> Result<StandardMarketData, SourceError> {
        let source = self.profile.source;

        if !self.config.enabled {
            return Err(SourceError::new(source, SourceErrorKind::Disabled));
        }

        let zip_code = zip_code.trim();
        if !is_valid_zip(zip_code) {
            return Err(SourceError::new(
                source,
                SourceErrorKind::InvalidZipCode(zip_code.to_string()),
            ));
        }

        let attempts = self.config.retry_count.saturating_add(1);
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(
                self.config.timeout,
                self.fetch_once(zip_code, options),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SourceError::new(source, SourceErrorKind::Timeout)),
            };

            match result {
                Ok(record) => {
                    debug!("{} returned data for {} on attempt {}", source, zip_code, attempt);
                    return Ok(record.normalized());
                }
                Err(e) if e.retryable() && attempt < attempts => {
                    warn!(
                        "{} attempt {}/{} for {} failed: {}",
                        source, attempt, attempts, zip_code, e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.config.enabled && self.test_connection().await
    }

    async fn test_connection(&self) -> bool {
        match &self.mode {
            AdapterMode::Simulated { .. } => true,
            AdapterMode::Live(http) => {
                match tokio::time::timeout(self.config.timeout, http.ping()).await {
                    Ok(reachable) => reachable,
                    Err(_) => {
                        warn!("{} health check timed out", self.profile.source);
                        false
                    }
                }
            }
        }
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
        self.config.clone()
    }
}

/// Five digits, optionally followed by `-` and four more
pub fn is_valid_zip(zip_code: &str) -> bool {
    let bytes = zip_code.as_bytes();
    let digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);
    match bytes.len() {
        5 => digits(bytes),
        10 => digits(&bytes[..5]) && bytes[5] == b'-' && digits(&bytes[6..]),
        _ => false,
    }
}
