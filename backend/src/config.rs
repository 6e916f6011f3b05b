use crate::{
    adapter::SourceProfile,
    types::{AggregationConfig, DataSource, DataSourceConfig},
};
use anyhow::{anyhow, bail};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Redis connection string; no caching when unset
    pub redis_url: Option<String>,

    /// Artificial delay of adapters running without credentials
    pub simulated_latency: Duration,

    /// Aggregation policy
    pub aggregation: AggregationConfig,

    /// One entry per upstream provider
    pub sources: Vec<(SourceProfile, DataSourceConfig)>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut aggregation = AggregationConfig {
            strategy: parse_or(&lookup, "AGGREGATION_STRATEGY", Default::default())?,
            minimum_sources: parse_or(&lookup, "MINIMUM_SOURCES", 1)?,
            required_sources: parse_sources(&lookup, "REQUIRED_SOURCES")?,
            conflict_resolution: parse_or(&lookup, "CONFLICT_RESOLUTION", Default::default())?,
            ..AggregationConfig::default()
        };

        let mut sources = Vec::new();
        for source in DataSource::UPSTREAM {
            let Some(profile) = SourceProfile::for_source(source) else {
                continue;
            };
            let prefix = source.as_str();
            let defaults = profile.default_config();

            let key = |suffix: &str| format!("{}_{}", prefix, suffix);
            let config = DataSourceConfig {
                enabled: parse_or(&lookup, &key("ENABLED"), defaults.enabled)?,
                api_key: lookup(key("API_KEY").as_str()).filter(|k| !k.trim().is_empty()),
                base_url: lookup(key("BASE_URL").as_str()).unwrap_or(defaults.base_url),
                timeout: Duration::from_millis(parse_or(
                    &lookup,
                    &key("TIMEOUT_MS"),
                    defaults.timeout.as_millis() as u64,
                )?),
                retry_count: parse_or(&lookup, &key("RETRY_COUNT"), defaults.retry_count)?,
                cache_ttl: defaults.cache_ttl,
                priority: parse_or(&lookup, &key("PRIORITY"), defaults.priority)?,
            };

            if let Some(raw) = lookup(key("WEIGHT").as_str()) {
                let weight: Decimal = parse_value(&key("WEIGHT"), &raw)?;
                if weight.is_sign_negative() {
                    bail!("{} must not be negative, got {}", key("WEIGHT"), raw);
                }
                aggregation.weights.insert(source, weight);
            }

            sources.push((profile, config));
        }

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            simulated_latency: Duration::from_millis(parse_or(
                &lookup,
                "SIMULATED_LATENCY_MS",
                300,
            )?),
            aggregation,
            sources,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid {}={:?}: {}", key, raw, e))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_sources<F>(lookup: &F, key: &str) -> anyhow::Result<Vec<DataSource>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Vec::new());
    };

    let mut sources = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let source: DataSource = parse_value(key, part)?;
        if !DataSource::UPSTREAM.contains(&source) {
            bail!("{} may only name upstream sources, got {}", key, source);
        }
        sources.push(source);
    }
    Ok(sources)
}
