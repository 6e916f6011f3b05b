//! Market data aggregation service
//!
//! Fetches real-estate market snapshots for a ZIP code from several
//! providers, scores each one, and merges them into a single record.
//!
//! # Core Types
//!
//! - [`MarketDataAggregator`] - drives the adapters and applies a strategy
//! - [`SourceAdapter`] - contract every provider implements
//! - [`MarketDataAdapter`] - the shared live/simulated adapter
//! - [`StandardMarketData`] / [`AggregatedMarketData`] - records in and out

pub mod adapter;
pub mod aggregator;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http_source;
pub mod quality;
pub mod strategy;
pub mod synthetic;
pub mod types;

pub use adapter::{AdapterMode, MarketDataAdapter, SourceAdapter, SourceProfile};
pub use aggregator::MarketDataAggregator;
pub use error::{AggregationError, MarketError, SourceError, SourceErrorKind};
pub use quality::assess_data_quality;
pub use types::{
    AggregatedMarketData, AggregationConfig, AggregationStrategy, ConflictResolution, DataQuality,
    DataSource, DataSourceConfig, DataSourceMetadata, FetchOptions, StandardMarketData,
};
