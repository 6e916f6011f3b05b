use crate::types::DataSource;
use thiserror::Error;

/// Why a single adapter failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceErrorKind {
    #[error("adapter is disabled")]
    Disabled,

    #[error("invalid ZIP code: {0}")]
    InvalidZipCode(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Failure raised by one adapter. The aggregator collects these and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{data_source} error: {kind}")]
pub struct SourceError {
    pub data_source: DataSource,
    pub kind: SourceErrorKind,
}

impl SourceError {
    pub fn new(data_source: DataSource, kind: SourceErrorKind) -> Self {
        Self { data_source, kind }
    }

    /// Whether the same request may succeed if tried again
    pub fn retryable(&self) -> bool {
        match &self.kind {
            SourceErrorKind::Disabled
            | SourceErrorKind::InvalidZipCode(_)
            | SourceErrorKind::Decode(_) => false,
            SourceErrorKind::Timeout | SourceErrorKind::Request(_) => true,
            SourceErrorKind::Status(code) => *code == 429 || *code >= 500,
        }
    }

    /// Upstream status code, when the failure came from an HTTP response
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            SourceErrorKind::Status(code) => Some(code),
            _ => None,
        }
    }
}

/// Raised when the source policy cannot be met after every adapter was tried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("{succeeded} sources returned data, at least {required} needed (failed: {failed:?})")]
    InsufficientSources {
        required: usize,
        succeeded: usize,
        failed: Vec<DataSource>,
    },

    #[error("required sources missing: {missing:?}")]
    MissingRequiredSources { missing: Vec<DataSource> },
}

impl AggregationError {
    /// Sources that failed or are missing
    pub fn sources(&self) -> &[DataSource] {
        match self {
            AggregationError::InsufficientSources { failed, .. } => failed,
            AggregationError::MissingRequiredSources { missing } => missing,
        }
    }
}

/// Service-level errors surfaced by the cache and HTTP layers
#[derive(Error, Debug)]
pub enum MarketError {
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, MarketError>;
