use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Provider of a market record
///
/// `Aggregated` is only ever produced by the aggregator, adapters tag
/// records with their own source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    Zillow,
    Realtor,
    Census,
    Mls,
    Mock,
    Aggregated,
}

impl DataSource {
    /// The four upstream providers, in default priority order
    pub const UPSTREAM: [DataSource; 4] = [
        DataSource::Zillow,
        DataSource::Realtor,
        DataSource::Census,
        DataSource::Mls,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Zillow => "ZILLOW",
            DataSource::Realtor => "REALTOR",
            DataSource::Census => "CENSUS",
            DataSource::Mls => "MLS",
            DataSource::Mock => "MOCK",
            DataSource::Aggregated => "AGGREGATED",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ZILLOW" => Ok(DataSource::Zillow),
            "REALTOR" => Ok(DataSource::Realtor),
            "CENSUS" => Ok(DataSource::Census),
            "MLS" => Ok(DataSource::Mls),
            "MOCK" => Ok(DataSource::Mock),
            "AGGREGATED" => Ok(DataSource::Aggregated),
            other => Err(format!("unknown data source: {}", other)),
        }
    }
}

/// Normalized market snapshot for one ZIP code
///
/// Every adapter converts its upstream payload into this shape. Numeric
/// fields are either present or `None`; `Decimal` has no NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMarketData {
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Monthly median rent
    #[serde(default)]
    pub median_rent: Option<Decimal>,
    #[serde(default)]
    pub median_price: Option<Decimal>,
    /// Signed percentage
    #[serde(default)]
    pub rent_growth_12mo: Option<Decimal>,
    /// Signed percentage
    #[serde(default)]
    pub appreciation_rate_12mo: Option<Decimal>,
    #[serde(default)]
    pub vacancy_rate: Option<Decimal>,
    #[serde(default)]
    pub foreclosure_rate: Option<Decimal>,
    #[serde(default)]
    pub days_on_market: Option<u32>,
    /// 0-100
    #[serde(default)]
    pub economic_diversity_index: Option<Decimal>,
    /// 0-100
    #[serde(default)]
    pub crime_safety_score: Option<Decimal>,
    /// 0-10
    #[serde(default)]
    pub school_rating: Option<Decimal>,

    pub date_updated: DateTime<Utc>,
    pub data_source: DataSource,
    /// 0-100, self-reported by the source or computed by the aggregator
    #[serde(default)]
    pub confidence: Option<Decimal>,
}

impl StandardMarketData {
    /// Empty record for a ZIP code; every metric absent
    pub fn empty(zip_code: &str, data_source: DataSource, date_updated: DateTime<Utc>) -> Self {
        Self {
            zip_code: zip_code.to_string(),
            city: None,
            state: None,
            median_rent: None,
            median_price: None,
            rent_growth_12mo: None,
            appreciation_rate_12mo: None,
            vacancy_rate: None,
            foreclosure_rate: None,
            days_on_market: None,
            economic_diversity_index: None,
            crime_safety_score: None,
            school_rating: None,
            date_updated,
            data_source,
            confidence: None,
        }
    }

    /// Clamp bounded scores into their documented ranges
    pub fn normalized(mut self) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        self.confidence = self.confidence.map(|v| v.clamp(Decimal::ZERO, hundred));
        self.economic_diversity_index = self
            .economic_diversity_index
            .map(|v| v.clamp(Decimal::ZERO, hundred));
        self.crime_safety_score = self.crime_safety_score.map(|v| v.clamp(Decimal::ZERO, hundred));
        self.school_rating = self.school_rating.map(|v| v.clamp(Decimal::ZERO, Decimal::TEN));
        self
    }
}

/// Numeric fields of [`StandardMarketData`] that strategies merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketField {
    MedianRent,
    MedianPrice,
    RentGrowth12mo,
    AppreciationRate12mo,
    VacancyRate,
    ForeclosureRate,
    DaysOnMarket,
    EconomicDiversityIndex,
    CrimeSafetyScore,
    SchoolRating,
}

impl MarketField {
    pub const ALL: [MarketField; 10] = [
        MarketField::MedianRent,
        MarketField::MedianPrice,
        MarketField::RentGrowth12mo,
        MarketField::AppreciationRate12mo,
        MarketField::VacancyRate,
        MarketField::ForeclosureRate,
        MarketField::DaysOnMarket,
        MarketField::EconomicDiversityIndex,
        MarketField::CrimeSafetyScore,
        MarketField::SchoolRating,
    ];

    /// Fields counted by the completeness score
    pub const REQUIRED: [MarketField; 6] = [
        MarketField::MedianRent,
        MarketField::MedianPrice,
        MarketField::RentGrowth12mo,
        MarketField::AppreciationRate12mo,
        MarketField::VacancyRate,
        MarketField::DaysOnMarket,
    ];

    pub fn get(&self, record: &StandardMarketData) -> Option<Decimal> {
        match self {
            MarketField::MedianRent => record.median_rent,
            MarketField::MedianPrice => record.median_price,
            MarketField::RentGrowth12mo => record.rent_growth_12mo,
            MarketField::AppreciationRate12mo => record.appreciation_rate_12mo,
            MarketField::VacancyRate => record.vacancy_rate,
            MarketField::ForeclosureRate => record.foreclosure_rate,
            MarketField::DaysOnMarket => record.days_on_market.map(Decimal::from),
            MarketField::EconomicDiversityIndex => record.economic_diversity_index,
            MarketField::CrimeSafetyScore => record.crime_safety_score,
            MarketField::SchoolRating => record.school_rating,
        }
    }

    /// Store a value; days on market is rounded to whole days
    pub fn set(&self, record: &mut StandardMarketData, value: Option<Decimal>) {
        match self {
            MarketField::MedianRent => record.median_rent = value,
            MarketField::MedianPrice => record.median_price = value,
            MarketField::RentGrowth12mo => record.rent_growth_12mo = value,
            MarketField::AppreciationRate12mo => record.appreciation_rate_12mo = value,
            MarketField::VacancyRate => record.vacancy_rate = value,
            MarketField::ForeclosureRate => record.foreclosure_rate = value,
            MarketField::DaysOnMarket => {
                record.days_on_market = value.and_then(|v| {
                    use rust_decimal::prelude::ToPrimitive;
                    v.round().to_u32()
                })
            }
            MarketField::EconomicDiversityIndex => record.economic_diversity_index = value,
            MarketField::CrimeSafetyScore => record.crime_safety_score = value,
            MarketField::SchoolRating => record.school_rating = value,
        }
    }
}

/// Per-adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub retry_count: u32,
    pub cache_ttl: Duration,
    /// Lower is tried first
    pub priority: u8,
}

/// Descriptive info an adapter reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceMetadata {
    pub name: String,
    pub source: DataSource,
    pub available: bool,
    pub api_version: String,
}

/// Quality verdict for one fetched record, all scores in [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub completeness: Decimal,
    pub freshness: Decimal,
    pub accuracy: Decimal,
    pub overall: Decimal,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationStrategy {
    #[default]
    WeightedAverage,
    Priority,
    BestQuality,
    Consensus,
}

impl FromStr for AggregationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEIGHTED_AVERAGE" => Ok(AggregationStrategy::WeightedAverage),
            "PRIORITY" => Ok(AggregationStrategy::Priority),
            "BEST_QUALITY" => Ok(AggregationStrategy::BestQuality),
            "CONSENSUS" => Ok(AggregationStrategy::Consensus),
            other => Err(format!("unknown aggregation strategy: {}", other)),
        }
    }
}

/// Which source supplies the non-numeric fields of a blended record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    #[default]
    PreferNewest,
    PreferPriority,
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PREFER_NEWEST" => Ok(ConflictResolution::PreferNewest),
            "PREFER_PRIORITY" => Ok(ConflictResolution::PreferPriority),
            other => Err(format!("unknown conflict resolution: {}", other)),
        }
    }
}

/// Policy for one aggregator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationConfig {
    pub strategy: AggregationStrategy,
    /// Only consulted by `WeightedAverage`
    pub weights: BTreeMap<DataSource, Decimal>,
    pub minimum_sources: usize,
    pub required_sources: Vec<DataSource>,
    pub conflict_resolution: ConflictResolution,
}

impl AggregationConfig {
    /// Weight used for sources missing from `weights`
    pub const DEFAULT_WEIGHT: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

    pub fn default_weights() -> BTreeMap<DataSource, Decimal> {
        BTreeMap::from([
            (DataSource::Zillow, Decimal::new(30, 2)),
            (DataSource::Realtor, Decimal::new(30, 2)),
            (DataSource::Mls, Decimal::new(25, 2)),
            (DataSource::Census, Decimal::new(15, 2)),
        ])
    }

    pub fn weight_for(&self, source: DataSource) -> Decimal {
        self.weights
            .get(&source)
            .copied()
            .unwrap_or(Self::DEFAULT_WEIGHT)
    }

    pub fn with_strategy(mut self, strategy: AggregationStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            strategy: AggregationStrategy::WeightedAverage,
            weights: Self::default_weights(),
            minimum_sources: 1,
            required_sources: Vec::new(),
            conflict_resolution: ConflictResolution::PreferNewest,
        }
    }
}

/// Caller options for a fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    /// Bypass any caller-side cache
    #[serde(default)]
    pub force_refresh: bool,
}

/// Merged record plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMarketData {
    #[serde(flatten)]
    pub data: StandardMarketData,
    /// Contributing sources in priority order
    pub sources: Vec<DataSource>,
    pub source_data: BTreeMap<DataSource, StandardMarketData>,
    pub aggregation_strategy: AggregationStrategy,
    pub quality_scores: BTreeMap<DataSource, DataQuality>,
    #[serde(default)]
    pub failed_sources: Vec<DataSource>,
}
