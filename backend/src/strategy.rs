//! Aggregation Strategies
//!
//! Merge several sources' records into one. Every function takes the
//! samples in adapter priority order; that order breaks every tie.
//!
//! | Strategy          | Numeric fields                         | Confidence            |
//! |-------------------|----------------------------------------|-----------------------|
//! | `WeightedAverage` | Σ(v·w·q) / Σ(w·q)                      | mean quality + bonus  |
//! | `Priority`        | first source that reports the field    | 75                    |
//! | `BestQuality`     | whole record of the best-scored source | as reported           |
//! | `Consensus`       | median of the reported values          | mean quality + bonus  |

use crate::types::{
    AggregationConfig, AggregationStrategy, ConflictResolution, DataQuality, DataSource,
    MarketField, StandardMarketData,
};
use rust_decimal::Decimal;

/// Confidence assigned to priority-merged records
const PRIORITY_CONFIDENCE: i64 = 75;

/// Decimal places kept on blended values
const BLEND_DP: u32 = 4;

/// One successful source fetch, scored
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSample {
    pub source: DataSource,
    pub record: StandardMarketData,
    pub quality: DataQuality,
}

/// Run `strategy` over `samples`; `None` when there is nothing to merge
pub fn apply(
    strategy: AggregationStrategy,
    samples: &[SourceSample],
    config: &AggregationConfig,
) -> Option<StandardMarketData> {
    match strategy {
        AggregationStrategy::WeightedAverage => weighted_average(samples, config),
        AggregationStrategy::Priority => priority(samples),
        AggregationStrategy::BestQuality => best_quality(samples),
        AggregationStrategy::Consensus => consensus(samples, config.conflict_resolution),
    }
}

/// Weighted mean per field, each source weighted by its configured weight
/// scaled by its overall quality
pub fn weighted_average(
    samples: &[SourceSample],
    config: &AggregationConfig,
) -> Option<StandardMarketData> {
    let mut merged = blended_template(samples, config.conflict_resolution)?;

    for field in MarketField::ALL {
        let points: Vec<(Decimal, Decimal)> = samples
            .iter()
            .filter_map(|sample| {
                field.get(&sample.record).map(|value| {
                    let weight = config.weight_for(sample.source).max(Decimal::ZERO);
                    let quality_factor = sample.quality.overall / Decimal::ONE_HUNDRED;
                    (value, weight * quality_factor)
                })
            })
            .collect();

        field.set(&mut merged, weighted_mean(&points));
    }

    merged.confidence = Some(blended_confidence(samples));
    Some(merged)
}

/// Field-by-field fall-through in priority order
pub fn priority(samples: &[SourceSample]) -> Option<StandardMarketData> {
    let first = samples.first()?;
    let mut merged = StandardMarketData::empty(
        &first.record.zip_code,
        DataSource::Aggregated,
        first.record.date_updated,
    );
    merged.city = samples.iter().find_map(|s| s.record.city.clone());
    merged.state = samples.iter().find_map(|s| s.record.state.clone());

    for field in MarketField::ALL {
        let value = samples.iter().find_map(|s| field.get(&s.record));
        field.set(&mut merged, value);
    }

    merged.confidence = Some(Decimal::from(PRIORITY_CONFIDENCE));
    Some(merged)
}

/// The record of the source with the highest overall quality, unchanged
pub fn best_quality(samples: &[SourceSample]) -> Option<StandardMarketData> {
    let mut best = samples.first()?;
    for sample in &samples[1..] {
        if sample.quality.overall > best.quality.overall {
            best = sample;
        }
    }
    Some(best.record.clone())
}

/// Median per field
pub fn consensus(
    samples: &[SourceSample],
    resolution: ConflictResolution,
) -> Option<StandardMarketData> {
    let mut merged = blended_template(samples, resolution)?;

    for field in MarketField::ALL {
        let values: Vec<Decimal> = samples
            .iter()
            .filter_map(|s| field.get(&s.record))
            .collect();
        field.set(&mut merged, median(values));
    }

    merged.confidence = Some(blended_confidence(samples));
    Some(merged)
}

/// Mean overall quality plus 5 per source (at most 20), capped at 100
pub fn blended_confidence(samples: &[SourceSample]) -> Decimal {
    if samples.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = samples.iter().map(|s| s.quality.overall).sum();
    let mean = total / Decimal::from(samples.len());
    let bonus = Decimal::from((5 * samples.len()).min(20));
    (mean + bonus).min(Decimal::ONE_HUNDRED).round_dp(2)
}

/// Empty aggregated record carrying the identifying fields of one source
fn blended_template(
    samples: &[SourceSample],
    resolution: ConflictResolution,
) -> Option<StandardMarketData> {
    let mut chosen = samples.first()?;
    if resolution == ConflictResolution::PreferNewest {
        for sample in &samples[1..] {
            if sample.record.date_updated > chosen.record.date_updated {
                chosen = sample;
            }
        }
    }

    let mut merged = StandardMarketData::empty(
        &chosen.record.zip_code,
        DataSource::Aggregated,
        chosen.record.date_updated,
    );
    merged.city = chosen.record.city.clone();
    merged.state = chosen.record.state.clone();
    Some(merged)
}

/// Weighted mean of `(value, weight)` pairs, kept inside the inputs' range
///
/// Falls back to the plain mean when every weight is zero, and to the median
/// when the weighted sums would overflow.
fn weighted_mean(points: &[(Decimal, Decimal)]) -> Option<Decimal> {
    let min = points.iter().map(|(v, _)| *v).min()?;
    let max = points.iter().map(|(v, _)| *v).max()?;

    let values: Vec<Decimal> = points.iter().map(|(v, _)| *v).collect();
    let mean = checked_weighted_mean(points)
        .or_else(|| checked_mean(&values))
        .or_else(|| median(values))?;

    Some(mean.round_dp(BLEND_DP).clamp(min, max))
}

/// `None` on overflow or when the weights sum to zero
fn checked_weighted_mean(points: &[(Decimal, Decimal)]) -> Option<Decimal> {
    let mut total_weight = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;
    for (value, weight) in points {
        total_weight = total_weight.checked_add(*weight)?;
        weighted = weighted.checked_add(value.checked_mul(*weight)?)?;
    }

    if total_weight.is_zero() {
        return None;
    }
    weighted.checked_div(total_weight)
}

fn checked_mean(values: &[Decimal]) -> Option<Decimal> {
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(*value))?;
    sum.checked_div(Decimal::from(values.len()))
}

/// Middle value; the mean of the two middle values for even counts
fn median(mut values: Vec<Decimal>) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort();

    let len = values.len();
    if len % 2 == 1 {
        return Some(values[len / 2]);
    }

    let (low, high) = (values[len / 2 - 1], values[len / 2]);
    // Sorted, so `high - low` cannot overflow when `low + high` does
    match low.checked_add(high) {
        Some(sum) => Some(sum / Decimal::TWO),
        None => Some(low + (high - low) / Decimal::TWO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn quality(overall: Decimal) -> DataQuality {
        DataQuality {
            completeness: dec!(100),
            freshness: dec!(100),
            accuracy: overall,
            overall,
            warnings: Vec::new(),
        }
    }

    fn sample(source: DataSource, rent: Option<Decimal>, overall: Decimal) -> SourceSample {
        let mut record = StandardMarketData::empty("78701", source, now());
        record.median_rent = rent;
        SourceSample {
            source,
            record,
            quality: quality(overall),
        }
    }

    #[test]
    fn test_median_odd_count() {
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1000)), dec!(90)),
            sample(DataSource::Realtor, Some(dec!(1400)), dec!(90)),
            sample(DataSource::Census, Some(dec!(1200)), dec!(90)),
        ];

        let merged = consensus(&samples, ConflictResolution::PreferNewest).unwrap();

        // Median of [1000, 1200, 1400] = 1200
        assert_eq!(merged.median_rent, Some(dec!(1200)));
        assert_eq!(merged.data_source, DataSource::Aggregated);
    }

    #[test]
    fn test_median_even_count() {
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1000)), dec!(90)),
            sample(DataSource::Realtor, Some(dec!(1200)), dec!(90)),
        ];

        let merged = consensus(&samples, ConflictResolution::PreferNewest).unwrap();

        // Median of [1000, 1200] = (1000 + 1200) / 2 = 1100
        assert_eq!(merged.median_rent, Some(dec!(1100)));
    }

    #[test]
    fn test_consensus_ignores_sources_without_the_field() {
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1000)), dec!(90)),
            sample(DataSource::Realtor, None, dec!(90)),
            sample(DataSource::Mls, Some(dec!(1300)), dec!(90)),
        ];

        let merged = consensus(&samples, ConflictResolution::PreferNewest).unwrap();

        assert_eq!(merged.median_rent, Some(dec!(1150)));
        assert_eq!(merged.median_price, None);
    }

    #[test]
    fn test_weighted_average_uses_weight_and_quality() {
        let config = AggregationConfig::default();
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1000)), dec!(100)),
            sample(DataSource::Census, Some(dec!(2000)), dec!(50)),
        ];

        let merged = weighted_average(&samples, &config).unwrap();

        // Zillow: 0.30 × 1.0 = 0.30, Census: 0.15 × 0.5 = 0.075
        // (1000 × 0.30 + 2000 × 0.075) / 0.375 = 1200
        assert_eq!(merged.median_rent, Some(dec!(1200)));
    }

    #[test]
    fn test_weighted_average_stays_within_inputs() {
        let config = AggregationConfig::default();
        let cases = [
            vec![(dec!(1000), dec!(73.33)), (dec!(1000), dec!(91.7)), (dec!(1000), dec!(12.5))],
            vec![(dec!(999.99), dec!(99.99)), (dec!(1000.01), dec!(0.01))],
            vec![(dec!(-2.5), dec!(60)), (dec!(4.75), dec!(88.8)), (dec!(0.1), dec!(33.3))],
        ];
        let sources = [DataSource::Zillow, DataSource::Realtor, DataSource::Mls];

        for case in cases {
            let samples: Vec<SourceSample> = case
                .iter()
                .zip(sources)
                .map(|((rent, overall), source)| sample(source, Some(*rent), *overall))
                .collect();
            let min = case.iter().map(|(v, _)| *v).min().unwrap();
            let max = case.iter().map(|(v, _)| *v).max().unwrap();

            let rent = weighted_average(&samples, &config)
                .unwrap()
                .median_rent
                .unwrap();

            assert!(rent >= min && rent <= max, "{} outside [{}, {}]", rent, min, max);
        }
    }

    #[test]
    fn test_weighted_average_zero_quality_falls_back_to_mean() {
        let config = AggregationConfig::default();
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1000)), dec!(0)),
            sample(DataSource::Realtor, Some(dec!(2000)), dec!(0)),
        ];

        let merged = weighted_average(&samples, &config).unwrap();

        assert_eq!(merged.median_rent, Some(dec!(1500)));
    }

    #[test]
    fn test_blended_confidence_rewards_corroboration() {
        let two = vec![
            sample(DataSource::Zillow, None, dec!(80)),
            sample(DataSource::Realtor, None, dec!(70)),
        ];
        // mean 75 + 2 × 5
        assert_eq!(blended_confidence(&two), dec!(85));

        let five: Vec<SourceSample> = [
            DataSource::Zillow,
            DataSource::Realtor,
            DataSource::Census,
            DataSource::Mls,
            DataSource::Mock,
        ]
        .into_iter()
        .map(|s| sample(s, None, dec!(90)))
        .collect();
        // bonus capped at 20, total capped at 100
        assert_eq!(blended_confidence(&five), dec!(100));
    }

    #[test]
    fn test_priority_falls_through_missing_fields() {
        let mut zillow = sample(DataSource::Zillow, Some(dec!(1500)), dec!(90));
        let mut realtor = sample(DataSource::Realtor, Some(dec!(1700)), dec!(80));
        realtor.record.school_rating = Some(dec!(8));
        realtor.record.city = Some("Austin".to_string());
        zillow.record.days_on_market = Some(21);

        let merged = priority(&[zillow, realtor]).unwrap();

        assert_eq!(merged.median_rent, Some(dec!(1500)));
        assert_eq!(merged.school_rating, Some(dec!(8)));
        assert_eq!(merged.days_on_market, Some(21));
        assert_eq!(merged.city.as_deref(), Some("Austin"));
        assert_eq!(merged.confidence, Some(dec!(75)));
    }

    #[test]
    fn test_best_quality_returns_record_verbatim() {
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1500)), dec!(80)),
            sample(DataSource::Mls, Some(dec!(1600)), dec!(95)),
        ];

        let merged = best_quality(&samples).unwrap();

        assert_eq!(merged, samples[1].record);
    }

    #[test]
    fn test_best_quality_tie_goes_to_higher_priority() {
        let samples = vec![
            sample(DataSource::Realtor, Some(dec!(1500)), dec!(88)),
            sample(DataSource::Census, Some(dec!(1600)), dec!(88)),
        ];

        let merged = best_quality(&samples).unwrap();

        assert_eq!(merged.data_source, DataSource::Realtor);
    }

    #[test]
    fn test_conflict_resolution_picks_identity_source() {
        let mut zillow = sample(DataSource::Zillow, Some(dec!(1500)), dec!(90));
        zillow.record.city = Some("Round Rock".to_string());
        zillow.record.date_updated = now() - Duration::days(3);
        let mut mls = sample(DataSource::Mls, Some(dec!(1500)), dec!(90));
        mls.record.city = Some("Austin".to_string());
        let samples = vec![zillow, mls];

        let newest = consensus(&samples, ConflictResolution::PreferNewest).unwrap();
        let first = consensus(&samples, ConflictResolution::PreferPriority).unwrap();

        assert_eq!(newest.city.as_deref(), Some("Austin"));
        assert_eq!(newest.date_updated, now());
        assert_eq!(first.city.as_deref(), Some("Round Rock"));
    }

    #[test]
    fn test_empty_samples_produce_nothing() {
        let config = AggregationConfig::default();
        for strategy in [
            AggregationStrategy::WeightedAverage,
            AggregationStrategy::Priority,
            AggregationStrategy::BestQuality,
            AggregationStrategy::Consensus,
        ] {
            assert!(apply(strategy, &[], &config).is_none());
        }
    }

    #[test]
    fn test_consensus_near_decimal_max() {
        let huge = Decimal::MAX - dec!(1);
        let samples = vec![
            sample(DataSource::Zillow, Some(huge), dec!(90)),
            sample(DataSource::Realtor, Some(huge), dec!(90)),
        ];

        let merged = consensus(&samples, ConflictResolution::PreferNewest).unwrap();

        assert_eq!(merged.median_rent, Some(huge));
    }

    #[test]
    fn test_even_median_of_large_values() {
        let low = Decimal::MAX - dec!(10);
        let high = Decimal::MAX - dec!(2);

        assert_eq!(median(vec![high, low]), Some(Decimal::MAX - dec!(6)));
    }

    #[test]
    fn test_weighted_average_near_decimal_max() {
        let huge = Decimal::MAX - dec!(1);
        let samples = vec![
            sample(DataSource::Zillow, Some(huge), dec!(90)),
            sample(DataSource::Realtor, Some(huge), dec!(80)),
            sample(DataSource::Census, Some(huge), dec!(70)),
            sample(DataSource::Mls, Some(huge), dec!(60)),
        ];

        let merged = weighted_average(&samples, &AggregationConfig::default()).unwrap();

        assert_eq!(merged.median_rent, Some(huge));
    }

    #[test]
    fn test_oversized_weight_falls_back_to_plain_mean() {
        let mut config = AggregationConfig::default();
        config.weights.insert(DataSource::Zillow, Decimal::MAX);
        let samples = vec![
            sample(DataSource::Zillow, Some(dec!(1000)), dec!(100)),
            sample(DataSource::Realtor, Some(dec!(1200)), dec!(100)),
        ];

        let merged = weighted_average(&samples, &config).unwrap();

        // 1000 * MAX overflows, so the unweighted mean is used
        assert_eq!(merged.median_rent, Some(dec!(1100)));
    }
}
