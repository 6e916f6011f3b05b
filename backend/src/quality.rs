//! Quality Assessor
//!
//! Scores one fetched record before it is merged with other sources.
//!
//! ```text
//! completeness  share of the six required fields present
//! freshness     age of the record: ≤7d 100, ≤30d 80, ≤90d 60, older 30
//! accuracy      the record's own confidence (70 when unreported)
//!
//! overall = 0.4 × completeness + 0.3 × freshness + 0.3 × accuracy
//! ```
//!
//! Accuracy is self-reported by the source. Nothing here checks it against
//! ground truth, so a source that overstates its confidence is scored higher.

use crate::types::{DataQuality, MarketField, StandardMarketData};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Accuracy assumed when a source does not report confidence
const DEFAULT_ACCURACY: i64 = 70;

/// Score a record against the clock reading `now`
///
/// Pure: the same record and instant always give the same verdict.
pub fn assess_data_quality(record: &StandardMarketData, now: DateTime<Utc>) -> DataQuality {
    let mut warnings = Vec::new();

    let present = MarketField::REQUIRED
        .iter()
        .filter(|field| field.get(record).is_some())
        .count();
    let completeness = (Decimal::from(present) * Decimal::ONE_HUNDRED
        / Decimal::from(MarketField::REQUIRED.len()))
    .round_dp(2);
    if completeness < Decimal::ONE_HUNDRED {
        warnings.push(format!("Data is {}% complete", completeness.round()));
    }

    let age_days = (now - record.date_updated).num_days().max(0);
    let freshness = Decimal::from(freshness_for_age(age_days));
    if age_days > 90 {
        warnings.push("Data is more than 90 days old".to_string());
    } else if age_days > 30 {
        warnings.push("Data is more than 30 days old".to_string());
    }

    let accuracy = match record.confidence {
        Some(confidence) => confidence.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
        None => {
            warnings.push(format!(
                "Source did not report confidence; assuming {}",
                DEFAULT_ACCURACY
            ));
            Decimal::from(DEFAULT_ACCURACY)
        }
    };

    let overall = (Decimal::new(4, 1) * completeness
        + Decimal::new(3, 1) * freshness
        + Decimal::new(3, 1) * accuracy)
        .round_dp(2)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);

    DataQuality {
        completeness,
        freshness,
        accuracy,
        overall,
        warnings,
    }
}

fn freshness_for_age(age_days: i64) -> i64 {
    match age_days {
        ..=7 => 100,
        8..=30 => 80,
        31..=90 => 60,
        _ => 30,
    }
}
