use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{CandidateColumns, SelectionResult};

/// Direction of the best price relative to the listing price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceKind {
    Equal,
    /// Best price is above the listing price
    Increase,
    /// Best price is below the listing price
    Decrease,
}

impl DifferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifferenceKind::Equal => "equal",
            DifferenceKind::Increase => "increase",
            DifferenceKind::Decrease => "decrease",
        }
    }
}

/// Relative difference between two prices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDifference {
    /// Percentage formatted to 2 decimals
    pub amount: String,

    #[serde(rename = "type")]
    pub kind: DifferenceKind,
}

impl PriceDifference {
    pub fn new(amount: impl Into<String>, kind: DifferenceKind) -> Self {
        Self {
            amount: amount.into(),
            kind,
        }
    }
}

/// How closely the winner's title matched the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    /// Similarity >= 0.95
    Exact,
    /// Similarity >= 0.70
    Close,
    /// Anything accepted below that, typically after ramp-down
    Loose,
}

impl MatchQuality {
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity >= 0.95 {
            MatchQuality::Exact
        } else if similarity >= 0.70 {
            MatchQuality::Close
        } else {
            MatchQuality::Loose
        }
    }
}

/// Result of comparing one listing against the competitor corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub listing_title: String,
    pub listing_price: f64,

    /// The winning competitor
    pub best: SelectionResult,

    /// Winner similarity as a percentage, 2 decimals
    pub best_score: f64,

    pub match_quality: MatchQuality,

    /// Quality rating 0-5, 1 decimal
    pub price_rating: f64,

    /// Best total (price + shipping) relative to the listing price
    pub price_difference: PriceDifference,

    /// Every accepted candidate, in page order
    pub candidates: CandidateColumns,

    pub total_items: usize,

    #[serde(default)]
    pub country_counts: BTreeMap<String, usize>,

    /// Scorer used (gestalt, indel)
    pub scoring_method: String,

    /// Search latency in milliseconds
    pub latency_ms: f64,

    pub generated_at: DateTime<Utc>,
}

impl ComparisonReport {
    /// Get display string for logging
    pub fn display(&self) -> String {
        format!(
            "{} -> {} ({}%, {:?}) rating {:.1} [{} {}%]",
            self.listing_title,
            self.best.title,
            self.best_score,
            self.match_quality,
            self.price_rating,
            self.price_difference.kind.as_str(),
            self.price_difference.amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_quality_thresholds() {
        assert_eq!(MatchQuality::from_similarity(1.0), MatchQuality::Exact);
        assert_eq!(MatchQuality::from_similarity(0.95), MatchQuality::Exact);
        assert_eq!(MatchQuality::from_similarity(0.7), MatchQuality::Close);
        assert_eq!(MatchQuality::from_similarity(0.2), MatchQuality::Loose);
    }

    #[test]
    fn test_price_difference_serialization() {
        let diff = PriceDifference::new("33.33", DifferenceKind::Decrease);
        let json = serde_json::to_string(&diff).unwrap();
        assert_eq!(json, r#"{"amount":"33.33","type":"decrease"}"#);
    }
}
