//! Turns one page of competitor rows into normalized candidate records.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::core::{CandidateRecord, RawCompetitorRow, RawListingText};
use crate::outliers::{reject_outliers, remove_indices};

static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+\.[0-9]+)|([0-9]+,[0-9]+)").expect("valid regex"));

static SHIPPING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+.*[0-9])|(Free)|(not specified)").expect("valid regex")
});

const ORIGIN_PREFIX: &str = "from ";

/// When and how hard to prune price outliers from a page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierPolicy {
    /// Minimum page size before any pruning happens
    pub min_sample: usize,

    /// MAD multiplier; see [`reject_outliers`]
    pub m: f64,
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        Self {
            min_sample: 100,
            m: 1.5,
        }
    }
}

/// First `123.45` or `1,234` style number in `text`, commas removed
pub fn parse_price(text: &str) -> Option<f64> {
    PRICE_PATTERN
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
}

/// Shipping cost from free text. "Free", "not specified" and text with no
/// recognizable amount all cost 0.0.
pub fn parse_shipping(text: &str) -> f64 {
    let Some(captures) = SHIPPING_PATTERN.captures(text) else {
        return 0.0;
    };

    match captures.get(1) {
        Some(amount) => match amount.as_str().replace(',', "").parse::<f64>() {
            Ok(cost) => cost,
            Err(_) => {
                tracing::warn!("Unreadable shipping amount '{}', assuming 0.00", amount.as_str());
                0.0
            }
        },
        None => 0.0,
    }
}

/// Drop a leading "from " from item location text
pub fn strip_origin(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix(ORIGIN_PREFIX)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Convert a scraped row into a numeric row. Rows without a parseable
/// price are dropped.
pub fn parse_row(raw: &RawListingText) -> Option<RawCompetitorRow> {
    let Some(price) = parse_price(&raw.price) else {
        tracing::debug!("Skipping '{}': no price in '{}'", raw.title, raw.price);
        return None;
    };

    Some(
        RawCompetitorRow::new(raw.title.trim(), price)
            .with_shipping(parse_shipping(&raw.shipping))
            .with_country(strip_origin(&raw.location))
            .with_condition(raw.condition.trim()),
    )
}

fn is_valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Normalize one page of rows.
///
/// Rows with negative or non-finite amounts are discarded. Pages of at least
/// `policy.min_sample` rows have their price outliers removed; the gate counts
/// the rows left after that discard. Titles are
/// normalized and duplicates collapse onto the first position with the last
/// row's values.
pub fn extract_candidates(rows: Vec<RawCompetitorRow>, policy: &OutlierPolicy) -> Vec<CandidateRecord> {
    let (rows, rejected): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| is_valid_amount(row.price) && is_valid_amount(row.shipping_cost));
    if !rejected.is_empty() {
        tracing::warn!("Discarded {} rows with invalid amounts", rejected.len());
    }

    let rows = if rows.len() >= policy.min_sample {
        let prices: Vec<f64> = rows.iter().map(|row| row.price).collect();
        let outliers = reject_outliers(&prices, policy.m);
        tracing::debug!("Removing {} price outliers from {} rows", outliers.len(), rows.len());
        remove_indices(rows, &outliers)
    } else {
        rows
    };

    let mut records: Vec<CandidateRecord> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for record in rows.into_iter().map(CandidateRecord::from) {
        match positions.get(&record.normalized_title) {
            Some(&pos) => records[pos] = record,
            None => {
                positions.insert(record.normalized_title.clone(), records.len());
                records.push(record);
            }
        }
    }

    records
}
