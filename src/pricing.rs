//! Price quality scoring.

use crate::core::{DifferenceKind, PriceDifference};
use crate::error::{MatchEngineError, Result};
use crate::outliers::is_close;

const DECAY_CONSTANT: f64 = 0.01;
const LINEAR_FACTOR: f64 = 0.0125;
const PENALTY_AFTER_DAYS: i64 = 7;
const MAX_RATING: f64 = 5.0;

fn require_numeric(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MatchEngineError::InvalidInput(format!(
            "{} must be numeric, got {}",
            name, value
        )))
    }
}

/// Rate how good `final_price` is against `initial_price` on a 0-5 scale.
///
/// Listings up for `PENALTY_AFTER_DAYS` or longer have their initial price
/// inflated by `initial * e^(-0.01 * t) + 0.0125 * t * initial`, with `t`
/// the days past the threshold, so a stale price rates worse at the same gap.
pub fn quality_rating(initial_price: f64, final_price: f64, days_listed: i64) -> Result<f64> {
    let initial = require_numeric("initial price", initial_price)?;
    let final_price = require_numeric("final price", final_price)?;

    if initial <= 0.0 {
        return Err(MatchEngineError::InvalidInput(format!(
            "initial price must be greater than zero, got {}",
            initial
        )));
    }

    let mut adjusted = initial;
    if days_listed >= PENALTY_AFTER_DAYS {
        let past = (days_listed - PENALTY_AFTER_DAYS) as f64;
        adjusted += initial * (-DECAY_CONSTANT * past).exp() + LINEAR_FACTOR * past * initial;
    }

    let rating = if adjusted <= final_price {
        MAX_RATING
    } else {
        MAX_RATING - (adjusted - final_price) / adjusted * MAX_RATING
    };

    Ok(rating.clamp(0.0, MAX_RATING))
}

/// Relative difference between a listing price and the best price found.
///
/// The larger of the two prices is the baseline (a zero baseline becomes
/// 1.0). `Decrease` means the best price undercuts the listing.
pub fn percentage_difference(list_price: f64, best_price: f64) -> Result<PriceDifference> {
    let list = require_numeric("list price", list_price)?;
    let best = require_numeric("best price", best_price)?;

    if list < 0.0 || best < 0.0 {
        return Err(MatchEngineError::InvalidInput(format!(
            "prices must be zero or greater, got {} and {}",
            list, best
        )));
    }

    if is_close(list, best) {
        return Ok(PriceDifference::new("0.00", DifferenceKind::Equal));
    }

    let (baseline, kind) = if list > best {
        (list, DifferenceKind::Decrease)
    } else {
        (best, DifferenceKind::Increase)
    };
    let baseline = if is_close(baseline, 0.0) { 1.0 } else { baseline };

    let percentage = (list - best).abs() / baseline * 100.0;

    Ok(PriceDifference::new(format!("{:.2}", percentage), kind))
}

/// Format to 2 decimals with comma thousands separators: `1234.5` -> `"1,234.50"`
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

/// Parse an amount written by [`format_amount`] (or any plain number)
pub fn parse_amount(text: &str) -> Result<f64> {
    text.replace(',', "")
        .trim()
        .parse::<f64>()
        .map_err(|_| MatchEngineError::InvalidInput(format!("not a numeric amount: '{}'", text)))
}
