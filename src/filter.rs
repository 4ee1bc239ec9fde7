use crate::core::{CandidateRecord, CandidateSet, ScoredCandidate};
use crate::error::{MatchEngineError, Result};
use crate::similarity::SimilarityScorer;

/// Decimal places kept on stored similarity scores. Selection ties are
/// exact comparisons on these rounded values.
pub const DEFAULT_SIMILARITY_DECIMALS: u32 = 4;

/// Beyond this, rounding no longer changes an f64 score in [0, 1]
pub const MAX_SIMILARITY_DECIMALS: u32 = 15;

/// Round `value` to `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Keep candidates whose similarity to `target_title` is at least
/// `threshold`, scored with [`DEFAULT_SIMILARITY_DECIMALS`] precision.
pub fn filter_by_similarity(
    candidates: &[CandidateRecord],
    target_title: &str,
    threshold: f64,
    scorer: &dyn SimilarityScorer,
) -> Result<CandidateSet> {
    filter_with_precision(
        candidates,
        target_title,
        threshold,
        scorer,
        DEFAULT_SIMILARITY_DECIMALS,
    )
}

/// Keep candidates whose similarity to `target_title` is at least
/// `threshold`.
///
/// The threshold is validated before any scoring. The raw score is compared
/// against the threshold; the stored score is rounded to `decimals`.
/// Duplicate titles collapse, last one wins.
pub fn filter_with_precision(
    candidates: &[CandidateRecord],
    target_title: &str,
    threshold: f64,
    scorer: &dyn SimilarityScorer,
    decimals: u32,
) -> Result<CandidateSet> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(MatchEngineError::InvalidThreshold(threshold));
    }
    if decimals > MAX_SIMILARITY_DECIMALS {
        return Err(MatchEngineError::InvalidInput(format!(
            "similarity decimals must be at most {}, got {}",
            MAX_SIMILARITY_DECIMALS, decimals
        )));
    }

    let target = target_title.to_lowercase();

    let mut kept = CandidateSet::new();
    for record in candidates {
        let similarity = scorer.score(&record.normalized_title, &target);
        if similarity >= threshold {
            kept.insert(ScoredCandidate::new(record.clone(), round_to(similarity, decimals)));
        }
    }

    tracing::debug!(
        "{} of {} candidates at or above {:.2}",
        kept.len(),
        candidates.len(),
        threshold
    );

    Ok(kept)
}
