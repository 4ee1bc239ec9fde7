use crate::core::{CandidateSet, ScoredCandidate, SelectionResult};
use crate::error::{MatchEngineError, Result};

/// Pick the winner: highest similarity, ties broken by lowest price.
///
/// Ties are exact equality on the stored (rounded) similarity. Among equal
/// prices the earliest inserted candidate wins.
pub fn select_best(candidates: &CandidateSet) -> Result<SelectionResult> {
    let max_similarity = candidates
        .iter()
        .map(|c| c.similarity)
        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
        .ok_or_else(|| MatchEngineError::NoViableCandidates("no comparable products were found".into()))?;

    let winner = candidates
        .iter()
        .filter(|c| c.similarity == max_similarity)
        .fold(None, |best: Option<&ScoredCandidate>, c| match best {
            Some(b) if b.price() <= c.price() => Some(b),
            _ => Some(c),
        })
        .ok_or_else(|| MatchEngineError::NoViableCandidates("no candidate at top similarity".into()))?;

    tracing::info!(
        "Selected '{}' at {:.2} (similarity {:.4})",
        winner.title(),
        winner.price(),
        winner.similarity
    );

    Ok(SelectionResult::from(winner))
}
