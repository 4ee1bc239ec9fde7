use rapidfuzz::distance::indel;

use crate::similarity::{clean_for_similarity, SimilarityScorer};

/// Rapidfuzz-based scorer: normalized Indel similarity, i.e. `2 * LCS / T`
/// over whole characters rather than contiguous blocks.
pub struct IndelScorer;

impl IndelScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IndelScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityScorer for IndelScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = clean_for_similarity(a);
        let b = clean_for_similarity(b);

        indel::normalized_similarity(a.chars(), b.chars())
    }

    fn name(&self) -> &str {
        "indel"
    }
}
