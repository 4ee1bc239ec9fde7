pub mod gestalt;
pub mod indel;

pub use gestalt::GestaltScorer;
pub use indel::IndelScorer;

/// Trait for fuzzy title similarity implementations
pub trait SimilarityScorer: Send + Sync {
    /// Similarity of `a` to `b` in [0, 1]
    fn score(&self, a: &str, b: &str) -> f64;

    /// Get scorer name for logging
    fn name(&self) -> &str;
}

/// Lowercase, trim, and drop ASCII punctuation. Letters, digits and
/// whitespace survive.
pub fn clean_for_similarity(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect()
}

/// Similarity of two titles using the default block-matching scorer
pub fn similarity(a: &str, b: &str) -> f64 {
    GestaltScorer::new().score(a, b)
}

/// Build a scorer from its name, as accepted by the CLI and server
pub fn scorer_by_name(name: &str) -> Option<Box<dyn SimilarityScorer>> {
    match name {
        "gestalt" => Some(Box::new(GestaltScorer::new())),
        "indel" => Some(Box::new(IndelScorer::new())),
        _ => None,
    }
}
