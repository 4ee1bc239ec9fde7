use std::collections::HashMap;

use crate::similarity::{clean_for_similarity, SimilarityScorer};

/// Sequences at least this long get their most frequent elements excluded
/// from match seeding.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Ratcliff/Obershelp block-matching scorer (default).
///
/// Repeatedly takes the longest common contiguous block, then recurses on
/// the unmatched pieces to its left and right. The score is `2 * M / T`
/// where `M` is the total length of all matched blocks and `T` the combined
/// length of both cleaned strings.
pub struct GestaltScorer;

impl GestaltScorer {
    pub fn new() -> Self {
        Self
    }

    /// Matching ratio of two already-cleaned strings. Two empty strings are
    /// identical (1.0).
    pub fn ratio(a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }

        let matched = BlockMatcher::new(&a, &b).matched_len();
        2.0 * matched as f64 / total as f64
    }
}

impl Default for GestaltScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityScorer for GestaltScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        Self::ratio(&clean_for_similarity(a), &clean_for_similarity(b))
    }

    fn name(&self) -> &str {
        "gestalt"
    }
}

struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each element of `b`
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let popular = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= popular);
        }

        Self { a, b, b2j }
    }

    /// Longest block with `a[i..i+k] == b[j..j+k]` inside the given window.
    /// Ties go to the block starting earliest in `a`, then earliest in `b`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // j2len[j] = length of the match ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next_j2len;
        }

        // Popular elements never seed a match but may still extend one
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    /// Total length of all matching blocks
    fn matched_len(&self) -> usize {
        let mut matched = 0;
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_strings_score_one() {
        let scorer = GestaltScorer::new();
        for s in ["canon eos 5d", "a", "Nikon D750 Body!!", "  mixed CASE  "] {
            assert_eq!(scorer.score(s, s), 1.0);
        }
    }

    #[test]
    fn test_ratio_known_values() {
        assert_eq!(GestaltScorer::ratio("abcd", "bcde"), 0.75);
        assert_eq!(GestaltScorer::ratio("hello world", "hello"), 0.625);
        assert_eq!(GestaltScorer::ratio("abc", "xyz"), 0.0);
        assert_eq!(GestaltScorer::ratio("", ""), 1.0);
        assert_eq!(GestaltScorer::ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_blocks_on_both_sides_of_longest_match() {
        // Longest block "cd", then "a" on the left and "f" on the right
        assert_eq!(GestaltScorer::ratio("axcdyf", "abcdf"), 2.0 * 4.0 / 11.0);
    }

    #[test]
    fn test_punctuation_and_case_ignored() {
        let scorer = GestaltScorer::new();
        assert_eq!(scorer.score("Sony A7-III!", "sony a7iii"), 1.0);
    }

    #[test]
    fn test_shared_characters_contribute() {
        let scorer = GestaltScorer::new();
        let score = scorer.score("vintage camera", "tripod stand");
        assert!(score > 0.0);
        assert!(score < 0.5);
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = GestaltScorer::new();
        let pairs = [
            ("iphone 13 pro max 256gb", "iphone 13 pro"),
            ("lego star wars millennium falcon", "millennium falcon lego"),
            ("", "anything"),
        ];
        for (a, b) in pairs {
            let score = scorer.score(a, b);
            assert!((0.0..=1.0).contains(&score), "{} vs {} = {}", a, b, score);
        }
    }

    #[test]
    fn test_long_identical_strings_extend_through_popular_elements() {
        let long = "a".repeat(250);
        assert_eq!(GestaltScorer::ratio(&long, &long), 1.0);
    }

    #[test]
    fn test_popular_elements_do_not_seed_matches() {
        let a = format!("b{}", "a".repeat(249));
        let b = "a".repeat(250);
        assert_eq!(GestaltScorer::ratio(&a, &b), 0.0);
    }
}
