use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::{CandidateRecord, ScoredCandidate};
use crate::error::{MatchEngineError, Result};
use crate::pricing::{format_amount, parse_amount};

/// Scored candidates keyed by normalized title.
///
/// Iteration follows first-insertion order. Inserting a title that is
/// already present replaces the stored candidate in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    entries: Vec<ScoredCandidate>,
    index: HashMap<String, usize>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate, returning the one it replaced, if any
    pub fn insert(&mut self, candidate: ScoredCandidate) -> Option<ScoredCandidate> {
        match self.index.get(candidate.title()) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos], candidate)),
            None => {
                self.index
                    .insert(candidate.title().to_string(), self.entries.len());
                self.entries.push(candidate);
                None
            }
        }
    }

    pub fn get(&self, title: &str) -> Option<&ScoredCandidate> {
        self.index.get(title).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredCandidate> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<ScoredCandidate> {
        self.entries
    }
}

impl FromIterator<ScoredCandidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = ScoredCandidate>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for candidate in iter {
            set.insert(candidate);
        }
        set
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a ScoredCandidate;
    type IntoIter = std::slice::Iter<'a, ScoredCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Accumulated search output as six parallel sequences.
///
/// Prices and shipping costs are stored as 2-decimal strings with thousands
/// separators (`"1,234.50"`); use [`parse_amount`] to read them back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateColumns {
    pub titles: Vec<String>,
    pub prices: Vec<String>,
    pub shippings: Vec<String>,
    pub countries: Vec<String>,
    pub conditions: Vec<String>,
    pub similarities: Vec<f64>,
}

impl CandidateColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one page's accepted candidates, preserving their order
    pub fn push_page(&mut self, page: &CandidateSet) {
        for candidate in page {
            let record = &candidate.record;
            self.titles.push(record.normalized_title.clone());
            self.prices.push(format_amount(record.price));
            self.shippings.push(format_amount(record.shipping));
            self.countries.push(record.country.clone());
            self.conditions.push(record.condition.clone());
            self.similarities.push(candidate.similarity);
        }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Fail with `InvalidInput` unless all six sequences have the same length
    pub fn validate(&self) -> Result<()> {
        let lengths = [
            self.titles.len(),
            self.prices.len(),
            self.shippings.len(),
            self.countries.len(),
            self.conditions.len(),
            self.similarities.len(),
        ];

        if lengths.iter().any(|&len| len != lengths[0]) {
            return Err(MatchEngineError::InvalidInput(format!(
                "candidate sequences must all be the same length, got {:?}",
                lengths
            )));
        }

        Ok(())
    }

    pub fn parsed_prices(&self) -> Result<Vec<f64>> {
        self.prices.iter().map(|p| parse_amount(p)).collect()
    }

    pub fn parsed_shippings(&self) -> Result<Vec<f64>> {
        self.shippings.iter().map(|s| parse_amount(s)).collect()
    }

    /// Number of candidates per country, sorted by country name
    pub fn country_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for country in &self.countries {
            *counts.entry(country.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Rebuild the keyed candidate set from the parallel sequences.
    ///
    /// Titles repeated across pages collapse to their last occurrence.
    pub fn construct_candidates(&self) -> Result<CandidateSet> {
        self.validate()?;

        let prices = self.parsed_prices()?;
        let shippings = self.parsed_shippings()?;

        let mut set = CandidateSet::new();
        for (i, title) in self.titles.iter().enumerate() {
            let record = CandidateRecord {
                normalized_title: title.clone(),
                price: prices[i],
                shipping: shippings[i],
                country: self.countries[i].clone(),
                condition: self.conditions[i].clone(),
            };
            set.insert(ScoredCandidate::new(record, self.similarities[i]));
        }

        Ok(set)
    }
}
