use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::{CandidateColumns, CandidateRecord, CandidateSet};
use crate::error::{MatchEngineError, Result};
use crate::extract::{extract_candidates, OutlierPolicy};
use crate::filter::{filter_with_precision, DEFAULT_SIMILARITY_DECIMALS, MAX_SIMILARITY_DECIMALS};
use crate::providers::{ListingSource, PageRequest};
use crate::similarity::SimilarityScorer;

/// Search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Pages scanned per search, in order
    pub page_count: usize,

    /// Similarity every page is first filtered at
    pub base_threshold: f64,

    /// Added to the ramp-down accumulator on each retry
    pub ramp_step: f64,

    /// Empty retries counted before the final retry on a page
    pub max_consecutive_empty: usize,

    pub outliers: OutlierPolicy,

    /// Decimal places kept on similarity scores
    pub similarity_decimals: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page_count: 5,
            base_threshold: 0.35,
            ramp_step: 0.05,
            max_consecutive_empty: 2,
            outliers: OutlierPolicy::default(),
            similarity_decimals: DEFAULT_SIMILARITY_DECIMALS,
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> Result<()> {
        if self.page_count == 0 {
            return Err(MatchEngineError::InvalidInput("page_count must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.base_threshold) {
            return Err(MatchEngineError::InvalidThreshold(self.base_threshold));
        }
        if !self.ramp_step.is_finite() || self.ramp_step <= 0.0 {
            return Err(MatchEngineError::InvalidInput(format!(
                "ramp_step must be positive, got {}",
                self.ramp_step
            )));
        }
        if self.max_consecutive_empty == 0 {
            return Err(MatchEngineError::InvalidInput(
                "max_consecutive_empty must be at least 1".into(),
            ));
        }
        if self.similarity_decimals > MAX_SIMILARITY_DECIMALS {
            return Err(MatchEngineError::InvalidInput(format!(
                "similarity_decimals must be at most {}, got {}",
                MAX_SIMILARITY_DECIMALS, self.similarity_decimals
            )));
        }
        if !self.outliers.m.is_finite() || self.outliers.m <= 0.0 {
            return Err(MatchEngineError::InvalidInput(format!(
                "outlier multiplier must be positive, got {}",
                self.outliers.m
            )));
        }
        Ok(())
    }
}

/// Mutable state of one search invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub target_title: String,
    pub page_index: usize,
    pub threshold: f64,
    /// Grows by `ramp_step` per retry and is never reset between pages
    pub ramp_down: f64,
    pub consecutive_empty: usize,
}

impl SearchState {
    fn new(target_title: &str, base_threshold: f64, initial_ramp_down: f64) -> Self {
        Self {
            target_title: target_title.to_string(),
            page_index: 0,
            threshold: base_threshold,
            ramp_down: initial_ramp_down,
            consecutive_empty: 0,
        }
    }
}

/// What happened on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTrace {
    pub page_index: usize,
    pub rows: usize,
    pub candidates: usize,
    pub accepted: usize,
    /// Threshold of the last filtering attempt
    pub threshold: f64,
    pub retries: usize,
}

/// Full search output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub columns: CandidateColumns,
    pub pages: Vec<PageTrace>,
    /// Accumulator value when the search finished
    pub ramp_down: f64,
}

/// Multi-page candidate search with per-page threshold ramp-down.
///
/// Pages are fetched strictly in order; page `p + 1` is requested only after
/// page `p`, retries included, has been filtered.
pub struct AdaptiveSearch {
    source: Arc<dyn ListingSource>,
    scorer: Arc<dyn SimilarityScorer>,
    options: SearchOptions,
}

impl AdaptiveSearch {
    pub fn new(
        source: Arc<dyn ListingSource>,
        scorer: Arc<dyn SimilarityScorer>,
        options: SearchOptions,
    ) -> Self {
        Self {
            source,
            scorer,
            options,
        }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search every page and return the accumulated parallel sequences
    pub async fn search(&self, target_title: &str, initial_ramp_down: f64) -> Result<CandidateColumns> {
        self.run(target_title, initial_ramp_down)
            .await
            .map(|outcome| outcome.columns)
    }

    /// Like [`AdaptiveSearch::search`], also returning per-page traces
    pub async fn run(&self, target_title: &str, initial_ramp_down: f64) -> Result<SearchOutcome> {
        self.options.validate()?;
        if !initial_ramp_down.is_finite() || initial_ramp_down < 0.0 {
            return Err(MatchEngineError::InvalidInput(format!(
                "initial ramp-down must be zero or greater, got {}",
                initial_ramp_down
            )));
        }

        let mut state = SearchState::new(target_title, self.options.base_threshold, initial_ramp_down);
        let mut columns = CandidateColumns::new();
        let mut pages = Vec::with_capacity(self.options.page_count);

        for page_index in 0..self.options.page_count {
            state.page_index = page_index;

            let request = PageRequest::new(target_title, page_index);
            let rows = self.source.fetch_page(&request).await?;
            let row_count = rows.len();

            let records = extract_candidates(rows, &self.options.outliers);
            let (accepted, retries) = self.filter_page(&records, &mut state)?;

            tracing::debug!(
                "Page {} from {}: {} rows, {} candidates, {} accepted at {:.2}",
                page_index,
                self.source.name(),
                row_count,
                records.len(),
                accepted.len(),
                state.threshold
            );

            pages.push(PageTrace {
                page_index,
                rows: row_count,
                candidates: records.len(),
                accepted: accepted.len(),
                threshold: state.threshold,
                retries,
            });
            columns.push_page(&accepted);
        }

        if columns.is_empty() {
            return Err(MatchEngineError::NoViableCandidates(format!(
                "nothing similar to '{}' in {} pages",
                target_title, self.options.page_count
            )));
        }

        tracing::info!(
            "Search for '{}' accumulated {} candidates over {} pages",
            target_title,
            columns.len(),
            pages.len()
        );

        Ok(SearchOutcome {
            columns,
            pages,
            ramp_down: state.ramp_down,
        })
    }

    /// Filter at the base threshold, ramping down while the result is
    /// empty. Once `max_consecutive_empty` empty retries have been counted,
    /// one last retry runs; if that is empty too the page contributes
    /// nothing. With the default of 2 an empty page is retried 3 times.
    fn filter_page(&self, records: &[CandidateRecord], state: &mut SearchState) -> Result<(CandidateSet, usize)> {
        state.threshold = self.options.base_threshold;
        let accepted = self.filter(records, state)?;
        if !accepted.is_empty() {
            return Ok((accepted, 0));
        }

        state.consecutive_empty = 0;
        let mut retries = 0;
        loop {
            retries += 1;
            state.ramp_down += self.options.ramp_step;
            state.threshold = (self.options.base_threshold - state.ramp_down).max(0.0);

            let accepted = self.filter(records, state)?;
            if !accepted.is_empty() {
                state.consecutive_empty = 0;
                return Ok((accepted, retries));
            }

            // The cap is checked before counting this attempt, so one more
            // retry runs after the counter reaches it.
            if state.consecutive_empty >= self.options.max_consecutive_empty {
                tracing::debug!(
                    "Page {} still empty at {:.2}, moving on",
                    state.page_index,
                    state.threshold
                );
                return Ok((accepted, retries));
            }
            state.consecutive_empty += 1;
        }
    }

    fn filter(&self, records: &[CandidateRecord], state: &SearchState) -> Result<CandidateSet> {
        filter_with_precision(
            records,
            &state.target_title,
            state.threshold,
            self.scorer.as_ref(),
            self.options.similarity_decimals,
        )
    }
}
