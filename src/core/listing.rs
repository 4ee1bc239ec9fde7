use serde::{Deserialize, Serialize};

/// Normalize a product title: lowercase, every run of characters that are
/// neither ASCII alphanumeric nor whitespace becomes a space, whitespace is
/// collapsed and trimmed.
///
/// The result is a fixed point: `normalize_title(&normalize_title(t)) == normalize_title(t)`.
pub fn normalize_title(title: &str) -> String {
    let replaced: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One search-result item as scraped, before any numeric parsing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListingText {
    pub title: String,
    pub price: String,
    #[serde(default)]
    pub shipping: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub condition: String,
}

/// A competitor row with validated numeric fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCompetitorRow {
    pub title: String,

    /// Item price, always >= 0
    pub price: f64,

    /// Shipping cost, 0 when free or unspecified
    #[serde(default)]
    pub shipping_cost: f64,

    #[serde(default)]
    pub country: String,

    #[serde(default)]
    pub condition: String,
}

impl RawCompetitorRow {
    pub fn new(title: impl Into<String>, price: f64) -> Self {
        Self {
            title: title.into(),
            price,
            shipping_cost: 0.0,
            country: String::new(),
            condition: String::new(),
        }
    }

    pub fn with_shipping(mut self, shipping_cost: f64) -> Self {
        self.shipping_cost = shipping_cost;
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }
}

/// Normalized competitor listing, keyed by `normalized_title` within a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub normalized_title: String,
    pub price: f64,
    pub shipping: f64,
    pub country: String,
    pub condition: String,
}

impl From<RawCompetitorRow> for CandidateRecord {
    fn from(row: RawCompetitorRow) -> Self {
        Self {
            normalized_title: normalize_title(&row.title),
            price: row.price,
            shipping: row.shipping_cost,
            country: row.country,
            condition: row.condition,
        }
    }
}

/// Candidate with its similarity to the target title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub record: CandidateRecord,

    /// Similarity in [0, 1]
    pub similarity: f64,
}

impl ScoredCandidate {
    pub fn new(record: CandidateRecord, similarity: f64) -> Self {
        Self { record, similarity }
    }

    pub fn title(&self) -> &str {
        &self.record.normalized_title
    }

    pub fn price(&self) -> f64 {
        self.record.price
    }
}

/// The single winning candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub title: String,
    pub price: f64,
    pub shipping: f64,
    pub country: String,
    pub condition: String,
    pub similarity: f64,
}

impl SelectionResult {
    /// Price plus shipping
    pub fn total(&self) -> f64 {
        self.price + self.shipping
    }
}

impl From<&ScoredCandidate> for SelectionResult {
    fn from(candidate: &ScoredCandidate) -> Self {
        Self {
            title: candidate.record.normalized_title.clone(),
            price: candidate.record.price,
            shipping: candidate.record.shipping,
            country: candidate.record.country.clone(),
            condition: candidate.record.condition.clone(),
            similarity: candidate.similarity,
        }
    }
}
