pub mod ebay;
pub mod marketplace;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::RawCompetitorRow;
use crate::error::Result;

pub use ebay::{EbaySource, FetchConfig};
pub use marketplace::{MarketplaceListing, RngChoice, WeightedChoice};

/// One page of a competitor search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub query: String,

    /// 0-based page number
    pub page_index: usize,
}

impl PageRequest {
    pub fn new(query: impl Into<String>, page_index: usize) -> Self {
        Self {
            query: query.into(),
            page_index,
        }
    }
}

/// Trait for competitor listing sources (search-result pages)
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch and parse one page of results. Transport failures surface as
    /// `RequestFailed`.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawCompetitorRow>>;

    /// Get source name
    fn name(&self) -> &str;
}
