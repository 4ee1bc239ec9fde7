//! # Pricematch Engine
//!
//! Listing price comparison engine with:
//! - Block-matching title similarity (rapidfuzz Indel as an alternative)
//! - MAD outlier rejection on large result pages
//! - Adaptive multi-page search with similarity threshold ramp-down
//! - Best-match selection and time-decayed price rating
//! - Multiple interfaces: Rust library, Python bindings, HTTP API, CLI
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pricematch_engine::{ComparisonEngine, FetchConfig, TargetListing};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ComparisonEngine::with_ebay(FetchConfig::default())?;
//!
//!     let report = engine
//!         .compare(&TargetListing::new("canon ae-1 program", 180.0, 12))
//!         .await?;
//!
//!     println!("Best: {} - rating {}", report.best.title, report.price_rating);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod engine;
pub mod error;
pub mod extract;
pub mod filter;
pub mod outliers;
pub mod pricing;
pub mod providers;
pub mod search;
pub mod select;
pub mod similarity;

// Re-export primary types
pub use crate::core::{
    CandidateColumns, CandidateRecord, CandidateSet, ComparisonReport, PriceDifference,
    RawCompetitorRow, SelectionResult, TargetListing,
};
pub use engine::ComparisonEngine;
pub use error::{MatchEngineError, Result};
pub use pricing::{percentage_difference, quality_rating};
pub use providers::{FetchConfig, ListingSource, PageRequest};
pub use search::{AdaptiveSearch, SearchOptions};
pub use select::select_best;
pub use similarity::{similarity, SimilarityScorer};

// Python bindings
#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
pub use python::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
