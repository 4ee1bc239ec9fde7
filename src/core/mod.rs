pub mod candidates;
pub mod listing;
pub mod report;
pub mod target;

pub use candidates::{CandidateColumns, CandidateSet};
pub use listing::{
    normalize_title, CandidateRecord, RawCompetitorRow, RawListingText, ScoredCandidate,
    SelectionResult,
};
pub use report::{ComparisonReport, DifferenceKind, MatchQuality, PriceDifference};
pub use target::{ListingAge, TargetListing};
