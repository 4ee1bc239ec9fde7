use thiserror::Error;

/// Main error type for the comparison engine
#[derive(Error, Debug)]
pub enum MatchEngineError {
    /// Non-numeric or out-of-range arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Similarity threshold outside [0, 1]
    #[error("Similarity threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f64),

    /// A filter or selection step produced an empty set
    #[error("No viable candidates: {0}")]
    NoViableCandidates(String),

    /// Upstream fetch failure, propagated untouched
    #[error("Request to '{source_name}' failed: {message}")]
    RequestFailed { source_name: String, message: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Malformed upstream document
    #[error("Parse error: {0}")]
    Parse(String),

    /// The target listing page exists but the listing was removed
    #[error("Listing no longer available: {0}")]
    ListingMissing(String),
}

impl MatchEngineError {
    /// True for every argument-validation failure, thresholds included
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidThreshold(_))
    }

    /// True for transport-level failures coming from a listing source
    pub fn is_request_failed(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::HttpRequest(_))
    }

    pub(crate) fn request_failed(source_name: &str, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MatchEngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_invalid_input() {
        assert!(MatchEngineError::InvalidThreshold(1.5).is_invalid_input());
        assert!(MatchEngineError::InvalidInput("x".into()).is_invalid_input());
        assert!(!MatchEngineError::NoViableCandidates("x".into()).is_invalid_input());
    }

    #[test]
    fn test_listing_missing_is_its_own_kind() {
        let err = MatchEngineError::ListingMissing("https://m.example.com/item/1".into());
        assert!(!err.is_invalid_input());
        assert!(!err.is_request_failed());
        assert!(err.to_string().contains("no longer available"));
    }

    #[test]
    fn test_request_failed_message() {
        let err = MatchEngineError::request_failed("ebay", "HTTP 503");
        assert!(err.is_request_failed());
        assert_eq!(err.to_string(), "Request to 'ebay' failed: HTTP 503");
    }
}
