use chrono::{Local, NaiveDateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::core::{ComparisonReport, MatchQuality, TargetListing};
use crate::error::{MatchEngineError, Result};
use crate::filter::round_to;
use crate::pricing::{percentage_difference, quality_rating};
use crate::providers::marketplace::{MarketplaceClient, MarketplaceListing, RngChoice, WeightedChoice};
use crate::providers::{EbaySource, FetchConfig, ListingSource};
use crate::search::{AdaptiveSearch, SearchOptions, SearchOutcome};
use crate::select::select_best;
use crate::similarity::{GestaltScorer, SimilarityScorer};

/// Main comparison orchestrator: search, select, price
pub struct ComparisonEngine {
    source: Arc<dyn ListingSource>,
    scorer: Arc<dyn SimilarityScorer>,
    options: SearchOptions,
}

impl ComparisonEngine {
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

    /// Engine over eBay search results with the default scorer and options
    pub fn with_ebay(config: FetchConfig) -> Result<Self> {
        let source = Arc::new(EbaySource::new(config)?);
        tracing::info!("✅ eBay source initialized ({})", source.config().base_url);

        Ok(Self::new(
            source,
            Arc::new(GestaltScorer::new()),
            SearchOptions::default(),
        ))
    }

    /// Replace the similarity scorer
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the search options
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn scoring_method(&self) -> &str {
        self.scorer.name()
    }

    /// Run only the adaptive search for `title`
    pub async fn search(&self, title: &str) -> Result<SearchOutcome> {
        AdaptiveSearch::new(self.source.clone(), self.scorer.clone(), self.options.clone())
            .run(title, 0.0)
            .await
    }

    /// Compare a listing against the competitor corpus.
    ///
    /// The best total is the winner's price plus shipping; both price
    /// metrics are computed against it.
    pub async fn compare(&self, target: &TargetListing) -> Result<ComparisonReport> {
        validate_target(target)?;
        let start = Instant::now();

        let outcome = self.search(&target.title).await?;
        let candidates = outcome.columns.construct_candidates()?;
        let best = select_best(&candidates)?;

        let best_total = best.total();
        let price_difference = percentage_difference(target.price, best_total)?;
        let price_rating = quality_rating(target.price, best_total, target.age.days)?;

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let report = ComparisonReport {
            listing_title: target.title.clone(),
            listing_price: target.price,
            best_score: round_to(best.similarity * 100.0, 2),
            match_quality: MatchQuality::from_similarity(best.similarity),
            price_rating: round_to(price_rating, 1),
            price_difference,
            total_items: outcome.columns.len(),
            country_counts: outcome.columns.country_counts(),
            candidates: outcome.columns,
            best,
            scoring_method: self.scorer.name().to_string(),
            latency_ms,
            generated_at: Utc::now(),
        };

        tracing::info!("📊 {} in {:.1}ms", report.display(), latency_ms);

        Ok(report)
    }

    /// Compare a parsed marketplace listing, aged relative to `now`.
    ///
    /// Fails with `ListingMissing` when the listing has been removed.
    pub async fn compare_listing(
        &self,
        listing: &MarketplaceListing,
        now: NaiveDateTime,
        chooser: &mut (dyn WeightedChoice + Send),
    ) -> Result<ComparisonReport> {
        let target = listing.to_target(now, chooser)?;
        tracing::info!("🔗 Listing '{}' at {:.2} {}", target.title, target.price, target.currency);

        self.compare(&target).await
    }

    /// Fetch the listing behind `url` and compare it
    pub async fn compare_url(&self, client: &MarketplaceClient, url: &str) -> Result<ComparisonReport> {
        let listing = client.fetch_listing(url).await?;
        let now = Local::now().naive_local();

        self.compare_listing(&listing, now, &mut RngChoice::from_entropy())
            .await
    }
}

fn validate_target(target: &TargetListing) -> Result<()> {
    if target.title.trim().is_empty() {
        return Err(MatchEngineError::InvalidInput("listing title is empty".into()));
    }
    if !target.price.is_finite() || target.price <= 0.0 {
        return Err(MatchEngineError::InvalidInput(format!(
            "listing price must be greater than zero, got {}",
            target.price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DifferenceKind, RawCompetitorRow};
    use crate::providers::PageRequest;
    use async_trait::async_trait;

    struct FirstPageSource(Vec<RawCompetitorRow>);

    #[async_trait]
    impl ListingSource for FirstPageSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawCompetitorRow>> {
            if request.page_index == 0 {
                Ok(self.0.clone())
            } else {
                Ok(Vec::new())
            }
        }

        fn name(&self) -> &str {
            "first-page"
        }
    }

    fn engine(rows: Vec<RawCompetitorRow>) -> ComparisonEngine {
        ComparisonEngine::new(
            Arc::new(FirstPageSource(rows)),
            Arc::new(GestaltScorer::new()),
            SearchOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_compare_prices_against_best_total() {
        let engine = engine(vec![
            RawCompetitorRow::new("Vintage Film Camera", 150.0)
                .with_shipping(10.0)
                .with_country("Japan"),
            RawCompetitorRow::new("Vintage Film Camera Lens", 90.0).with_country("US"),
            RawCompetitorRow::new("Garden Hose", 5.0),
        ]);

        let report = engine
            .compare(&TargetListing::new("vintage film camera", 200.0, 0))
            .await
            .unwrap();

        assert_eq!(report.best.title, "vintage film camera");
        assert_eq!(report.best_score, 100.0);
        assert_eq!(report.match_quality, MatchQuality::Exact);
        assert_eq!(report.price_difference.amount, "20.00");
        assert_eq!(report.price_difference.kind, DifferenceKind::Decrease);
        assert_eq!(report.price_rating, 4.0);
        assert_eq!(report.scoring_method, "gestalt");
        assert_eq!(report.total_items, report.candidates.len());
        assert_eq!(report.country_counts.get("Japan"), Some(&1));
    }

    #[tokio::test]
    async fn test_compare_without_matches() {
        let engine = engine(Vec::new());
        let err = engine
            .compare(&TargetListing::new("vintage film camera", 200.0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, MatchEngineError::NoViableCandidates(_)));
    }

    #[tokio::test]
    async fn test_invalid_target_rejected() {
        let engine = engine(vec![RawCompetitorRow::new("anything", 1.0)]);

        let err = engine.compare(&TargetListing::new("  ", 10.0, 0)).await.unwrap_err();
        assert!(err.is_invalid_input());

        let err = engine
            .compare(&TargetListing::new("camera", 0.0, 0))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_builders() {
        let engine = engine(Vec::new())
            .with_scorer(Arc::new(crate::similarity::IndelScorer::new()))
            .with_options(SearchOptions {
                page_count: 2,
                ..Default::default()
            });

        assert_eq!(engine.scoring_method(), "indel");
        assert_eq!(engine.source_name(), "first-page");
        assert_eq!(engine.options().page_count, 2);
    }
}
