use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use pricematch_engine::{
    core::DifferenceKind,
    providers::{MarketplaceListing, RngChoice},
    similarity::GestaltScorer,
    AdaptiveSearch, ComparisonEngine, ListingSource, MatchEngineError, PageRequest, RawCompetitorRow, Result,
    SearchOptions, TargetListing,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory source: fixed rows per page, optional failure on one page
struct ScriptedSource {
    pages: HashMap<usize, Vec<RawCompetitorRow>>,
    fail_on: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(pages: Vec<(usize, Vec<RawCompetitorRow>)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, page_index: usize) -> Self {
        self.fail_on = Some(page_index);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingSource for ScriptedSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawCompetitorRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on == Some(request.page_index) {
            return Err(MatchEngineError::RequestFailed {
                source_name: "scripted".to_string(),
                message: format!("page {} unavailable", request.page_index),
            });
        }

        Ok(self.pages.get(&request.page_index).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn engine_over(source: Arc<ScriptedSource>) -> ComparisonEngine {
    ComparisonEngine::new(source, Arc::new(GestaltScorer::new()), SearchOptions::default())
}

fn switch_pages() -> ScriptedSource {
    ScriptedSource::new(vec![
        (
            0,
            vec![
                RawCompetitorRow::new("Nintendo Switch OLED", 300.0).with_country("US"),
                RawCompetitorRow::new("Nintendo Switch Lite", 150.0).with_country("US"),
            ],
        ),
        (
            2,
            vec![RawCompetitorRow::new("Nintendo Switch OLED", 280.0)
                .with_shipping(5.0)
                .with_country("Canada")],
        ),
    ])
}

const LISTING_HTML: &str = r#"
    <html><head>
      <script type="application/ld+json">
      {
        "name": "Nintendo Switch OLED",
        "description": "Barely used, comes with dock",
        "offers": {"price": "350", "priceCurrency": "CAD"},
        "itemListElement": [
          {"name": "Marketplace"},
          {"name": "Toronto"},
          {"name": "Video Games"}
        ]
      }
      </script>
    </head><body></body></html>
"#;

const LISTING_MOBILE_HTML: &str = r#"
    <html>
      <head><title>Marketplace Listing</title></head>
      <body>
        <abbr>January 5, 2024 at 10:00 AM</abbr>
        <img src="https://scontent.example.com/switch.jpg" />
      </body>
    </html>
"#;

const REMOVED_MOBILE_HTML: &str = r#"
    <html>
      <head><title>Page Not Found</title></head>
      <body><p>Buy and sell things locally on Facebook Marketplace.</p></body>
    </html>
"#;

fn jan_15_10am() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn test_compare_end_to_end() {
    let source = Arc::new(switch_pages());
    let engine = engine_over(source.clone());

    let report = engine
        .compare(&TargetListing::new("Nintendo Switch OLED", 350.0, 10))
        .await
        .unwrap();

    // Same title on a later page replaces the earlier offer
    assert_eq!(report.best.title, "nintendo switch oled");
    assert_eq!(report.best.price, 280.0);
    assert_eq!(report.best.shipping, 5.0);
    assert_eq!(report.best.country, "Canada");
    assert_eq!(report.best_score, 100.0);

    assert_eq!(report.price_difference.amount, "18.57");
    assert_eq!(report.price_difference.kind, DifferenceKind::Decrease);
    assert_eq!(report.price_rating, 2.0);

    assert!(report.total_items >= 2);
    assert_eq!(report.country_counts.get("Canada"), Some(&1));
    assert_eq!(source.calls(), 5);
}

#[tokio::test]
async fn test_compare_marketplace_listing() {
    let source = Arc::new(switch_pages());
    let engine = engine_over(source.clone());
    let listing = MarketplaceListing::parse(LISTING_HTML, LISTING_MOBILE_HTML).unwrap();

    let target = listing.to_target(jan_15_10am(), &mut RngChoice::seeded(3)).unwrap();
    assert_eq!(target.title, "Nintendo Switch OLED");
    assert_eq!(target.price, 350.0);
    assert_eq!(target.age.days, 10);
    assert_eq!(target.city, "Toronto");

    let report = engine
        .compare_listing(&listing, jan_15_10am(), &mut RngChoice::seeded(3))
        .await
        .unwrap();

    assert_eq!(report.listing_title, "Nintendo Switch OLED");
    assert_eq!(report.listing_price, 350.0);
    assert_eq!(report.best.price, 280.0);
    assert_eq!(report.price_difference.amount, "18.57");
    assert_eq!(report.price_rating, 2.0);
    assert_eq!(source.calls(), 5);
}

#[tokio::test]
async fn test_removed_listing_is_not_searched() {
    let source = Arc::new(switch_pages());
    let engine = engine_over(source.clone());
    let listing = MarketplaceListing::parse(LISTING_HTML, REMOVED_MOBILE_HTML).unwrap();

    let err = engine
        .compare_listing(&listing, jan_15_10am(), &mut RngChoice::seeded(3))
        .await
        .unwrap_err();

    assert!(matches!(err, MatchEngineError::ListingMissing(_)));
    assert!(!err.is_invalid_input());
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_all_pages_empty() {
    let source = Arc::new(ScriptedSource::new(Vec::new()));
    let engine = engine_over(source.clone());

    let err = engine
        .compare(&TargetListing::new("anything at all", 10.0, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, MatchEngineError::NoViableCandidates(_)));
    assert_eq!(source.calls(), 5);
}

#[tokio::test]
async fn test_page_may_contribute_nothing() {
    let source = Arc::new(ScriptedSource::new(vec![
        (0, vec![RawCompetitorRow::new("xq", 12.0)]),
        (1, vec![RawCompetitorRow::new("Nintendo Switch OLED", 300.0)]),
    ]));
    let search = AdaptiveSearch::new(source, Arc::new(GestaltScorer::new()), SearchOptions::default());

    let outcome = search.run("nintendo switch oled", 0.0).await.unwrap();

    assert_eq!(outcome.pages.len(), 5);
    assert_eq!(outcome.pages[0].accepted, 0);
    assert_eq!(outcome.pages[0].retries, 3);
    assert_eq!(outcome.pages[1].accepted, 1);
    assert_eq!(outcome.pages[1].retries, 0);
    assert_eq!(outcome.columns.titles, vec!["nintendo switch oled".to_string()]);
    assert_eq!(outcome.columns.prices, vec!["300.00".to_string()]);
}

#[tokio::test]
async fn test_request_failure_stops_search() {
    let source = Arc::new(
        ScriptedSource::new(vec![(0, vec![RawCompetitorRow::new("Nintendo Switch OLED", 300.0)])]).failing_on(2),
    );
    let engine = engine_over(source.clone());

    let err = engine
        .compare(&TargetListing::new("Nintendo Switch OLED", 350.0, 0))
        .await
        .unwrap_err();

    assert!(err.is_request_failed());
    assert!(err.to_string().contains("page 2 unavailable"));
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_large_page_drops_price_outliers() {
    let mut rows: Vec<RawCompetitorRow> = (0..120)
        .map(|i| RawCompetitorRow::new(format!("Film Camera {}", i), 100.0 + (i % 3) as f64))
        .collect();
    rows.push(RawCompetitorRow::new("Film Camera Gold Edition", 100_000.0));

    let source = Arc::new(ScriptedSource::new(vec![(0, rows)]));
    let search = AdaptiveSearch::new(source, Arc::new(GestaltScorer::new()), SearchOptions::default());

    let columns = search.search("film camera", 0.0).await.unwrap();

    assert!(!columns.is_empty());
    assert!(!columns.titles.iter().any(|t| t.contains("gold")));
}
