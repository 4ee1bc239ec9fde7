use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

use crate::core::{RawCompetitorRow, RawListingText};
use crate::error::{MatchEngineError, Result};
use crate::extract::parse_row;
use crate::providers::{ListingSource, PageRequest};

const SOURCE_NAME: &str = "ebay";

static ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".s-item").expect("valid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".s-item__title").expect("valid selector"));
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".s-item__price").expect("valid selector"));
static SHIPPING: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".s-item__shipping, .s-item__logisticsCost").expect("valid selector")
});
static LOCATION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".s-item__location, .s-item__itemLocation").expect("valid selector")
});
static CONDITION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".SECONDARY_INFO").expect("valid selector"));

/// HTTP settings for the eBay search source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub referer: String,
    pub items_per_page: u32,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebay.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://www.google.com/".to_string(),
            items_per_page: 240,
            timeout_secs: 10,
        }
    }
}

/// eBay search-results source
pub struct EbaySource {
    client: Client,
    config: FetchConfig,
}

impl EbaySource {
    /// Create new eBay source
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user agent", &config.user_agent)?);
        headers.insert(REFERER, header_value("referer", &config.referer)?);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Search URL for one results page
    pub fn search_url(&self, request: &PageRequest) -> String {
        format!(
            "{}/sch/i.html?_from=R40&_nkw={}&_sacat=0&_ipg={}&_pgn={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&request.query),
            self.config.items_per_page,
            request.page_index
        )
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching eBay search page {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MatchEngineError::request_failed(SOURCE_NAME, format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MatchEngineError::request_failed(
                SOURCE_NAME,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MatchEngineError::request_failed(SOURCE_NAME, format!("Unreadable body: {}", e)))
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| MatchEngineError::InvalidInput(format!("invalid {} header: {}", name, e)))
}

fn first_text(item: &ElementRef<'_>, selector: &Selector) -> String {
    item.select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Parse every result item on a search page. Items without a title are
/// skipped; the remaining fields stay raw text.
pub fn parse_results_page(html: &str) -> Vec<RawListingText> {
    let document = Html::parse_document(html);

    document
        .select(&ITEM)
        .map(|item| RawListingText {
            title: first_text(&item, &TITLE),
            price: first_text(&item, &PRICE),
            shipping: first_text(&item, &SHIPPING),
            location: first_text(&item, &LOCATION),
            condition: first_text(&item, &CONDITION),
        })
        .filter(|raw| !raw.title.is_empty())
        .collect()
}

#[async_trait]
impl ListingSource for EbaySource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawCompetitorRow>> {
        let url = self.search_url(request);
        let html = self.fetch_html(&url).await?;

        let items = parse_results_page(&html);
        let rows: Vec<RawCompetitorRow> = items.iter().filter_map(parse_row).collect();

        tracing::debug!(
            "eBay page {} for '{}': {} items, {} priced",
            request.page_index,
            request.query,
            items.len(),
            rows.len()
        );

        Ok(rows)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body><ul>
          <li class="s-item">
            <div class="s-item__title"><span>Canon AE-1 Program 35mm Film Camera</span></div>
            <span class="SECONDARY_INFO">Pre-Owned</span>
            <span class="s-item__price">$189.99</span>
            <span class="s-item__shipping s-item__logisticsCost">+$12.50 shipping</span>
            <span class="s-item__location s-item__itemLocation">from Japan</span>
          </li>
          <li class="s-item">
            <div class="s-item__title">Canon AE-1 body only</div>
            <span class="SECONDARY_INFO">For parts or not working</span>
            <span class="s-item__price">$1,045.00</span>
            <span class="s-item__shipping s-item__logisticsCost">Free shipping</span>
          </li>
          <li class="s-item">
            <div class="s-item__title">Canon lens cap</div>
            <span class="s-item__price">See price</span>
          </li>
          <li class="s-item"><span class="s-item__price">$1.00</span></li>
        </ul></body></html>
    "#;

    #[test]
    fn test_parse_results_page() {
        let items = parse_results_page(RESULTS_PAGE);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Canon AE-1 Program 35mm Film Camera");
        assert_eq!(items[0].condition, "Pre-Owned");
        assert_eq!(items[0].shipping, "+$12.50 shipping");
        assert_eq!(items[0].location, "from Japan");
        assert!(items[1].location.is_empty());
    }

    #[test]
    fn test_rows_from_results_page() {
        let rows: Vec<RawCompetitorRow> = parse_results_page(RESULTS_PAGE)
            .iter()
            .filter_map(parse_row)
            .collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 189.99);
        assert_eq!(rows[0].shipping_cost, 12.5);
        assert_eq!(rows[0].country, "Japan");
        assert_eq!(rows[1].price, 1045.0);
        assert_eq!(rows[1].shipping_cost, 0.0);
    }

    #[test]
    fn test_search_url() {
        let source = EbaySource::new(FetchConfig {
            base_url: "https://www.ebay.com/".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = source.search_url(&PageRequest::new("Guitar #1 & Case", 3));
        assert_eq!(
            url,
            "https://www.ebay.com/sch/i.html?_from=R40&_nkw=Guitar%20%231%20%26%20Case&_sacat=0&_ipg=240&_pgn=3"
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let result = EbaySource::new(FetchConfig {
            user_agent: "bad\nagent".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(MatchEngineError::InvalidInput(_))));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_ebay_fetch_page() {
        let source = EbaySource::new(FetchConfig::default()).unwrap();
        let rows = source
            .fetch_page(&PageRequest::new("canon ae-1", 0))
            .await
            .unwrap();

        assert!(!rows.is_empty());
    }
}
