//! Target listing extraction from a marketplace item page.
//!
//! The desktop document carries JSON-LD metadata (title, price, currency,
//! breadcrumb with city and category); the mobile document carries the
//! posting time, the photo and the "listing removed" markers.

use chrono::{Datelike, Month, NaiveDate, NaiveDateTime, NaiveTime};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use std::time::Duration;

use crate::core::{ListingAge, TargetListing};
use crate::error::{MatchEngineError, Result};

const SOURCE_NAME: &str = "marketplace";
const IMAGE_HOST_MARKER: &str = "https://scontent";
const MISSING_PAGE_TITLE: &str = "page not found";
const MISSING_PAGE_TEXT: &str = "Buy and sell things locally on Facebook Marketplace.";
const NEW_CONDITION: &str = "NewCondition";

/// Prior over conditions for listings that do not state one
pub const CONDITION_WEIGHTS: [(&str, f64); 5] = [
    ("New", 43.21),
    ("Used - Like New", 29.15),
    ("Used - Good", 25.33),
    ("Used - Fair", 2.16),
    ("Refurbished", 0.15),
];

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").expect("valid selector"));
static ABBR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("abbr").expect("valid selector"));

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z]+").expect("valid regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4}").expect("valid regex"));
static CLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+:[0-9]+").expect("valid regex"));
static MERIDIEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]{2}").expect("valid regex"));
static LISTING_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r".*[0-9]").expect("valid regex"));

/// Weighted pick among labelled options
pub trait WeightedChoice {
    /// `None` when no option has positive weight
    fn choose<'a>(&mut self, options: &[(&'a str, f64)]) -> Option<&'a str>;
}

/// [`WeightedChoice`] backed by a random number generator
pub struct RngChoice<R: Rng> {
    rng: R,
}

impl<R: Rng> RngChoice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngChoice<StdRng> {
    /// Reproducible choices
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> WeightedChoice for RngChoice<R> {
    fn choose<'a>(&mut self, options: &[(&'a str, f64)]) -> Option<&'a str> {
        let index = WeightedIndex::new(options.iter().map(|(_, weight)| *weight)).ok()?;
        Some(options[index.sample(&mut self.rng)].0)
    }
}

/// Marketplace item page, parsed
#[derive(Debug, Clone)]
pub struct MarketplaceListing {
    metadata: Map<String, Value>,
    page_title: String,
    posted_text: Option<String>,
    image: Option<String>,
    has_missing_notice: bool,
}

impl MarketplaceListing {
    /// Parse the desktop (`base_html`) and mobile (`mobile_html`) documents.
    ///
    /// Fails with `Parse` when the JSON-LD metadata lacks `offers`, `name`,
    /// `description` or a 3-level `itemListElement` breadcrumb, or when the
    /// offer has no price or currency.
    pub fn parse(base_html: &str, mobile_html: &str) -> Result<Self> {
        let metadata = merge_json_ld(&Html::parse_document(base_html));
        validate_metadata(&metadata)?;

        let mobile = Html::parse_document(mobile_html);

        let page_title = mobile
            .select(&TITLE)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let posted_text = mobile
            .select(&ABBR)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty());

        let image = mobile
            .select(&IMG)
            .filter_map(|el| el.value().attr("src"))
            .find(|src| src.contains(IMAGE_HOST_MARKER))
            .map(str::to_string);

        let has_missing_notice = mobile
            .root_element()
            .text()
            .any(|text| text.trim() == MISSING_PAGE_TEXT);

        Ok(Self {
            metadata,
            page_title,
            posted_text,
            image,
            has_missing_notice,
        })
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(value_to_string)
    }

    fn breadcrumb(&self, position: usize, label: &str) -> Result<String> {
        self.metadata
            .get("itemListElement")
            .and_then(|list| list.get(position))
            .and_then(|item| item.get("name"))
            .and_then(value_to_string)
            .ok_or_else(|| MatchEngineError::Parse(format!("listing {} is unavailable", label)))
    }

    pub fn title(&self) -> Result<String> {
        self.metadata_str("name")
            .ok_or_else(|| MatchEngineError::Parse("listing title is missing".into()))
    }

    pub fn description(&self) -> Result<String> {
        self.metadata_str("description")
            .ok_or_else(|| MatchEngineError::Parse("listing description is missing".into()))
    }

    pub fn price(&self) -> Result<f64> {
        let price = self.metadata.get("offers").and_then(|offers| offers.get("price"));
        match price {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| MatchEngineError::Parse("unable to determine listing price".into()))
    }

    pub fn currency(&self) -> Result<String> {
        self.metadata
            .get("offers")
            .and_then(|offers| offers.get("priceCurrency"))
            .and_then(value_to_string)
            .ok_or_else(|| MatchEngineError::Parse("listing currency is missing".into()))
    }

    pub fn city(&self) -> Result<String> {
        self.breadcrumb(1, "city")
    }

    pub fn category(&self) -> Result<String> {
        self.breadcrumb(2, "category")
    }

    pub fn image(&self) -> Result<String> {
        self.image
            .clone()
            .ok_or_else(|| MatchEngineError::Parse("listing image could not be located".into()))
    }

    /// "New" when the schema says so, otherwise a weighted guess over
    /// [`CONDITION_WEIGHTS`]
    pub fn condition(&self, chooser: &mut dyn WeightedChoice) -> String {
        let schema = self.metadata_str("itemCondition").unwrap_or_default();
        if schema.trim_start_matches("https://schema.org/") == NEW_CONDITION {
            return "New".to_string();
        }

        chooser
            .choose(&CONDITION_WEIGHTS)
            .unwrap_or(CONDITION_WEIGHTS[0].0)
            .to_string()
    }

    /// Time since posting, relative to `now`
    pub fn age(&self, now: NaiveDateTime) -> Result<ListingAge> {
        let text = self
            .posted_text
            .as_deref()
            .ok_or_else(|| MatchEngineError::Parse("listing date information is unavailable".into()))?;
        parse_listing_age(text, now)
    }

    /// True when the page is a "not found" placeholder
    pub fn is_missing(&self) -> bool {
        self.page_title.to_lowercase() == MISSING_PAGE_TITLE || self.has_missing_notice
    }

    /// Collect every field into a [`TargetListing`].
    ///
    /// A removed listing fails with `ListingMissing` before any field is read.
    pub fn to_target(&self, now: NaiveDateTime, chooser: &mut dyn WeightedChoice) -> Result<TargetListing> {
        if self.is_missing() {
            return Err(MatchEngineError::ListingMissing(
                self.metadata_str("name").unwrap_or_else(|| "listing".to_string()),
            ));
        }

        Ok(TargetListing {
            title: self.title()?,
            price: self.price()?,
            age: self.age(now)?,
            currency: self.currency()?,
            description: self.description()?,
            condition: self.condition(chooser),
            city: self.city()?,
            category: self.category()?,
            image: self.image()?,
        })
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Merge the top-level objects of every JSON-LD block; later keys win
fn merge_json_ld(document: &Html) -> Map<String, Value> {
    let mut merged = Map::new();

    for script in document.select(&JSON_LD) {
        let text: String = script.text().collect();
        let Ok(json) = serde_json::from_str::<Value>(&text) else {
            tracing::debug!("Skipping unparseable JSON-LD block");
            continue;
        };

        match json {
            Value::Object(map) => merged.extend(map),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(map) = item {
                        merged.extend(map);
                    }
                }
            }
            _ => {}
        }
    }

    merged
}

fn validate_metadata(metadata: &Map<String, Value>) -> Result<()> {
    let missing: Vec<&str> = ["offers", "name", "description", "itemListElement"]
        .into_iter()
        .filter(|key| !metadata.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(MatchEngineError::Parse(format!(
            "listing metadata is missing the following keys: {}",
            missing.join(", ")
        )));
    }

    match metadata.get("itemListElement") {
        Some(Value::Array(items)) if items.len() >= 3 => {}
        _ => return Err(MatchEngineError::Parse("listing metadata is incomplete".into())),
    }

    match metadata.get("offers") {
        Some(Value::Object(offers)) if offers.contains_key("price") && offers.contains_key("priceCurrency") => Ok(()),
        _ => Err(MatchEngineError::Parse("offer metadata is incomplete".into())),
    }
}

/// Parse posting-time text such as "January 1, 2024 at 1:00 PM" or
/// "3 hours ago" into an age relative to `now`.
///
/// Relative forms understand minutes, hours, days and weeks; a number with
/// any other unit is read as hours.
pub fn parse_listing_age(text: &str, now: NaiveDateTime) -> Result<ListingAge> {
    let month = WORD
        .find(text)
        .and_then(|word| word.as_str().parse::<Month>().ok());

    let Some(month) = month else {
        return parse_relative_age(text);
    };

    let year = match YEAR.find(text) {
        Some(y) => y
            .as_str()
            .parse::<i32>()
            .map_err(|_| MatchEngineError::Parse(format!("bad year in '{}'", text)))?,
        None => now.year(),
    };

    let (Some(day), Some(clock), Some(meridiem)) = (NUMBER.find(text), CLOCK.find(text), MERIDIEM.find(text)) else {
        return Err(MatchEngineError::Parse(format!(
            "listing date time components are incomplete: '{}'",
            text
        )));
    };

    let day: u32 = day
        .as_str()
        .parse()
        .map_err(|_| MatchEngineError::Parse(format!("bad day in '{}'", text)))?;
    let date = NaiveDate::from_ymd_opt(year, month.number_from_month(), day)
        .ok_or_else(|| MatchEngineError::Parse(format!("invalid date in '{}'", text)))?;
    let time = NaiveTime::parse_from_str(&format!("{} {}", clock.as_str(), meridiem.as_str()), "%I:%M %p")
        .map_err(|e| MatchEngineError::Parse(format!("invalid time in '{}': {}", text, e)))?;

    let elapsed = now - date.and_time(time);
    let days = elapsed.num_days();
    let hours = (elapsed.num_seconds() - days * 86_400) / 3_600;

    Ok(ListingAge::new(days, hours))
}

fn parse_relative_age(text: &str) -> Result<ListingAge> {
    let amount: i64 = NUMBER
        .find(text)
        .and_then(|n| n.as_str().parse().ok())
        .ok_or_else(|| MatchEngineError::Parse(format!("unable to parse listing date: '{}'", text)))?;

    let unit = WORD
        .find_iter(text)
        .map(|w| w.as_str().to_lowercase())
        .find(|w| w.starts_with("min") || w.starts_with("hour") || w.starts_with("day") || w.starts_with("week"));

    Ok(match unit.as_deref() {
        Some(u) if u.starts_with("min") => ListingAge::new(0, 0),
        Some(u) if u.starts_with("day") => ListingAge::new(amount, 0),
        Some(u) if u.starts_with("week") => ListingAge::new(amount * 7, 0),
        _ => ListingAge::new(0, amount),
    })
}

/// Mobile page URL for a listing: cut after the listing id, `www.` -> `m.`
pub fn mobile_listing_url(url: &str) -> Result<String> {
    let shortened = LISTING_ID
        .find(url)
        .ok_or_else(|| MatchEngineError::InvalidInput(format!("URL has no listing identifier: '{}'", url)))?;

    Ok(shortened.as_str().replacen("//www.", "//m.", 1))
}

/// Fetches both documents of a listing page
pub struct MarketplaceClient {
    client: Client,
}

impl MarketplaceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!("Requesting listing page {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MatchEngineError::request_failed(SOURCE_NAME, format!("unable to fetch '{}': {}", url, e)))?;

        if !response.status().is_success() {
            return Err(MatchEngineError::request_failed(
                SOURCE_NAME,
                format!("HTTP {} for '{}'", response.status(), url),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MatchEngineError::request_failed(SOURCE_NAME, e.to_string()))
    }

    /// Fetch and parse the listing behind `url`
    pub async fn fetch_listing(&self, url: &str) -> Result<MarketplaceListing> {
        let mobile_url = mobile_listing_url(url)?;
        let mobile_html = self.fetch(&mobile_url).await?;
        let base_html = self.fetch(url).await?;

        MarketplaceListing::parse(&base_html, &mobile_html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_HTML: &str = r#"
        <html><head>
          <script type="application/ld+json">
          {
            "name": "Vintage Camera",
            "description": "Great condition",
            "offers": {"price": 120.0, "priceCurrency": "USD"},
            "itemListElement": [
              {"name": "Marketplace"},
              {"name": "New York"},
              {"name": "Electronics"}
            ],
            "itemCondition": "https://schema.org/NewCondition"
          }
          </script>
        </head><body></body></html>
    "#;

    const MOBILE_HTML: &str = r#"
        <html>
          <head><title>Marketplace Listing</title></head>
          <body>
            <abbr>January 1, 2024 at 1:00 PM</abbr>
            <img src="https://static.example.com/logo.png" />
            <img src="https://scontent.example.com/img.jpg" />
          </body>
        </html>
    "#;

    struct Fixed(&'static str);

    impl WeightedChoice for Fixed {
        fn choose<'a>(&mut self, options: &[(&'a str, f64)]) -> Option<&'a str> {
            options.iter().map(|(label, _)| *label).find(|label| *label == self.0)
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parses_listing_metadata() {
        let listing = MarketplaceListing::parse(BASE_HTML, MOBILE_HTML).unwrap();

        assert_eq!(listing.price().unwrap(), 120.0);
        assert_eq!(listing.title().unwrap(), "Vintage Camera");
        assert_eq!(listing.description().unwrap(), "Great condition");
        assert_eq!(listing.city().unwrap(), "New York");
        assert_eq!(listing.category().unwrap(), "Electronics");
        assert_eq!(listing.currency().unwrap(), "USD");
        assert_eq!(listing.image().unwrap(), "https://scontent.example.com/img.jpg");
        assert_eq!(listing.condition(&mut Fixed("Used - Good")), "New");
        assert!(!listing.is_missing());

        let age = listing.age(at(2024, 1, 2, 13, 0)).unwrap();
        assert_eq!(age, ListingAge::new(1, 0));
    }

    #[test]
    fn test_to_target() {
        let listing = MarketplaceListing::parse(BASE_HTML, MOBILE_HTML).unwrap();
        let target = listing
            .to_target(at(2024, 1, 15, 16, 30), &mut RngChoice::seeded(7))
            .unwrap();

        assert_eq!(target.title, "Vintage Camera");
        assert_eq!(target.age, ListingAge::new(14, 3));
        assert_eq!(target.condition, "New");
    }

    #[test]
    fn test_unstated_condition_uses_chooser() {
        let base = BASE_HTML.replace(r#""itemCondition": "https://schema.org/NewCondition""#, r#""brand": "Canon""#);
        let listing = MarketplaceListing::parse(&base, MOBILE_HTML).unwrap();

        assert_eq!(listing.condition(&mut Fixed("Used - Fair")), "Used - Fair");
    }

    #[test]
    fn test_seeded_choice_is_reproducible() {
        let mut first = RngChoice::seeded(42);
        let mut second = RngChoice::seeded(42);

        for _ in 0..20 {
            let a = first.choose(&CONDITION_WEIGHTS);
            assert!(a.is_some());
            assert_eq!(a, second.choose(&CONDITION_WEIGHTS));
        }
    }

    #[test]
    fn test_zero_weights_choose_nothing() {
        let mut chooser = RngChoice::seeded(1);
        assert_eq!(chooser.choose(&[("a", 0.0), ("b", 0.0)]), None);
        assert_eq!(chooser.choose(&[("only", 1.0)]), Some("only"));
    }

    #[test]
    fn test_missing_keys_rejected() {
        let base = r#"<script type="application/ld+json">{"name": "x", "offers": {}}</script>"#;
        let err = MarketplaceListing::parse(base, MOBILE_HTML).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("description"));
        assert!(message.contains("itemListElement"));
    }

    #[test]
    fn test_incomplete_offer_rejected() {
        let base = BASE_HTML.replace(r#", "priceCurrency": "USD""#, "");
        let err = MarketplaceListing::parse(&base, MOBILE_HTML).unwrap_err();
        assert!(err.to_string().contains("offer metadata"));
    }

    #[test]
    fn test_json_ld_blocks_merged() {
        let base = r#"
            <script type="application/ld+json">[{"name": "Desk"}, {"description": "Oak"}]</script>
            <script type="application/ld+json">not json</script>
            <script type="application/ld+json">
              {"offers": {"price": "75.50", "priceCurrency": "CAD"},
               "itemListElement": [{"name": "a"}, {"name": "Toronto"}, {"name": "Furniture"}]}
            </script>
        "#;
        let listing = MarketplaceListing::parse(base, MOBILE_HTML).unwrap();

        assert_eq!(listing.title().unwrap(), "Desk");
        assert_eq!(listing.price().unwrap(), 75.5);
        assert_eq!(listing.city().unwrap(), "Toronto");
    }

    #[test]
    fn test_missing_listing_detection() {
        let missing = r#"
            <html><head><title>Page not found</title></head>
            <body>Buy and sell things locally on Facebook Marketplace.</body></html>
        "#;
        let listing = MarketplaceListing::parse(BASE_HTML, missing).unwrap();

        assert!(listing.is_missing());
        assert!(listing.image().is_err());
        assert!(listing.age(at(2024, 1, 1, 0, 0)).is_err());

        let err = listing
            .to_target(at(2024, 1, 1, 0, 0), &mut RngChoice::seeded(7))
            .unwrap_err();
        assert!(matches!(err, MatchEngineError::ListingMissing(ref title) if title == "Vintage Camera"));
    }

    #[test]
    fn test_missing_notice_alone_marks_listing_missing() {
        let mobile = MOBILE_HTML.replace(
            "<abbr>",
            "<p>Buy and sell things locally on Facebook Marketplace.</p><abbr>",
        );
        let listing = MarketplaceListing::parse(BASE_HTML, &mobile).unwrap();

        assert!(listing.is_missing());
        assert!(matches!(
            listing.to_target(at(2024, 1, 2, 13, 0), &mut Fixed("New")),
            Err(MatchEngineError::ListingMissing(_))
        ));
    }

    #[test]
    fn test_relative_ages() {
        let now = at(2024, 6, 1, 12, 0);
        assert_eq!(parse_listing_age("3 hours ago", now).unwrap(), ListingAge::new(0, 3));
        assert_eq!(parse_listing_age("2 days ago", now).unwrap(), ListingAge::new(2, 0));
        assert_eq!(parse_listing_age("a week ago 1", now).unwrap(), ListingAge::new(7, 0));
        assert_eq!(parse_listing_age("12 minutes ago", now).unwrap(), ListingAge::new(0, 0));
        assert!(parse_listing_age("just now", now).is_err());
    }

    #[test]
    fn test_absolute_age_without_year() {
        let now = at(2024, 3, 10, 9, 0);
        let age = parse_listing_age("March 3 at 7:00 AM", now).unwrap();
        assert_eq!(age, ListingAge::new(7, 2));
    }

    #[test]
    fn test_absolute_age_incomplete() {
        let now = at(2024, 3, 10, 9, 0);
        assert!(parse_listing_age("March 3", now).is_err());
    }

    #[test]
    fn test_mobile_listing_url() {
        assert_eq!(
            mobile_listing_url("https://www.facebook.com/marketplace/item/123456789/?ref=search").unwrap(),
            "https://m.facebook.com/marketplace/item/123456789"
        );
        assert!(mobile_listing_url("https://www.facebook.com/marketplace/").is_err());
    }
}
