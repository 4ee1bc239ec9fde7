use serde::{Deserialize, Serialize};

/// Time a listing has been up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingAge {
    pub days: i64,
    #[serde(default)]
    pub hours: i64,
}

impl ListingAge {
    pub fn new(days: i64, hours: i64) -> Self {
        Self { days, hours }
    }
}

/// The listing being priced against the competitor corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetListing {
    pub title: String,

    /// Asking price in `currency`
    pub price: f64,

    #[serde(default)]
    pub age: ListingAge,

    #[serde(default)]
    pub currency: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub condition: String,

    #[serde(default)]
    pub city: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub image: String,
}

impl TargetListing {
    /// Create a listing with the fields the comparison actually needs
    pub fn new(title: impl Into<String>, price: f64, days_listed: i64) -> Self {
        Self {
            title: title.into(),
            price,
            age: ListingAge::new(days_listed, 0),
            currency: String::new(),
            description: String::new(),
            condition: String::new(),
            city: String::new(),
            category: String::new(),
            image: String::new(),
        }
    }
}
