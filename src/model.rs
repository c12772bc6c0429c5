//! Review and bank records shared by every stage
//!
//! Column names here are the canonical CSV headers. Stage files are read and
//! written with these names; anything else is mapped through [`COLUMN_ALIASES`].

use serde::{Deserialize, Serialize};

pub const COL_REVIEW: &str = "review";
pub const COL_RATING: &str = "rating";
pub const COL_DATE: &str = "date";
pub const COL_BANK: &str = "bank";
pub const COL_APP_NAME: &str = "app_name";
pub const COL_APP_ID: &str = "app_id";
pub const COL_SOURCE: &str = "source";
pub const COL_SCRAPED_AT: &str = "scraped_at";

/// Columns a review batch must carry after aliasing
pub const REQUIRED_COLUMNS: [&str; 4] = [COL_REVIEW, COL_RATING, COL_DATE, COL_BANK];

/// Alternate column names emitted by scrapers, applied in order.
/// An alias is only used when the canonical column is not already present.
pub const COLUMN_ALIASES: [(&str, &str); 6] = [
    ("review_text", COL_REVIEW),
    ("content", COL_REVIEW),
    ("appId", COL_BANK),
    ("bank_name", COL_BANK),
    ("score", COL_RATING),
    ("at", COL_DATE),
];

pub const DEFAULT_SOURCE: &str = "Google Play";

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// An app store listing to collect reviews for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTarget {
    /// Store identifier, e.g. `com.boa.boaMobileBanking`
    pub app_id: String,
    /// Display name of the app
    pub name: String,
    /// Bank short name; becomes the `bank` column
    pub short_name: String,
}

impl AppTarget {
    pub fn new(app_id: &str, name: &str, short_name: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            name: name.to_string(),
            short_name: short_name.to_string(),
        }
    }
}

pub fn default_apps() -> Vec<AppTarget> {
    vec![
        AppTarget::new(
            "com.combanketh.mobilebanking",
            "Commercial Bank of Ethiopia",
            "CBE",
        ),
        AppTarget::new("com.boa.boaMobileBanking", "Bank of Abyssinia", "BOA"),
        AppTarget::new(
            "com.dashen.dashensuperapp",
            "Dashen Bank (Super App)",
            "Dashen",
        ),
    ]
}

/// One review as written to the raw snapshot by the collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReview {
    pub review_text: Option<String>,
    pub rating: Option<i64>,
    /// Timestamp as reported by the source, normalized later by the cleaner
    pub date: Option<String>,
    pub bank: String,
    pub app_name: String,
    pub app_id: String,
    pub source: String,
    pub scraped_at: String,
}

/// Bank dimension row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub name: String,
    pub app_name: String,
}

impl Bank {
    /// App name used when the batch carries none for this bank
    pub fn fallback_app_name(bank_name: &str) -> String {
        format!("{} Mobile App", bank_name)
    }
}
