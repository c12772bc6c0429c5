//! Review Source Trait - Abstract interface for app store review providers

use crate::error::Result;
use crate::model::AppTarget;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Review timestamp as a provider reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewTimestamp {
    Text(String),
    /// Unix epoch seconds
    Epoch(i64),
}

impl ReviewTimestamp {
    pub fn as_text(&self) -> String {
        match self {
            ReviewTimestamp::Text(s) => s.clone(),
            ReviewTimestamp::Epoch(secs) => secs.to_string(),
        }
    }
}

/// One review as returned by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReview {
    #[serde(default)]
    pub review_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub thumbs_up_count: Option<i64>,
    #[serde(default)]
    pub at: Option<ReviewTimestamp>,
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Request parameters shared by every app fetch
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub lang: Option<String>,
    pub country: String,
    pub sort: String,
    pub page_size: usize,
    /// Pause between pages of the same app
    pub page_pause: Duration,
    /// Stop after this many reviews; `None` fetches everything
    pub max_reviews: Option<usize>,
}

/// Review Source Trait
///
/// Implementations:
/// - PlayStoreSource: HTTP/JSON review scraper endpoint
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch all available reviews for one app
    async fn fetch_reviews(&self, app: &AppTarget, options: &ScrapeOptions) -> Result<Vec<SourceReview>>;

    /// Channel name recorded in the `source` column
    fn channel(&self) -> &str;
}
