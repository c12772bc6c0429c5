//! Play Store review source
//!
//! Talks to a review scraper service over HTTP. Each call returns one page of
//! reviews and an optional continuation token; pages are requested until the
//! token runs out, the page comes back empty, or the configured cap is hit.

use crate::collector::connector::{ReviewSource, ScrapeOptions, SourceReview};
use crate::error::{PipelineError, Result};
use crate::model::{AppTarget, DEFAULT_SOURCE};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ReviewPage {
    #[serde(default)]
    reviews: Vec<SourceReview>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Clone)]
pub struct PlayStoreSource {
    client: reqwest::Client,
    base_url: String,
}

impl PlayStoreSource {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::Source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(
        &self,
        app: &AppTarget,
        options: &ScrapeOptions,
        token: Option<&str>,
    ) -> Result<ReviewPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("country", options.country.clone()),
            ("sort", options.sort.clone()),
            ("count", options.page_size.to_string()),
        ];
        if let Some(lang) = &options.lang {
            params.push(("lang", lang.clone()));
        }
        if let Some(token) = token {
            params.push(("continuation_token", token.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/apps/{}/reviews", self.base_url, app.app_id))
            .query(&params)
            .send()
            .await
            .map_err(|e| PipelineError::Source(format!("Request for {} failed: {}", app.app_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Source(format!(
                "Review source error for {} ({}): {}",
                app.app_id, status, error_text
            )));
        }

        response
            .json::<ReviewPage>()
            .await
            .map_err(|e| PipelineError::Source(format!("Failed to parse reviews for {}: {}", app.app_id, e)))
    }
}

#[async_trait]
impl ReviewSource for PlayStoreSource {
    async fn fetch_reviews(&self, app: &AppTarget, options: &ScrapeOptions) -> Result<Vec<SourceReview>> {
        let mut all = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.fetch_page(app, options, token.as_deref()).await?;
            let page_len = page.reviews.len();
            all.extend(page.reviews);
            debug!("{}: fetched page of {} reviews ({} total)", app.short_name, page_len, all.len());

            if let Some(max) = options.max_reviews {
                if all.len() >= max {
                    all.truncate(max);
                    break;
                }
            }

            match page.continuation_token {
                Some(next) if page_len > 0 => token = Some(next),
                _ => break,
            }

            tokio::time::sleep(options.page_pause).await;
        }

        Ok(all)
    }

    fn channel(&self) -> &str {
        DEFAULT_SOURCE
    }
}
