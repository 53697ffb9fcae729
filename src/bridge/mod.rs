// Bright Data REST client: Web Unlocker for raw page fetches, the
// Dataset API for platform-specific structured product scrapes.
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::Platform;
use crate::utils::retry::{retry_with_backoff, RetryConfig};

pub mod tools;

const API_BASE: &str = "https://api.brightdata.com";

/// Cap on tool output handed back to the LLM. Product pages are
/// unbounded and the models only need the head of the document.
const MAX_TOOL_OUTPUT_CHARS: usize = 20_000;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Scraper request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Scraper rejected the request ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Dataset snapshot {0} is not ready yet")]
    SnapshotPending(String),
    #[error("Unexpected scraper response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: String,
}

/// Client for the scraping service. One instance is shared by every tool
/// of a pipeline run.
#[derive(Clone)]
pub struct BrightDataBridge {
    http: reqwest::Client,
    api_token: String,
    unlocker_zone: String,
}

impl BrightDataBridge {
    pub fn new(api_token: impl Into<String>, unlocker_zone: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_token: api_token.into(),
            unlocker_zone: unlocker_zone.into(),
        }
    }

    /// Fetch a URL through the Web Unlocker zone and return the raw body.
    pub async fn scrape_page(&self, url: &str) -> Result<String, BridgeError> {
        let response = self
            .http
            .post(format!("{API_BASE}/request"))
            .bearer_auth(&self.api_token)
            .json(&json!({
                "zone": self.unlocker_zone,
                "url": url,
                "format": "raw",
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BridgeError::Rejected { status, body });
        }

        Ok(truncate_chars(&body, MAX_TOOL_OUTPUT_CHARS))
    }

    /// Run a web search through the unlocker and return the results page.
    pub async fn search_engine(&self, query: &str) -> Result<String, BridgeError> {
        let search_url =
            url::Url::parse_with_params("https://www.google.com/search", &[("q", query)])
                .map_err(|e| BridgeError::Malformed(format!("search url: {e}")))?;

        self.scrape_page(search_url.as_str()).await
    }

    /// Platform-specific structured scrape via the Dataset API: trigger a
    /// collection for the URL, then poll the snapshot until it is ready.
    pub async fn scrape_product(&self, platform: Platform, url: &str) -> Result<String, BridgeError> {
        let response = self
            .http
            .post(format!("{API_BASE}/datasets/v3/trigger"))
            .bearer_auth(&self.api_token)
            .query(&[("dataset_id", dataset_id(platform)), ("include_errors", "true")])
            .json(&json!([{ "url": url }]))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(BridgeError::Rejected { status, body });
        }

        let trigger: TriggerResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Malformed(format!("trigger response: {e}")))?;

        retry_with_backoff(
            || self.fetch_snapshot(&trigger.snapshot_id),
            RetryConfig::snapshot_poll(),
            "dataset snapshot poll",
        )
        .await
    }

    async fn fetch_snapshot(&self, snapshot_id: &str) -> Result<String, BridgeError> {
        let response = self
            .http
            .get(format!("{API_BASE}/datasets/v3/snapshot/{snapshot_id}"))
            .bearer_auth(&self.api_token)
            .query(&[("format", "json")])
            .send()
            .await?;

        let status = response.status();
        // 202 means the collection is still running.
        if status == reqwest::StatusCode::ACCEPTED {
            return Err(BridgeError::SnapshotPending(snapshot_id.to_string()));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(BridgeError::Rejected { status, body });
        }

        Ok(truncate_chars(&body, MAX_TOOL_OUTPUT_CHARS))
    }
}

/// Fixed dataset ids for the per-platform product scrapers.
fn dataset_id(platform: Platform) -> &'static str {
    match platform {
        Platform::Amazon => "gd_l7q7dkf244hwjntr0",
        Platform::Walmart => "gd_l95fol7l1ru6rlo116",
        Platform::BestBuy => "gd_ltre1jqe1jfr7cccf",
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("\n[truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_platform_has_its_own_dataset() {
        let ids: Vec<&str> = Platform::ALL.iter().map(|p| dataset_id(*p)).collect();

        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.starts_with("gd_")));
        assert_eq!(ids[0], dataset_id(Platform::Amazon));
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn short_output_is_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn long_output_is_cut_and_flagged() {
        let long = "x".repeat(50);
        let truncated = truncate_chars(&long, 10);

        assert!(truncated.starts_with("xxxxxxxxxx"));
        assert!(truncated.ends_with("[truncated]"));
        assert_eq!(truncated.chars().filter(|c| *c == 'x').count(), 10);
    }
}
