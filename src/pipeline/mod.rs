use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rig::providers::gemini;
use serde::{Deserialize, Serialize};

pub mod stats;

pub use stats::{confidence_score, price_stats, PriceStats};

use crate::agents::{PriceExtractor, ReportWriter, UrlResolver};
use crate::bridge::BrightDataBridge;

/// Retail platforms the pipeline knows how to search and scrape.
/// Adding one means extending the resolver schema, the extractor tool
/// mapping, and the report breakdown in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amazon,
    Walmart,
    BestBuy,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Amazon, Platform::Walmart, Platform::BestBuy];

    /// Stable identifier used in state keys and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Amazon => "amazon",
            Platform::Walmart => "walmart",
            Platform::BestBuy => "bestbuy",
        }
    }

    /// Human-facing name for report lines.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Amazon => "Amazon",
            Platform::Walmart => "Walmart",
            Platform::BestBuy => "Best Buy",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price extraction attempt. Created once per platform during the
/// extraction stage, never mutated afterwards. A present `price` is a
/// positive number with `error` unset; a failed attempt has `price: None`,
/// `availability: "Error extracting"` and the cause in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub platform: Platform,
    pub price: Option<f64>,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default = "PriceRecord::unknown_availability")]
    pub availability: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceRecord {
    fn unknown_availability() -> String {
        "Unknown".to_string()
    }

    /// Record for a platform whose extraction attempt blew up.
    pub fn failed(platform: Platform, url: &str, cause: impl fmt::Display) -> Self {
        Self {
            platform,
            price: None,
            title: String::new(),
            url: url.to_string(),
            availability: "Error extracting".to_string(),
            error: Some(cause.to_string()),
        }
    }
}

/// The single record threaded through the three-stage workflow. Each
/// stage consumes the previous state and produces a new one; nothing is
/// mutated in place and nothing is persisted beyond the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub product_query: String,
    pub search_results: BTreeMap<Platform, String>,
    pub price_data: Vec<PriceRecord>,
    pub final_report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl PipelineState {
    pub fn new(product_query: impl Into<String>) -> Self {
        Self {
            product_query: product_query.into(),
            search_results: BTreeMap::new(),
            price_data: Vec::new(),
            final_report: String::new(),
            error: None,
            confidence_score: None,
        }
    }

    /// Prices from records where extraction actually produced one.
    pub fn valid_prices(&self) -> Vec<f64> {
        self.price_data.iter().filter_map(|record| record.price).collect()
    }
}

/// A single pipeline stage. Failures never escape a stage: every stage
/// converts them into `state.error` and returns the state.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: PipelineState) -> PipelineState;
}

/// Three-stage price analysis pipeline: resolve product URLs, extract
/// prices, write the report. Stages run strictly in order; once
/// `state.error` is set the remaining stages are skipped and the
/// partially-filled state is returned to the caller.
pub struct PricePipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl PricePipeline {
    pub fn new(client: &gemini::Client, model: &str, bridge: Arc<BrightDataBridge>) -> Self {
        Self::from_stages(vec![
            Box::new(UrlResolver::new(client, model, bridge.clone())),
            Box::new(PriceExtractor::new(client, model, bridge)),
            Box::new(ReportWriter::new(client, model)),
        ])
    }

    pub fn from_stages(stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self { stages }
    }

    /// Run the full analysis for one product query. This is the sole
    /// entry point any calling surface needs.
    pub async fn run(&self, product_query: &str) -> PipelineState {
        let mut state = PipelineState::new(product_query);

        for stage in &self.stages {
            if state.error.is_some() {
                break;
            }
            println!("▶️ {}", stage.name());
            state = stage.run(state).await;
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubStage {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl PipelineStage for StubStage {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, mut state: PipelineState) -> PipelineState {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                state.error = Some(format!("{} failed", self.name));
            }
            state
        }
    }

    fn stub(name: &'static str, fail: bool, log: &Arc<Mutex<Vec<&'static str>>>) -> Box<dyn PipelineStage> {
        Box::new(StubStage {
            name,
            fail,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn runs_all_stages_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PricePipeline::from_stages(vec![
            stub("search", false, &log),
            stub("extract", false, &log),
            stub("report", false, &log),
        ]);

        let state = pipeline.run("iPhone 16 256GB").await;

        assert!(state.error.is_none());
        assert_eq!(state.product_query, "iPhone 16 256GB");
        assert_eq!(*log.lock().unwrap(), vec!["search", "extract", "report"]);
    }

    #[tokio::test]
    async fn short_circuits_after_a_step_wide_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PricePipeline::from_stages(vec![
            stub("search", true, &log),
            stub("extract", false, &log),
            stub("report", false, &log),
        ]);

        let state = pipeline.run("iPhone 16 256GB").await;

        assert_eq!(state.error.as_deref(), Some("search failed"));
        assert_eq!(*log.lock().unwrap(), vec!["search"]);
    }

    #[test]
    fn platform_serializes_to_lowercase_keys() {
        assert_eq!(serde_json::to_string(&Platform::Amazon).unwrap(), "\"amazon\"");
        assert_eq!(serde_json::to_string(&Platform::BestBuy).unwrap(), "\"bestbuy\"");
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = PipelineState::new("LG 55 TV");
        state
            .search_results
            .insert(Platform::Walmart, "https://www.walmart.com/ip/123".to_string());
        state.price_data.push(PriceRecord {
            platform: Platform::Walmart,
            price: Some(1199.99),
            title: "LG 55 4K UHD Smart TV".to_string(),
            url: "https://www.walmart.com/ip/123".to_string(),
            availability: "In Stock".to_string(),
            error: None,
        });

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"walmart\""));

        let back: PipelineState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.search_results.len(), 1);
        assert_eq!(back.price_data[0].price, Some(1199.99));
        assert!(back.error.is_none());
        assert!(back.confidence_score.is_none());
    }

    #[test]
    fn record_defaults_fill_in_missing_fields() {
        let record: PriceRecord = serde_json::from_str(
            r#"{"platform": "amazon", "price": null, "url": "https://www.amazon.com/dp/X"}"#,
        )
        .unwrap();

        assert_eq!(record.title, "");
        assert_eq!(record.availability, "Unknown");
        assert!(record.error.is_none());
    }
}
