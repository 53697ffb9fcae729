// Stage 2: extract the current selling price from each resolved URL.
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bridge::tools::{AmazonProductTool, BestBuyProductTool, WalmartProductTool};
use crate::bridge::BrightDataBridge;
use crate::pipeline::{PipelineStage, PipelineState, Platform, PriceRecord};
use crate::PriceGuardError;

const EXTRACTION_PREAMBLE: &str = "\
You are a price extraction specialist. Extract accurate price information from product pages.

For each URL provided:
1. Use the relevant tool to fetch the product page
2. Find the current price
3. Extract the product title
4. Note availability status

IMPORTANT:
For Amazon - use the web_data_amazon_product tool
For Walmart - use the web_data_walmart_product tool
For Best Buy - use the web_data_bestbuy_products tool

Be precise with price extraction - look for the main selling price, not MSRP or crossed-out prices.";

const PRICE_EXTRACTION_PREAMBLE: &str = "\
You extract price, title, and availability from scraped product page data. \
The price is the current selling price as a plain number, never a list price \
or a crossed-out price.";

/// Structured output for the price extraction call.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedPrice {
    #[schemars(description = "Product price as a number (no currency symbols)")]
    pub price: Option<f64>,
    #[schemars(description = "Product name/title")]
    #[serde(default)]
    pub title: String,
    #[schemars(description = "Availability status (in stock, out of stock, etc.)")]
    #[serde(default = "ExtractedPrice::unknown")]
    pub availability: String,
}

impl ExtractedPrice {
    fn unknown() -> String {
        "Unknown".to_string()
    }
}

/// Reads each resolved product page through the platform's dedicated
/// scraper tool and coerces the agent's answer into a `PriceRecord`.
/// Platforms are isolated: one failing never aborts the others.
pub struct PriceExtractor {
    client: gemini::Client,
    model: String,
    bridge: Arc<BrightDataBridge>,
}

impl PriceExtractor {
    pub fn new(client: &gemini::Client, model: &str, bridge: Arc<BrightDataBridge>) -> Self {
        Self {
            client: client.clone(),
            model: model.to_string(),
            bridge,
        }
    }

    async fn extract_all(
        &self,
        search_results: &BTreeMap<Platform, String>,
    ) -> Result<Vec<PriceRecord>, PriceGuardError> {
        // One agent for the whole stage, shared across platforms.
        let agent = self
            .client
            .agent(&self.model)
            .preamble(EXTRACTION_PREAMBLE)
            .temperature(0.0)
            .tool(AmazonProductTool::new(self.bridge.clone()))
            .tool(WalmartProductTool::new(self.bridge.clone()))
            .tool(BestBuyProductTool::new(self.bridge.clone()))
            .build();

        // Platforms have no data dependency on each other. join_all keeps
        // the output in input order, so price_data matches the
        // search_results iteration order.
        let attempts = search_results
            .iter()
            .map(|(platform, url)| self.extract_one(&agent, *platform, url));

        Ok(join_all(attempts).await)
    }

    async fn extract_one(
        &self,
        agent: &Agent<gemini::completion::CompletionModel>,
        platform: Platform,
        url: &str,
    ) -> PriceRecord {
        match self.try_extract(agent, platform, url).await {
            Ok(record) => {
                match record.price {
                    Some(price) => println!("  💰 {}: ${:.2}", platform.label(), price),
                    None => println!("  💰 {}: no price found", platform.label()),
                }
                record
            }
            Err(e) => {
                println!("  ⚠️ {} extraction failed: {e}", platform.label());
                PriceRecord::failed(platform, url, e)
            }
        }
    }

    async fn try_extract(
        &self,
        agent: &Agent<gemini::completion::CompletionModel>,
        platform: Platform,
        url: &str,
    ) -> Result<PriceRecord, PriceGuardError> {
        let prompt = format!(
            "Extract price information from this product page: {url}

Find and return:
1. Current price (as a number)
2. Product title
3. Availability status

Platform: {platform}
URL: {url}"
        );

        let answer = agent
            .prompt(&prompt)
            .multi_turn(8)
            .await
            .map_err(|e| PriceGuardError::Llm(format!("Extraction agent error: {e}")))?;

        let extractor = self
            .client
            .extractor::<ExtractedPrice>(&self.model)
            .preamble(PRICE_EXTRACTION_PREAMBLE)
            .build();

        let input = format!(
            "Extract price, title, and availability from this product page data for {platform}:\n\n{answer}"
        );
        let extracted = extractor
            .extract(&input)
            .await
            .map_err(|e| PriceGuardError::Llm(format!("Price extraction error: {e}")))?;

        Ok(PriceRecord {
            platform,
            // A selling price is positive; anything else is extraction noise.
            price: extracted.price.filter(|p| *p > 0.0),
            title: extracted.title,
            url: url.to_string(),
            availability: extracted.availability,
            error: None,
        })
    }
}

#[async_trait]
impl PipelineStage for PriceExtractor {
    fn name(&self) -> &'static str {
        "Price extraction"
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        if state.search_results.is_empty() {
            return PipelineState {
                price_data: Vec::new(),
                error: Some("No product URLs found to extract prices from".to_string()),
                ..state
            };
        }

        println!("💰 Extracting prices from {} URLs", state.search_results.len());

        match self.extract_all(&state.search_results).await {
            Ok(price_data) => PipelineState { price_data, ..state },
            Err(e) => PipelineState {
                price_data: Vec::new(),
                error: Some(format!("Price extraction failed: {e}")),
                ..state
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::client::ProviderClient;

    fn test_extractor() -> PriceExtractor {
        std::env::set_var("GEMINI_API_KEY", "test-key");
        let client = gemini::Client::from_env();
        let bridge = Arc::new(BrightDataBridge::new("test-token", "unblocker"));
        PriceExtractor::new(&client, "gemini-2.0-flash", bridge)
    }

    #[tokio::test]
    async fn empty_search_results_short_circuit_before_any_agent_call() {
        let extractor = test_extractor();
        let state = PipelineState::new("iPhone 16 256GB");

        let result = extractor.run(state).await;

        assert!(result.price_data.is_empty());
        assert_eq!(
            result.error.as_deref(),
            Some("No product URLs found to extract prices from")
        );
    }

    #[test]
    fn extracted_price_defaults_apply() {
        let parsed: ExtractedPrice = serde_json::from_str(r#"{"price": 12.5}"#).unwrap();

        assert_eq!(parsed.price, Some(12.5));
        assert_eq!(parsed.title, "");
        assert_eq!(parsed.availability, "Unknown");
    }

    #[test]
    fn failed_records_keep_platform_and_url() {
        let record = PriceRecord::failed(Platform::Walmart, "https://www.walmart.com/ip/1", "boom");

        assert_eq!(record.platform, Platform::Walmart);
        assert_eq!(record.url, "https://www.walmart.com/ip/1");
        assert_eq!(record.price, None);
        assert_eq!(record.title, "");
        assert_eq!(record.availability, "Error extracting");
        assert_eq!(record.error.as_deref(), Some("boom"));
    }
}
