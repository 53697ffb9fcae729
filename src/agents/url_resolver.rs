// Stage 1: locate direct product pages for the query on each platform.
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bridge::tools::{ScrapePageTool, SearchEngineTool};
use crate::bridge::BrightDataBridge;
use crate::pipeline::{PipelineStage, PipelineState, Platform};
use crate::PriceGuardError;

const SEARCH_PREAMBLE: &str = "\
You are a product search specialist. Find product pages on major retail platforms.

Your goal: Find direct product pages for the given product on:
- Amazon
- Walmart
- Best Buy

Use the search_engine tool to find candidate pages and the scrape_page tool to verify them when needed.
Return the actual product page URLs, not search result pages.
Focus on finding exact matches for the product.";

const URL_EXTRACTION_PREAMBLE: &str = "\
You extract product URLs from search output. Only include direct product page URLs, \
not search result pages. Leave a platform's field unset when no direct product page \
was found for it.";

/// Structured output for the URL extraction call.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProductUrls {
    #[schemars(description = "Amazon product page URL")]
    pub amazon: Option<String>,
    #[schemars(description = "Walmart product page URL")]
    pub walmart: Option<String>,
    #[schemars(description = "Best Buy product page URL")]
    pub bestbuy: Option<String>,
}

impl ProductUrls {
    /// Keep only platforms with a usable URL: absent, blank, and
    /// unparseable entries are dropped rather than kept as placeholders.
    fn into_search_results(self) -> BTreeMap<Platform, String> {
        let fields = [
            (Platform::Amazon, self.amazon),
            (Platform::Walmart, self.walmart),
            (Platform::BestBuy, self.bestbuy),
        ];

        let mut results = BTreeMap::new();
        for (platform, url) in fields {
            let Some(url) = url else { continue };
            let url = url.trim().to_string();
            if url.is_empty() || Url::parse(&url).is_err() {
                continue;
            }
            results.insert(platform, url);
        }
        results
    }
}

/// Finds direct product pages via a tool-using agent, then coerces the
/// agent's free-text answer into per-platform URLs with a tool-free
/// extraction call.
pub struct UrlResolver {
    client: gemini::Client,
    model: String,
    bridge: Arc<BrightDataBridge>,
}

impl UrlResolver {
    pub fn new(client: &gemini::Client, model: &str, bridge: Arc<BrightDataBridge>) -> Self {
        Self {
            client: client.clone(),
            model: model.to_string(),
            bridge,
        }
    }

    async fn resolve(&self, product_query: &str) -> Result<BTreeMap<Platform, String>, PriceGuardError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(SEARCH_PREAMBLE)
            .temperature(0.0)
            .tool(SearchEngineTool::new(self.bridge.clone()))
            .tool(ScrapePageTool::new(self.bridge.clone()))
            .build();

        let search_prompt = format!(
            "Find product pages for: {product_query}

Search on these platforms and return direct product page URLs:
1. Amazon - find the specific product page
2. Walmart - find the specific product page
3. Best Buy - find the specific product page

For each platform, provide the direct URL to the product page (not search results)."
        );

        let answer = agent
            .prompt(&search_prompt)
            .multi_turn(12)
            .await
            .map_err(|e| PriceGuardError::Llm(format!("Search agent error: {e}")))?;

        let extractor = self
            .client
            .extractor::<ProductUrls>(&self.model)
            .preamble(URL_EXTRACTION_PREAMBLE)
            .build();

        let input = format!(
            "Extract product URLs from these search results. Only include direct product \
             page URLs, not search results:\n\n{answer}"
        );
        let urls = extractor
            .extract(&input)
            .await
            .map_err(|e| PriceGuardError::Llm(format!("URL extraction error: {e}")))?;

        Ok(urls.into_search_results())
    }
}

#[async_trait]
impl PipelineStage for UrlResolver {
    fn name(&self) -> &'static str {
        "Product search"
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        println!("🔍 Searching product pages for: {}", state.product_query);

        match self.resolve(&state.product_query).await {
            Ok(search_results) => {
                println!("✅ Found {} product URLs", search_results.len());
                for (platform, url) in &search_results {
                    println!("  • {}: {}", platform.label(), url);
                }
                PipelineState {
                    search_results,
                    ..state
                }
            }
            Err(e) => PipelineState {
                search_results: BTreeMap::new(),
                error: Some(format!("Product search failed: {e}")),
                ..state
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_platforms_are_dropped() {
        let urls = ProductUrls {
            amazon: Some("https://www.amazon.com/dp/B0CVRDK4P6".to_string()),
            walmart: None,
            bestbuy: None,
        };

        let results = urls.into_search_results();

        assert_eq!(results.len(), 1);
        assert_eq!(
            results.get(&Platform::Amazon).map(String::as_str),
            Some("https://www.amazon.com/dp/B0CVRDK4P6")
        );
    }

    #[test]
    fn blank_and_malformed_urls_are_dropped() {
        let urls = ProductUrls {
            amazon: Some("   ".to_string()),
            walmart: Some("not a url".to_string()),
            bestbuy: Some("https://www.bestbuy.com/site/6578057.p".to_string()),
        };

        let results = urls.into_search_results();

        assert_eq!(results.len(), 1);
        assert!(results.contains_key(&Platform::BestBuy));
    }

    #[test]
    fn all_platforms_survive_when_present() {
        let urls = ProductUrls {
            amazon: Some("https://www.amazon.com/dp/A".to_string()),
            walmart: Some("https://www.walmart.com/ip/B".to_string()),
            bestbuy: Some("https://www.bestbuy.com/site/C.p".to_string()),
        };

        let results = urls.into_search_results();

        assert_eq!(results.len(), 3);
        let platforms: Vec<Platform> = results.keys().copied().collect();
        assert_eq!(platforms, vec![Platform::Amazon, Platform::Walmart, Platform::BestBuy]);
    }
}
