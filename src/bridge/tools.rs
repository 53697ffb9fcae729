// Rig tool wrappers around the scraping bridge. The search/page tools go
// to the URL resolver agent; the per-platform product tools go to the
// price extraction agent, which is told to pick the one matching the
// platform it is working on.
use std::sync::Arc;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;

use super::{BridgeError, BrightDataBridge};
use crate::pipeline::Platform;

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct PageArgs {
    pub url: String,
}

fn page_parameters() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "description": "Direct product page URL"
            }
        },
        "required": ["url"]
    })
}

fn product_tool_definition(name: &str, platform: Platform) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: format!(
            "Fetch structured product data (price, title, availability) for a {} product page URL.",
            platform.label()
        ),
        parameters: page_parameters(),
    }
}

/// Web search through the scraping service, for locating product pages.
pub struct SearchEngineTool {
    bridge: Arc<BrightDataBridge>,
}

impl SearchEngineTool {
    pub fn new(bridge: Arc<BrightDataBridge>) -> Self {
        Self { bridge }
    }
}

impl Tool for SearchEngineTool {
    const NAME: &'static str = "search_engine";

    type Error = BridgeError;
    type Args = SearchArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search the web and return the raw results page. Use this to locate \
                          product pages on retail sites."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.bridge.search_engine(&args.query).await
    }
}

/// Generic page fetch through the unlocker zone.
pub struct ScrapePageTool {
    bridge: Arc<BrightDataBridge>,
}

impl ScrapePageTool {
    pub fn new(bridge: Arc<BrightDataBridge>) -> Self {
        Self { bridge }
    }
}

impl Tool for ScrapePageTool {
    const NAME: &'static str = "scrape_page";

    type Error = BridgeError;
    type Args = PageArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Fetch a web page and return its raw content. Use this to verify that \
                          a URL is a direct product page."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to fetch"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.bridge.scrape_page(&args.url).await
    }
}

/// Structured product scrape for Amazon product pages.
pub struct AmazonProductTool {
    bridge: Arc<BrightDataBridge>,
}

impl AmazonProductTool {
    pub fn new(bridge: Arc<BrightDataBridge>) -> Self {
        Self { bridge }
    }
}

impl Tool for AmazonProductTool {
    const NAME: &'static str = "web_data_amazon_product";

    type Error = BridgeError;
    type Args = PageArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        product_tool_definition(Self::NAME, Platform::Amazon)
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.bridge.scrape_product(Platform::Amazon, &args.url).await
    }
}

/// Structured product scrape for Walmart product pages.
pub struct WalmartProductTool {
    bridge: Arc<BrightDataBridge>,
}

impl WalmartProductTool {
    pub fn new(bridge: Arc<BrightDataBridge>) -> Self {
        Self { bridge }
    }
}

impl Tool for WalmartProductTool {
    const NAME: &'static str = "web_data_walmart_product";

    type Error = BridgeError;
    type Args = PageArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        product_tool_definition(Self::NAME, Platform::Walmart)
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.bridge.scrape_product(Platform::Walmart, &args.url).await
    }
}

/// Structured product scrape for Best Buy product pages.
pub struct BestBuyProductTool {
    bridge: Arc<BrightDataBridge>,
}

impl BestBuyProductTool {
    pub fn new(bridge: Arc<BrightDataBridge>) -> Self {
        Self { bridge }
    }
}

impl Tool for BestBuyProductTool {
    const NAME: &'static str = "web_data_bestbuy_products";

    type Error = BridgeError;
    type Args = PageArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        product_tool_definition(Self::NAME, Platform::BestBuy)
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.bridge.scrape_product(Platform::BestBuy, &args.url).await
    }
}
