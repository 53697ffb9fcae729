// Stage 3: aggregate statistics and render the final report.
use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;

use crate::pipeline::stats::{confidence_score, price_stats};
use crate::pipeline::{PipelineStage, PipelineState, PriceRecord};
use crate::PriceGuardError;

const REPORT_PREAMBLE: &str = "\
Create a clean, professional price analysis report.

Format with emojis and clear sections:
- Product name as header
- Price summary with median, average, range
- Platform breakdown with individual prices
- Confidence score and summary

Make it easy to read and actionable.";

/// One breakdown line per attempted platform, successful or not. Every
/// platform that was attempted appears, regardless of outcome.
fn platform_breakdown(price_data: &[PriceRecord]) -> String {
    let mut lines = String::new();
    for record in price_data {
        match record.price {
            Some(price) => {
                let title = if record.title.is_empty() { "N/A" } else { record.title.as_str() };
                lines.push_str(&format!(
                    "• {}: ${:.2} - {}\n",
                    record.platform.label(),
                    price,
                    title
                ));
            }
            None => {
                lines.push_str(&format!("• {}: No price found\n", record.platform.label()));
            }
        }
    }
    lines
}

/// Computes the aggregate numbers itself and only delegates the prose to
/// the LLM; the confidence score never comes from the model.
pub struct ReportWriter {
    client: gemini::Client,
    model: String,
}

impl ReportWriter {
    pub fn new(client: &gemini::Client, model: &str) -> Self {
        Self {
            client: client.clone(),
            model: model.to_string(),
        }
    }

    async fn render(&self, prompt: &str) -> Result<String, PriceGuardError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(REPORT_PREAMBLE)
            .temperature(0.0)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| PriceGuardError::Llm(format!("Report rendering error: {e}")))
    }
}

#[async_trait]
impl PipelineStage for ReportWriter {
    fn name(&self) -> &'static str {
        "Report generation"
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        let valid_prices = state.valid_prices();

        let Some(stats) = price_stats(&valid_prices) else {
            return PipelineState {
                final_report: format!("❌ No prices found for {}", state.product_query),
                confidence_score: Some(0.0),
                ..state
            };
        };

        let confidence = confidence_score(valid_prices.len());
        let breakdown = platform_breakdown(&state.price_data);

        println!(
            "📊 {} valid prices, confidence {confidence:.1}/10",
            valid_prices.len()
        );

        let prompt = format!(
            "Create a price analysis report:

Product: {product}
Median Price: ${median:.2}
Average Price: ${average:.2}
Price Range: ${min:.2} - ${max:.2}
Confidence Score: {confidence:.1}/10

Platform Data:
{breakdown}",
            product = state.product_query,
            median = stats.median,
            average = stats.mean,
            min = stats.min,
            max = stats.max,
        );

        match self.render(&prompt).await {
            Ok(final_report) => PipelineState {
                final_report,
                confidence_score: Some(confidence),
                ..state
            },
            // The score is deterministic, so it survives a rendering failure.
            Err(e) => PipelineState {
                confidence_score: Some(confidence),
                error: Some(format!("Report generation failed: {e}")),
                ..state
            },
        }
    }
}
