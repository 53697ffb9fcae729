use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use rig::client::ProviderClient;
use rig::providers::gemini;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod agents;
mod bridge;
mod pipeline;
mod utils;

use bridge::BrightDataBridge;
use pipeline::{PipelineState, PricePipeline};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_UNLOCKER_ZONE: &str = "unblocker";

#[derive(Error, Debug)]
pub enum PriceGuardError {
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Optional config file at `<config_dir>/priceguard/config.json`.
/// Anything it leaves out falls back to environment variables.
#[derive(Serialize, Deserialize, Default)]
struct FileConfig {
    model: Option<String>,
    unlocker_zone: Option<String>,
    gemini_api_key: Option<String>,
    bright_data_api_token: Option<String>,
}

struct AppConfig {
    model: String,
    unlocker_zone: String,
    gemini_api_key: String,
    bright_data_api_token: String,
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("priceguard").join("config.json"))
        .unwrap_or_else(|| PathBuf::from("priceguard_config.json"))
}

fn read_file_config() -> FileConfig {
    let path = config_path();
    let Ok(content) = fs::read_to_string(&path) else {
        return FileConfig::default();
    };

    match serde_json::from_str(&content) {
        Ok(config) => {
            println!("📁 Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            eprintln!("⚠️ Ignoring malformed config at {:?}: {}", path, e);
            FileConfig::default()
        }
    }
}

fn resolve_key(
    name: &str,
    file_value: Option<String>,
    env_var: &str,
) -> Result<String, PriceGuardError> {
    let value = file_value
        .or_else(|| env::var(env_var).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        Some(value) => {
            println!("✅ {}: Set", name);
            Ok(value)
        }
        None => {
            println!("❌ {}: Missing", name);
            Err(PriceGuardError::Config(format!(
                "{} is not set (config file or {} environment variable)",
                name, env_var
            )))
        }
    }
}

fn load_config() -> Result<AppConfig, PriceGuardError> {
    let file = read_file_config();

    println!("🔧 Environment Check");
    println!("{}", "=".repeat(30));
    let gemini_api_key = resolve_key("GEMINI_API_KEY", file.gemini_api_key, "GEMINI_API_KEY");
    let bright_data_api_token = resolve_key(
        "BRIGHT_DATA_API_TOKEN",
        file.bright_data_api_token,
        "BRIGHT_DATA_API_TOKEN",
    );

    Ok(AppConfig {
        model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        unlocker_zone: file
            .unlocker_zone
            .or_else(|| env::var("WEB_UNLOCKER_ZONE").ok())
            .unwrap_or_else(|| DEFAULT_UNLOCKER_ZONE.to_string()),
        gemini_api_key: gemini_api_key?,
        bright_data_api_token: bright_data_api_token?,
    })
}

/// Print one finished analysis. Step-wide errors are flagged distinctly
/// from a normal report; the surface itself never dies on them.
fn print_analysis(state: &PipelineState) {
    println!();
    if let Some(error) = &state.error {
        println!("⚠️ Analysis incomplete: {}", error);
    }
    if !state.final_report.is_empty() {
        println!("{}", "=".repeat(60));
        println!("{}", state.final_report);
        println!("{}", "=".repeat(60));
    }
    if let Some(score) = state.confidence_score {
        println!("🎯 Confidence: {score:.1}/10");
    }
}

struct TranscriptEntry {
    query: String,
    report: String,
    confidence: Option<f64>,
    error: Option<String>,
    at: DateTime<Local>,
}

async fn interactive_loop(pipeline: &PricePipeline) -> Result<(), PriceGuardError> {
    let mut transcript: Vec<TranscriptEntry> = Vec::new();

    println!();
    println!("Enter a product to analyze ('history' for this session, 'quit' to exit).");

    loop {
        print!("\n🛒 Product> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }

        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "history" => {
                if transcript.is_empty() {
                    println!("No analyses yet this session.");
                }
                for entry in &transcript {
                    let confidence = entry
                        .confidence
                        .map(|c| format!("{c:.1}/10"))
                        .unwrap_or_else(|| "-".to_string());
                    println!("[{}] {} (confidence {})", entry.at.format("%H:%M:%S"), entry.query, confidence);
                    if let Some(error) = &entry.error {
                        println!("    ⚠️ {}", error);
                    } else if let Some(first_line) = entry.report.lines().next() {
                        println!("    {}", first_line);
                    }
                }
            }
            query => {
                let state = pipeline.run(query).await;
                print_analysis(&state);
                transcript.push(TranscriptEntry {
                    query: query.to_string(),
                    report: state.final_report.clone(),
                    confidence: state.confidence_score,
                    error: state.error.clone(),
                    at: Local::now(),
                });
            }
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("🛡️ PriceGuard - Product Price Analysis");
    println!("{}", "=".repeat(50));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            eprintln!("Set the missing keys in the environment or in {:?}.", config_path());
            std::process::exit(1);
        }
    };

    env::set_var("GEMINI_API_KEY", &config.gemini_api_key);
    let client = gemini::Client::from_env();

    let bridge = Arc::new(BrightDataBridge::new(
        &config.bright_data_api_token,
        &config.unlocker_zone,
    ));
    let pipeline = PricePipeline::new(&client, &config.model, bridge);

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        interactive_loop(&pipeline).await?;
    } else {
        let query = args.join(" ");
        let state = pipeline.run(&query).await;
        print_analysis(&state);
    }

    Ok(())
}
