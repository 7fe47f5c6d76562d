// src/main.rs
//
// sdc-select <request.json>
//
// Loads the engine config ($SDC_SELECT_CONFIG, default config.yaml), runs one
// selection over the tests in the request file and prints the response as
// JSON on stdout. Errors go to stdout as an ErrorResponse and exit non-zero.

use anyhow::{bail, Context, Result};
use sdc_test_selector::{EngineConfig, InitRequest, SelectRequest, SelectionService};
use std::env;
use std::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "SDC_SELECT_CONFIG";
const DEFAULT_CONFIG: &str = "config.yaml";

fn main() -> Result<()> {
    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let config = EngineConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("🚗 SDC test selection starting");
    info!(
        "✓ Configuration loaded: strategy={}, policy={}",
        config.strategy.kind(),
        config.selector.policy
    );

    let Some(request_path) = env::args().nth(1) else {
        bail!("usage: sdc-select <request.json>");
    };
    let body = fs::read_to_string(&request_path)
        .with_context(|| format!("Failed to read request {}", request_path))?;
    let request: SelectRequest = serde_json::from_str(&body)
        .with_context(|| format!("Malformed select request {}", request_path))?;
    info!("✓ Request loaded: {} candidate tests", request.tests.len());

    let mut service = SelectionService::new();
    let outcome = service
        .initialize(InitRequest { config })
        .and_then(|_| service.select(&request));

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            info!(
                "✓ Done: {} selected, {} excluded",
                response.selected_ids.len(),
                response.diagnostics.len()
            );
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            error!("Selection failed: {}", err);
            Err(err.into())
        }
    }
}
