//! News curator: binary entrypoint.
//! Runs one curation + enhancement pass over a batch file and writes the
//! output documents. Locations and mode come from the environment.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_curator::{run_batch, CurationMode, CuratorConfig};

const ENV_INPUT: &str = "CURATOR_INPUT";
const ENV_OUTPUT_DIR: &str = "CURATOR_OUTPUT_DIR";
const ENV_MODE: &str = "CURATOR_MODE";
const ENV_LOG_JSON: &str = "CURATOR_LOG_JSON";

/// Compact logs by default; `CURATOR_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_curator=info,curate=info,enhance=info,ingest=info,warn"));

    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn path_from_env(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn mode_from_env() -> Result<CurationMode> {
    match std::env::var(ENV_MODE) {
        Err(_) => Ok(CurationMode::Full),
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "" | "full" => Ok(CurationMode::Full),
            "fast_track" | "fast-track" | "breaking" => Ok(CurationMode::FastTrack),
            other => anyhow::bail!("{ENV_MODE}: unknown mode {other:?}"),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = CuratorConfig::load_default().context("loading curator config")?;
    let input = path_from_env(ENV_INPUT, "data/raw_articles.json");
    let output_dir = path_from_env(ENV_OUTPUT_DIR, "output");
    let mode = mode_from_env()?;

    let summary = run_batch(&config, &input, &output_dir, mode).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
