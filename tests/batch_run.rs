// tests/batch_run.rs
use std::fs;
use std::path::Path;
use std::sync::Arc;

use news_curator::enhance::client::MockClient;
use news_curator::enhance::BatchStatus;
use news_curator::output::{CURATED_FILE, ENHANCED_FILE, LEDGER_FILE, REJECTED_FILE};
use news_curator::runner::run_batch_with;
use news_curator::{run_batch, CurationMode, CuratorConfig};
use serde_json::{json, Value};

fn quick_config() -> CuratorConfig {
    let mut cfg = CuratorConfig::default();
    cfg.curation.min_total_score = 0.0;
    cfg.generation.rate_limit_delay_ms = 0;
    cfg.generation.retry_delay_ms = 0;
    cfg
}

fn write_input(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("raw_articles.json");
    let doc = json!({
        "articles": [
            {
                "title": "Grève à la SNCF : le trafic très perturbé ce matin",
                "summary": "Les syndicats appellent à poursuivre le mouvement.",
                "source": "France Info",
                "url": "https://exemple.fr/greve",
                "published": "2025-06-01T08:00:00Z"
            },
            {
                "title": "Grève à la SNCF : le trafic très perturbé ce matin !",
                "url": "https://exemple.fr/greve-bis"
            },
            {
                "title": "Inflation : les prix alimentaires vont-ils enfin baisser ?",
                "url": "https://exemple.fr/inflation"
            },
            { "summary": "sans titre" }
        ]
    });
    fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
    path
}

fn read(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn full_run_writes_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let out_dir = dir.path().join("out");

    let summary = run_batch_with(
        &quick_config(),
        Arc::new(MockClient::default()),
        &input,
        &out_dir,
        CurationMode::Full,
    )
    .await
    .unwrap();

    assert_eq!(summary.input_records, 4);
    assert_eq!(summary.skipped_records, 1);
    assert_eq!(summary.curated, 2);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.enhanced, 2);
    // the seed title is served from cache
    assert_eq!(summary.calls_made, 1);
    assert_eq!(summary.status, BatchStatus::Completed);

    let curated = read(&out_dir.join(CURATED_FILE));
    assert_eq!(curated["metadata"]["total_curated"], 2);
    assert_eq!(curated["metadata"]["mode"], "full");

    let rejected = read(&out_dir.join(REJECTED_FILE));
    assert_eq!(rejected["total_rejected"], 1);
    assert_eq!(rejected["rejection_reasons"]["duplicate"], 1);
    assert_eq!(rejected["skipped_records"][0]["index"], 3);

    let enhanced = read(&out_dir.join(ENHANCED_FILE));
    assert_eq!(enhanced["metadata"]["total_articles"], 2);
    assert_eq!(enhanced["report"]["status"], "completed");
    assert_eq!(enhanced["report"]["provider"], "mock");
    let origins: Vec<&str> = enhanced["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["origin"].as_str().unwrap())
        .collect();
    assert!(origins.contains(&"seed"));
    assert!(origins.contains(&"generated"));

    let ledger = read(&out_dir.join(LEDGER_FILE));
    assert_eq!(ledger["calls"], 1);
}

#[tokio::test]
async fn ledger_carries_over_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let out_dir = dir.path().join("out");
    let mut cfg = quick_config();
    cfg.budget.max_daily_calls = 1;

    let first = run_batch_with(&cfg, Arc::new(MockClient::default()), &input, &out_dir, CurationMode::Full)
        .await
        .unwrap();
    assert_eq!(first.calls_made, 1);

    let second = run_batch_with(&cfg, Arc::new(MockClient::default()), &input, &out_dir, CurationMode::Full)
        .await
        .unwrap();
    assert_eq!(second.calls_made, 0);
    assert!(matches!(second.status, BatchStatus::BudgetExhausted { .. }));

    // every curated article is still published, with placeholders where needed
    let enhanced = read(&out_dir.join(ENHANCED_FILE));
    assert_eq!(enhanced["articles"].as_array().unwrap().len(), second.curated);
}

#[tokio::test]
async fn missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let res = run_batch_with(
        &quick_config(),
        Arc::new(MockClient::default()),
        &dir.path().join("absent.json"),
        dir.path(),
        CurationMode::Full,
    )
    .await;
    assert!(res.is_err());
}

#[serial_test::serial]
#[tokio::test]
async fn mock_mode_from_environment() {
    let prev = std::env::var("AI_TEST_MODE").ok();
    std::env::set_var("AI_TEST_MODE", "mock");

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let res = run_batch(&quick_config(), &input, &dir.path().join("out"), CurationMode::FastTrack).await;

    match prev {
        Some(v) => std::env::set_var("AI_TEST_MODE", v),
        None => std::env::remove_var("AI_TEST_MODE"),
    }

    let summary = res.unwrap();
    assert_eq!(summary.mode, CurationMode::FastTrack);
    // fast-track skips similarity dedup, so the near-duplicate survives
    assert_eq!(summary.curated, 3);
    assert_eq!(summary.calls_made, 2);
}
