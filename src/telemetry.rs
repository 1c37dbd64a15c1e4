// src/telemetry.rs
//! Metric descriptors. Installing an exporter is left to the embedding service;
//! without a recorder the `metrics` macros are no-ops.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up once a recorder is installed).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "curate_articles_total",
            "Articles scored by the curation pipeline."
        );
        describe_counter!("curate_curated_total", "Articles accepted by curation.");
        describe_counter!(
            "curate_rejected_total",
            "Articles rejected by curation, labelled by reason kind."
        );
        describe_counter!(
            "curate_input_defects_total",
            "Input records skipped at the boundary."
        );
        describe_counter!(
            "enhance_calls_total",
            "External generation calls attempted."
        );
        describe_counter!(
            "enhance_cache_hits_total",
            "Articles served from the seed set without a call."
        );
        describe_counter!(
            "enhance_skipped_total",
            "Articles skipped after exhausting retries."
        );
        describe_gauge!(
            "enhance_spend_usd",
            "Spend recorded in the cost ledger for the current day."
        );
        describe_histogram!(
            "enhance_call_ms",
            "Latency of external generation calls in milliseconds."
        );
    });
}
