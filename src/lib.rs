// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod curate;
pub mod enhance;
pub mod ingest;
pub mod output;
pub mod pacing;
pub mod runner;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::CuratorConfig;
pub use crate::curate::{CurationMode, CurationPipeline, CurationResult, ScoredArticle};
pub use crate::enhance::ledger::{BudgetLimits, CostLedger};
pub use crate::enhance::{publishable, EnhancedArticle, EnhancementScheduler};
pub use crate::ingest::types::RawArticle;
pub use crate::runner::{run_batch, RunSummary};
