// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod collect;
pub mod ledger;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::collect::config::CollectorConfig;
pub use crate::collect::types::{Job, JobSource, RunContext};
pub use crate::collect::{run_collection, CollectionReport};
pub use crate::ledger::CsvLedger;
