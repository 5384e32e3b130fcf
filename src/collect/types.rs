// src/collect/types.rs
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// One job listing as it flows through the pipeline and the ledger.
///
/// Field order is the persisted CSV column order; downstream consumers parse
/// the ledger wholesale, so it must stay stable.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub from: String,
    pub absolute_url: String,
    /// Source-supplied timestamp, stored verbatim (RFC3339 or bare date).
    pub updated_at: String,
    /// RFC3339, assigned once when an adapter first produces the record.
    pub scraped_at: String,
    pub location: Option<String>,
}

/// Shared context for one collection run: run type, wall-clock budget, and
/// the reference time used by freshness checks.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// True when the ledger already holds data (incremental pages only).
    pub maintenance: bool,
    /// Reference "now" for the freshness rule, fixed at run start.
    pub now: DateTime<Utc>,
    pub budget: Duration,
    started: Instant,
}

impl RunContext {
    pub fn new(maintenance: bool, budget: Duration) -> Self {
        Self {
            maintenance,
            now: Utc::now(),
            budget,
            started: Instant::now(),
        }
    }

    /// Context with an explicit reference time, for deterministic tests.
    pub fn starting_at(maintenance: bool, budget: Duration, now: DateTime<Utc>) -> Self {
        Self {
            maintenance,
            now,
            budget,
            started: Instant::now(),
        }
    }

    /// Advisory check performed between completed page fetches; an in-flight
    /// request is always allowed to finish.
    pub fn budget_exhausted(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

/// One external listing source. Implementations fetch, parse, normalize and
/// filter sequentially; failures degrade to partial output and never abort
/// the run.
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    async fn collect(&self, ctx: &RunContext) -> Vec<Job>;
    fn name(&self) -> &'static str;
}
