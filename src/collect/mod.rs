// src/collect/mod.rs
pub mod config;
pub mod filter;
pub mod machine;
pub mod sources;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::collect::config::CollectorConfig;
use crate::collect::sources::{greenhouse::GreenhouseSource, linkedin::LinkedinSource};
use crate::collect::types::{Job, JobSource, RunContext};
use crate::ledger::{self, CsvLedger};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_runs_total", "Completed collection runs.");
        describe_counter!("collect_pages_total", "Successfully fetched source pages.");
        describe_counter!("collect_parsed_total", "Candidates parsed from source pages.");
        describe_counter!(
            "collect_filtered_total",
            "Candidates rejected by the filtering policy."
        );
        describe_counter!("collect_fetch_errors_total", "Transient page fetch errors.");
        describe_counter!(
            "collect_units_abandoned_total",
            "Pagination sequences or boards abandoned after repeated failures."
        );
        describe_counter!(
            "collect_source_panics_total",
            "Source adapter tasks that panicked mid-run."
        );
        describe_counter!(
            "collect_new_jobs_total",
            "Net-new records appended to the ledger."
        );
        describe_gauge!("collect_last_run_ts", "Unix ts when a collection last ran.");
        describe_gauge!("collect_ledger_size", "Records in the persisted ledger.");
    });
}

/// Outcome of one collection run, reported to the caller.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CollectionReport {
    pub new_jobs_found: usize,
}

/// Fan out over all source adapters concurrently and wait for every one to
/// reach a terminal state before consuming any result. Partial output from
/// degraded adapters is kept; a panicked adapter task loses only its own
/// share of the batch.
pub async fn collect_candidates(
    sources: Vec<Arc<dyn JobSource>>,
    ctx: &RunContext,
) -> Vec<Job> {
    let mut handles = Vec::with_capacity(sources.len());
    for source in sources {
        let name = source.name();
        let ctx = ctx.clone();
        handles.push((
            name,
            tokio::spawn(async move { source.collect(&ctx).await }),
        ));
    }

    let mut batch = Vec::new();
    for (name, handle) in handles {
        match handle.await {
            Ok(mut jobs) => {
                tracing::info!(target: "collect", source = name, kept = jobs.len(), "source settled");
                batch.append(&mut jobs);
            }
            Err(e) => {
                counter!("collect_source_panics_total").increment(1);
                tracing::warn!(target: "collect", error = ?e, source = name, "source task failed");
            }
        }
    }
    batch
}

/// Pipeline entry point: detect run type from the ledger snapshot, run all
/// adapters under the corresponding time budget, merge by id and persist
/// atomically. Only a persistence failure is fatal.
pub async fn run_collection(cfg: &CollectorConfig) -> Result<CollectionReport> {
    ensure_metrics_described();

    let store = CsvLedger::new(&cfg.ledger_path);
    let maintenance = store.exists();
    let budget = Duration::from_secs(if maintenance {
        cfg.maintenance_budget_secs
    } else {
        cfg.cold_budget_secs
    });
    let ctx = RunContext::new(maintenance, budget);
    tracing::info!(
        target: "collect",
        maintenance,
        budget_secs = budget.as_secs(),
        "collection run starting"
    );

    let sources: Vec<Arc<dyn JobSource>> = vec![
        Arc::new(LinkedinSource::new(cfg).context("building linkedin source")?),
        Arc::new(GreenhouseSource::new(cfg).context("building greenhouse source")?),
    ];
    let batch = collect_candidates(sources, &ctx).await;

    let existing = match store.load() {
        Ok(jobs) => jobs,
        Err(e) => {
            // Unreadable snapshot degrades to a cold start; the atomic
            // persist below replaces it wholesale.
            tracing::warn!(target: "collect", error = ?e, "ledger load failed; starting empty");
            Vec::new()
        }
    };

    let (merged, added) = ledger::merge(existing, batch);
    store.persist(&merged).context("persisting merged ledger")?;

    counter!("collect_runs_total").increment(1);
    counter!("collect_new_jobs_total").increment(added as u64);
    gauge!("collect_last_run_ts").set(ctx.now.timestamp().max(0) as f64);
    gauge!("collect_ledger_size").set(merged.len() as f64);
    tracing::info!(
        target: "collect",
        new_jobs_found = added,
        ledger_size = merged.len(),
        "collection run finished"
    );

    Ok(CollectionReport {
        new_jobs_found: added,
    })
}
