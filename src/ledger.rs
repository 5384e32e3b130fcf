// src/ledger.rs
//! Append-only job ledger persisted as a flat CSV with a header row.
//!
//! Column order follows the `Job` field order and must stay stable for the
//! downstream consumers that parse the file wholesale. Persisted records are
//! immutable: a run only ever appends net-new ids.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::collect::types::Job;

/// Persisted column order; must match the `Job` field order.
const COLUMNS: [&str; 8] = [
    "id",
    "title",
    "company_name",
    "from",
    "absolute_url",
    "updated_at",
    "scraped_at",
    "location",
];

#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a prior snapshot exists; decides cold vs maintenance run.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the persisted dataset. A missing snapshot is an empty ledger,
    /// not an error.
    pub fn load(&self) -> Result<Vec<Job>> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path)
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        let mut jobs = Vec::new();
        for row in rdr.deserialize() {
            let job: Job =
                row.with_context(|| format!("parsing ledger row in {}", self.path.display()))?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Write the full dataset as a single atomic replace: serialize to a
    /// sibling temp file, then rename over the snapshot. Readers never see a
    /// partial write, and the previous snapshot survives any failure here.
    pub fn persist(&self, jobs: &[Job]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut wtr = csv::Writer::from_path(&tmp)
                .with_context(|| format!("creating temp ledger {}", tmp.display()))?;
            if jobs.is_empty() {
                // serde only emits the header alongside the first row; keep
                // the header present even for an empty snapshot.
                wtr.write_record(COLUMNS).context("writing ledger header")?;
            }
            for job in jobs {
                wtr.serialize(job).context("serializing ledger row")?;
            }
            wtr.flush().context("flushing temp ledger")?;
        }
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing ledger {}", self.path.display()))?;
        Ok(())
    }
}

/// Merge a candidate batch into the existing dataset by id set-difference.
/// Existing entries keep their order and are never touched; net-new records
/// are appended in insertion order. Returns the merged dataset and how many
/// records were genuinely new.
pub fn merge(existing: Vec<Job>, candidates: Vec<Job>) -> (Vec<Job>, usize) {
    let mut seen: HashSet<String> = existing.iter().map(|j| j.id.clone()).collect();
    let mut merged = existing;
    let mut added = 0usize;
    for candidate in candidates {
        if seen.insert(candidate.id.clone()) {
            merged.push(candidate);
            added += 1;
        }
    }
    (merged, added)
}
