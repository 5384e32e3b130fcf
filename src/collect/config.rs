// src/collect/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "COLLECTOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/collector.toml";

/// Static collection policy, loaded from TOML. Every field has a built-in
/// default so a missing file falls back to the shipped behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Path of the persisted CSV ledger.
    pub ledger_path: String,

    // Filtering policy
    pub locations: Vec<String>,
    pub domain_keyword: String,
    pub role_keyword: String,
    pub freshness_window_hours: u64,

    // Variant A (paginated HTML search)
    pub linkedin_base_url: String,
    pub search_keywords: String,
    pub geo_id: String,
    pub page_size: u32,

    // Variant B (structured boards API)
    pub greenhouse_base_url: String,
    pub boards: Vec<String>,

    // Run budgets and retry policy
    pub cold_budget_secs: u64,
    pub maintenance_budget_secs: u64,
    pub request_timeout_secs: u64,
    pub max_consecutive_failures: u32,
    pub backoff_base_ms: u64,
    pub politeness_min_ms: u64,
    pub politeness_jitter_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            ledger_path: "jobs.csv".into(),
            locations: [
                "tel aviv",
                "netanya",
                "ramat gan",
                "herzliya",
                "haifa",
                "israel",
            ]
            .map(str::to_string)
            .to_vec(),
            domain_keyword: "data".into(),
            role_keyword: "scientist".into(),
            freshness_window_hours: 12,
            linkedin_base_url: "https://www.linkedin.com".into(),
            search_keywords: "Data Scientist".into(),
            geo_id: "101620260".into(),
            page_size: 10,
            greenhouse_base_url: "https://boards-api.greenhouse.io".into(),
            boards: [
                "wizinc",
                "teads1",
                "unity3d",
                "vonage",
                "safebreach",
                "pontera",
                "catonetworks",
                "honeycombinsurance",
                "apiiro",
                "placerlabs",
                "nebius",
                "orcasecurity",
                "pendo",
                "connecteam",
                "pingidentity",
                "tipaltisolutions",
                "rhinofederatedcomputing",
                "wekatest",
                "via",
                "riskified",
                "rubrik",
                "appsflyer",
                "lightricks",
                "apono",
                "beyondtrust",
            ]
            .map(str::to_string)
            .to_vec(),
            cold_budget_secs: 60,
            maintenance_budget_secs: 30,
            request_timeout_secs: 15,
            max_consecutive_failures: 3,
            backoff_base_ms: 1_000,
            politeness_min_ms: 1_000,
            politeness_jitter_ms: 500,
        }
    }
}

impl CollectorConfig {
    /// Load configuration from an explicit TOML path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing collector config {}", path.display()))
    }

    /// Load configuration using env var + fallbacks:
    /// 1) $COLLECTOR_CONFIG_PATH
    /// 2) config/collector.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            return Self::load_from(&pb)
                .context("COLLECTOR_CONFIG_PATH points to an unreadable config");
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }
}
