// src/collect/filter.rs
//! Filtering policy: pure predicates deciding whether a normalized candidate
//! qualifies. Consulted by every source adapter before a record leaves it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::collect::config::CollectorConfig;
use crate::collect::types::{Job, RunContext};

#[derive(Debug, Clone)]
pub struct FilterPolicy {
    locations: Vec<String>,
    domain_keyword: String,
    role_keyword: String,
    freshness_window: chrono::Duration,
}

impl FilterPolicy {
    pub fn from_config(cfg: &CollectorConfig) -> Self {
        Self {
            locations: cfg.locations.iter().map(|l| l.to_lowercase()).collect(),
            domain_keyword: cfg.domain_keyword.to_lowercase(),
            role_keyword: cfg.role_keyword.to_lowercase(),
            freshness_window: chrono::Duration::hours(cfg.freshness_window_hours as i64),
        }
    }

    /// All rules must pass. Deterministic given the candidate and `ctx.now`;
    /// no side effects.
    pub fn keep(&self, candidate: &Job, ctx: &RunContext) -> bool {
        self.has_required_fields(candidate)
            && self.location_allowed(candidate)
            && self.title_matches(candidate)
            && self.fresh_enough(candidate, ctx)
    }

    fn has_required_fields(&self, job: &Job) -> bool {
        !job.title.is_empty()
            && !job.company_name.is_empty()
            && !job.absolute_url.is_empty()
            && !job.id.is_empty()
            && !job.updated_at.is_empty()
    }

    /// Allowlist applies only when the source supplied a location at all.
    fn location_allowed(&self, job: &Job) -> bool {
        match job.location.as_deref() {
            None | Some("") => true,
            Some(loc) => {
                let loc = loc.to_lowercase();
                self.locations.iter().any(|allowed| loc.contains(allowed))
            }
        }
    }

    fn title_matches(&self, job: &Job) -> bool {
        let title = job.title.to_lowercase();
        title.contains(&self.domain_keyword) && title.contains(&self.role_keyword)
    }

    /// Maintenance runs only take listings updated within the window; a cold
    /// run skips the rule so the first run can backfill history.
    fn fresh_enough(&self, job: &Job, ctx: &RunContext) -> bool {
        if !ctx.maintenance {
            return true;
        }
        match parse_source_timestamp(&job.updated_at) {
            Some(ts) => ts >= ctx.now - self.freshness_window,
            None => false,
        }
    }
}

/// Sources emit RFC3339, naive datetimes, or bare dates; parse leniently.
pub fn parse_source_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&nd.and_hms_opt(0, 0, 0)?));
    }
    None
}
