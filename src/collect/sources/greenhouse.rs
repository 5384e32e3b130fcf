// src/collect/sources/greenhouse.rs
//! Paginated-structured-API adapter over Greenhouse job boards.
//!
//! Iterates a fixed list of board tokens; each successful response carries
//! the board's complete listing, which is the source's explicit completion
//! signal for that token. A board abandoned after repeated failures is
//! skipped, never fatal to the run.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::collect::config::CollectorConfig;
use crate::collect::filter::FilterPolicy;
use crate::collect::machine::{FetchState, PageSignal};
use crate::collect::sources::{polite_delay, random_user_agent};
use crate::collect::types::{Job, JobSource, RunContext};

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<BoardJob>,
}

#[derive(Debug, Deserialize)]
struct BoardJob {
    id: Option<i64>,
    title: Option<String>,
    company_name: Option<String>,
    absolute_url: Option<String>,
    updated_at: Option<String>,
    first_published: Option<String>,
    location: Option<BoardLocation>,
}

#[derive(Debug, Deserialize)]
struct BoardLocation {
    name: Option<String>,
}

pub struct GreenhouseSource {
    client: reqwest::Client,
    policy: FilterPolicy,
    cfg: CollectorConfig,
}

impl GreenhouseSource {
    pub fn new(cfg: &CollectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("building greenhouse http client")?;
        Ok(Self {
            client,
            policy: FilterPolicy::from_config(cfg),
            cfg: cfg.clone(),
        })
    }

    async fn fetch_board(&self, token: &str) -> Result<BoardResponse> {
        let url = format!("{}/v1/boards/{}/jobs", self.cfg.greenhouse_base_url, token);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, random_user_agent())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("fetching greenhouse board {token}"))?
            .error_for_status()
            .with_context(|| format!("greenhouse board {token} status"))?;
        resp.json::<BoardResponse>()
            .await
            .with_context(|| format!("decoding greenhouse board {token} json"))
    }

    /// Normalize one board listing. The derived id is prefixed with the board
    /// token so raw numeric ids cannot collide across sources.
    fn normalize_board(&self, token: &str, resp: BoardResponse, ctx: &RunContext) -> Vec<Job> {
        let scraped_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut parsed = 0usize;
        let mut kept = Vec::new();

        for raw in resp.jobs {
            let Some(raw_id) = raw.id else {
                tracing::debug!(
                    target: "collect",
                    source = "Greenhouse",
                    board = token,
                    "record without id; dropping"
                );
                continue;
            };
            parsed += 1;

            let company = raw
                .company_name
                .clone()
                .unwrap_or_else(|| token.to_string());
            let job = Job {
                id: format!("gh:{token}:{raw_id}"),
                title: raw.title.unwrap_or_default(),
                company_name: company.clone(),
                from: format!("{company} Careers"),
                absolute_url: raw.absolute_url.unwrap_or_default(),
                updated_at: raw.updated_at.or(raw.first_published).unwrap_or_default(),
                scraped_at: scraped_at.clone(),
                location: raw.location.and_then(|l| l.name),
            };
            if self.policy.keep(&job, ctx) {
                kept.push(job);
            } else {
                counter!("collect_filtered_total").increment(1);
            }
        }

        counter!("collect_parsed_total").increment(parsed as u64);
        kept
    }
}

#[async_trait]
impl JobSource for GreenhouseSource {
    async fn collect(&self, ctx: &RunContext) -> Vec<Job> {
        let mut out = Vec::new();
        let backoff_base = Duration::from_millis(self.cfg.backoff_base_ms);

        for (i, token) in self.cfg.boards.iter().enumerate() {
            if i > 0 && ctx.budget_exhausted() {
                tracing::info!(
                    target: "collect",
                    source = self.name(),
                    boards_done = i,
                    boards_total = self.cfg.boards.len(),
                    "time budget exhausted; skipping remaining boards"
                );
                break;
            }

            let mut state = FetchState::start();
            loop {
                match state {
                    FetchState::Fetching { .. } => match self.fetch_board(token).await {
                        Ok(resp) => {
                            counter!("collect_pages_total").increment(1);
                            out.extend(self.normalize_board(token, resp, ctx));
                            // One response is the complete board listing.
                            state = state.on_page(PageSignal::Done);
                        }
                        Err(e) => {
                            counter!("collect_fetch_errors_total").increment(1);
                            tracing::warn!(
                                target: "collect",
                                error = ?e,
                                source = self.name(),
                                board = token,
                                "board fetch failed"
                            );
                            state =
                                state.on_failure(backoff_base, self.cfg.max_consecutive_failures);
                            if state == FetchState::Abandoned {
                                counter!("collect_units_abandoned_total").increment(1);
                                tracing::warn!(
                                    target: "collect",
                                    source = self.name(),
                                    board = token,
                                    "board abandoned after repeated failures"
                                );
                            }
                        }
                    },
                    FetchState::Backoff { delay, .. } => {
                        tokio::time::sleep(delay).await;
                        state = state.resume();
                    }
                    FetchState::Done | FetchState::Abandoned => break,
                }
            }

            // Politeness only between boards; an abandoned board already
            // spent its backoff delays.
            if state == FetchState::Done && i + 1 < self.cfg.boards.len() {
                polite_delay(self.cfg.politeness_min_ms, self.cfg.politeness_jitter_ms).await;
            }
        }
        out
    }

    fn name(&self) -> &'static str {
        "Greenhouse"
    }
}
