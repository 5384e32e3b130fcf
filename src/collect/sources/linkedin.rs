// src/collect/sources/linkedin.rs
//! Paginated-HTML adapter for the LinkedIn guest job search.
//!
//! The cursor is a numeric offset advanced by the configured batch size.
//! Pagination ends cleanly on an empty page, an HTTP 400, or a captcha
//! challenge in the body; transient errors go through exponential backoff
//! and abandon the sequence after the consecutive-failure cap.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::collect::config::CollectorConfig;
use crate::collect::filter::FilterPolicy;
use crate::collect::machine::{FetchState, PageSignal};
use crate::collect::sources::{polite_delay, random_user_agent};
use crate::collect::types::{Job, JobSource, RunContext};

/// Source-side "last 24 hours" query filter, applied on maintenance runs.
const LAST_DAY_FILTER: &str = "r86400";
/// Anti-automation challenge marker; finding it ends pagination cleanly.
const CHALLENGE_MARKER: &str = "captcha";

struct RawPage {
    body: String,
    /// HTTP 400: the source refuses offsets past the end of results.
    exhausted: bool,
}

pub struct LinkedinSource {
    client: reqwest::Client,
    policy: FilterPolicy,
    cfg: CollectorConfig,
}

impl LinkedinSource {
    pub fn new(cfg: &CollectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("building linkedin http client")?;
        Ok(Self {
            client,
            policy: FilterPolicy::from_config(cfg),
            cfg: cfg.clone(),
        })
    }

    async fn fetch_page(&self, offset: u32, maintenance: bool) -> Result<RawPage> {
        let url = format!(
            "{}/jobs-guest/jobs/api/seeMoreJobPostings/search",
            self.cfg.linkedin_base_url
        );
        let mut query: Vec<(&str, String)> = vec![
            ("keywords", format!("\"{}\"", self.cfg.search_keywords)),
            ("geoId", self.cfg.geo_id.clone()),
        ];
        if maintenance {
            query.push(("f_TPR", LAST_DAY_FILTER.to_string()));
        }
        query.push(("start", offset.to_string()));

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .header(reqwest::header::USER_AGENT, random_user_agent())
            .header(
                reqwest::header::ACCEPT,
                "application/json, text/javascript, */*; q=0.01",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(
                reqwest::header::REFERER,
                "https://www.linkedin.com/jobs/search",
            )
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .context("linkedin page fetch")?;

        let status = resp.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Ok(RawPage {
                body: String::new(),
                exhausted: true,
            });
        }
        if !status.is_success() {
            anyhow::bail!("linkedin returned status {status}");
        }
        let body = resp.text().await.context("linkedin page body")?;
        Ok(RawPage {
            body,
            exhausted: false,
        })
    }

    /// Extract candidates from one rendered result page. Records missing a
    /// required field or an extractable id are dropped, never fatal to the
    /// page. Returns the surviving candidates and the pagination signal.
    fn parse_page(&self, html: &str, ctx: &RunContext) -> (Vec<Job>, PageSignal) {
        if html.contains(CHALLENGE_MARKER) {
            tracing::info!(
                target: "collect",
                source = "Linkedin",
                "challenge marker in response; ending pagination"
            );
            return (Vec::new(), PageSignal::Blocked);
        }

        let doc = Html::parse_document(html);
        let scraped_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut parsed = 0usize;
        let mut kept = Vec::new();

        for card in doc.select(card_selector()) {
            let title = inner_text(&card, title_selector());
            let company_name = inner_text(&card, subtitle_selector());
            let absolute_url = attr_of(&card, link_selector(), "href");
            let updated_at = attr_of(&card, time_selector(), "datetime");
            let entity_urn = card.value().attr("data-entity-urn");

            let Some(id) = derive_job_id(&absolute_url, entity_urn) else {
                if !title.is_empty() {
                    tracing::warn!(
                        target: "collect",
                        source = "Linkedin",
                        title = %title,
                        url = %absolute_url,
                        "no job id could be derived; dropping record"
                    );
                }
                continue;
            };
            if title.is_empty()
                || company_name.is_empty()
                || absolute_url.is_empty()
                || updated_at.is_empty()
            {
                tracing::debug!(
                    target: "collect",
                    source = "Linkedin",
                    id = %id,
                    "record missing required fields; dropping"
                );
                continue;
            }
            parsed += 1;

            let job = Job {
                id,
                title,
                company_name,
                from: "Linkedin".into(),
                absolute_url,
                updated_at,
                scraped_at: scraped_at.clone(),
                location: None,
            };
            if self.policy.keep(&job, ctx) {
                kept.push(job);
            } else {
                counter!("collect_filtered_total").increment(1);
            }
        }

        counter!("collect_parsed_total").increment(parsed as u64);
        let signal = if parsed == 0 {
            PageSignal::Done
        } else {
            PageSignal::More
        };
        (kept, signal)
    }
}

#[async_trait]
impl JobSource for LinkedinSource {
    async fn collect(&self, ctx: &RunContext) -> Vec<Job> {
        let mut out = Vec::new();
        let mut offset = 0u32;
        let mut state = FetchState::start();
        let backoff_base = Duration::from_millis(self.cfg.backoff_base_ms);

        loop {
            match state {
                FetchState::Fetching { .. } => {
                    match self.fetch_page(offset, ctx.maintenance).await {
                        Ok(page) if page.exhausted => {
                            state = FetchState::Done;
                        }
                        Ok(page) => {
                            counter!("collect_pages_total").increment(1);
                            let (mut batch, signal) = self.parse_page(&page.body, ctx);
                            out.append(&mut batch);
                            state = state.on_page(signal);
                            if !state.is_terminal() {
                                offset += self.cfg.page_size;
                                if ctx.budget_exhausted() {
                                    tracing::info!(
                                        target: "collect",
                                        source = self.name(),
                                        offset,
                                        "time budget exhausted; stopping pagination"
                                    );
                                    break;
                                }
                                polite_delay(
                                    self.cfg.politeness_min_ms,
                                    self.cfg.politeness_jitter_ms,
                                )
                                .await;
                            }
                        }
                        Err(e) => {
                            counter!("collect_fetch_errors_total").increment(1);
                            tracing::warn!(
                                target: "collect",
                                error = ?e,
                                source = self.name(),
                                offset,
                                "page fetch failed"
                            );
                            state =
                                state.on_failure(backoff_base, self.cfg.max_consecutive_failures);
                            if state == FetchState::Abandoned {
                                counter!("collect_units_abandoned_total").increment(1);
                                tracing::warn!(
                                    target: "collect",
                                    source = self.name(),
                                    "pagination abandoned after repeated failures"
                                );
                            }
                        }
                    }
                }
                FetchState::Backoff { delay, .. } => {
                    tokio::time::sleep(delay).await;
                    state = state.resume();
                }
                FetchState::Done | FetchState::Abandoned => break,
            }
        }
        out
    }

    fn name(&self) -> &'static str {
        "Linkedin"
    }
}

fn card_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse("li").unwrap())
}

fn title_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse(".base-search-card__title").unwrap())
}

fn subtitle_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse(".base-search-card__subtitle").unwrap())
}

fn link_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse(".base-card__full-link").unwrap())
}

fn time_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse("time").unwrap())
}

fn inner_text(card: &ElementRef, sel: &Selector) -> String {
    card.select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn attr_of(card: &ElementRef, sel: &Selector, attr: &str) -> String {
    card.select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
        .to_string()
}

/// Fallback chain for the listing id: numeric suffix of the job URL, then the
/// `view/` path segment, then the entity URN. All-fail drops the record.
fn derive_job_id(url: &str, entity_urn: Option<&str>) -> Option<String> {
    static RE_URL_ID: OnceCell<Regex> = OnceCell::new();
    let re_url = RE_URL_ID.get_or_init(|| Regex::new(r"-(\d+)(?:\?|$)").unwrap());
    if let Some(c) = re_url.captures(url) {
        return Some(c[1].to_string());
    }

    if let Some((_, rest)) = url.split_once("view/") {
        let id = rest.split('?').next().unwrap_or_default();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    static RE_URN_ID: OnceCell<Regex> = OnceCell::new();
    let re_urn = RE_URN_ID.get_or_init(|| Regex::new(r"jobPosting:(\d+)").unwrap());
    if let Some(c) = entity_urn.and_then(|u| re_urn.captures(u)) {
        return Some(c[1].to_string());
    }

    None
}
