// tests/collect_backoff.rs
// Retry/abandon behavior against failing sources. Backoff base is shrunk to
// keep the tests fast; the schedule itself is unit-tested in collect::machine.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ds_jobs_tracker::collect::sources::{greenhouse::GreenhouseSource, linkedin::LinkedinSource};
use ds_jobs_tracker::{CollectorConfig, JobSource, RunContext};

fn fast_cfg(server_uri: &str) -> CollectorConfig {
    CollectorConfig {
        greenhouse_base_url: server_uri.to_string(),
        linkedin_base_url: server_uri.to_string(),
        politeness_min_ms: 0,
        politeness_jitter_ms: 0,
        backoff_base_ms: 1,
        ..CollectorConfig::default()
    }
}

#[tokio::test]
async fn failing_board_is_abandoned_after_three_attempts_and_the_next_proceeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/boards/bad/jobs"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let recent = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    Mock::given(method("GET"))
        .and(path("/v1/boards/good/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [{
                "id": 1,
                "title": "Data Scientist",
                "company_name": "Good",
                "absolute_url": "https://boards.example.com/good/jobs/1",
                "updated_at": recent,
                "location": { "name": "Tel Aviv" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = CollectorConfig {
        boards: vec!["bad".into(), "good".into()],
        ..fast_cfg(&server.uri())
    };
    let source = GreenhouseSource::new(&cfg).unwrap();
    let ctx = RunContext::new(false, Duration::from_secs(60));

    let jobs = source.collect(&ctx).await;
    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["gh:good:1"]);
}

#[tokio::test]
async fn transient_failures_retry_the_same_cursor_then_continue() {
    let server = MockServer::start().await;
    let search_path = "/jobs-guest/jobs/api/seeMoreJobPostings/search";
    let recent = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();

    // First two attempts at offset 0 fail, the third succeeds.
    Mock::given(method("GET"))
        .and(path(search_path))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    let card = format!(
        r#"<ul><li data-entity-urn="urn:li:jobPosting:900001">
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/data-scientist-at-acme-900001?refId=x"></a>
            <h3 class="base-search-card__title">Data Scientist</h3>
            <h4 class="base-search-card__subtitle">Acme</h4>
            <time datetime="{recent}"></time>
        </li></ul>"#
    );
    Mock::given(method("GET"))
        .and(path(search_path))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(card))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(search_path))
        .and(query_param("start", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ul></ul>"))
        .mount(&server)
        .await;

    let source = LinkedinSource::new(&fast_cfg(&server.uri())).unwrap();
    let ctx = RunContext::new(false, Duration::from_secs(60));

    let jobs = source.collect(&ctx).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "900001");
}

#[tokio::test]
async fn exhausted_retries_leave_the_adapter_with_partial_output() {
    let server = MockServer::start().await;
    let search_path = "/jobs-guest/jobs/api/seeMoreJobPostings/search";
    let recent = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();

    let card = format!(
        r#"<ul><li data-entity-urn="urn:li:jobPosting:900002">
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/data-scientist-at-acme-900002?refId=x"></a>
            <h3 class="base-search-card__title">Data Scientist</h3>
            <h4 class="base-search-card__subtitle">Acme</h4>
            <time datetime="{recent}"></time>
        </li></ul>"#
    );
    Mock::given(method("GET"))
        .and(path(search_path))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(card))
        .mount(&server)
        .await;
    // Every later page fails until the sequence is abandoned.
    Mock::given(method("GET"))
        .and(path(search_path))
        .and(query_param("start", "10"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let source = LinkedinSource::new(&fast_cfg(&server.uri())).unwrap();
    let ctx = RunContext::new(false, Duration::from_secs(60));

    // Work already collected before the abandonment is never discarded.
    let jobs = source.collect(&ctx).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "900002");
}

#[tokio::test]
async fn politeness_delay_runs_between_boards_but_not_after_the_last() {
    let server = MockServer::start().await;
    for board in ["one", "two"] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/boards/{board}/jobs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [] })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let cfg = CollectorConfig {
        boards: vec!["one".into(), "two".into()],
        politeness_min_ms: 400,
        ..fast_cfg(&server.uri())
    };
    let source = GreenhouseSource::new(&cfg).unwrap();
    let ctx = RunContext::new(false, Duration::from_secs(60));

    let started = std::time::Instant::now();
    let jobs = source.collect(&ctx).await;
    let elapsed = started.elapsed();

    assert!(jobs.is_empty());
    assert!(
        elapsed >= Duration::from_millis(400),
        "one inter-board delay expected, got {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(800),
        "no delay should follow the final board, got {elapsed:?}"
    );
}

#[tokio::test]
async fn challenge_marker_ends_pagination_cleanly() {
    let server = MockServer::start().await;
    let search_path = "/jobs-guest/jobs/api/seeMoreJobPostings/search";

    Mock::given(method("GET"))
        .and(path(search_path))
        .and(query_param("start", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>please solve this captcha</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let source = LinkedinSource::new(&fast_cfg(&server.uri())).unwrap();
    let ctx = RunContext::new(false, Duration::from_secs(60));

    let jobs = source.collect(&ctx).await;
    assert!(jobs.is_empty());
}
