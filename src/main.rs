//! Job Collection Service — Binary Entrypoint
//! Boots the Axum HTTP server exposing the collection trigger and metrics.
//!
//! The `/collect` route is meant to be hit by an external cron scheduler;
//! single-flight execution is an operational invariant, not enforced here.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ds_jobs_tracker::api::{create_router, AppState};
use ds_jobs_tracker::collect::config::CollectorConfig;
use ds_jobs_tracker::metrics::Metrics;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - COLLECT_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("COLLECT_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("collect=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let config = CollectorConfig::load_default().expect("Failed to load collector config");
    let metrics = Metrics::init(config.freshness_window_hours);

    let state = AppState {
        config: Arc::new(config),
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
