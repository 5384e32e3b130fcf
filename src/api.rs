use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::collect::{self, config::CollectorConfig};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CollectorConfig>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/collect", get(run_collect))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct CollectResp {
    success: bool,
    new_jobs_found: usize,
}

/// Trigger one collection run. An external scheduler calls this at most once
/// at a time; overlapping runs are not guarded here.
async fn run_collect(
    State(state): State<AppState>,
) -> Result<Json<CollectResp>, (StatusCode, String)> {
    match collect::run_collection(&state.config).await {
        Ok(report) => Ok(Json(CollectResp {
            success: true,
            new_jobs_found: report.new_jobs_found,
        })),
        Err(e) => {
            tracing::error!(error = ?e, "collection run failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update data".to_string(),
            ))
        }
    }
}
