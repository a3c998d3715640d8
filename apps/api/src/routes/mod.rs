pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::batch::handlers as batches;
use crate::coaching::handlers as coaching;
use crate::jd::handlers as jd;
use crate::resumes::handlers as resumes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resumes
        .route("/api/v1/resumes", post(resumes::handle_create_resume))
        .route(
            "/api/v1/resumes/:id/versions",
            get(resumes::handle_list_versions),
        )
        .route("/api/v1/users/:id/resume", get(resumes::handle_latest_resume))
        // Batches
        .route("/api/v1/batches", post(batches::handle_create_batch))
        .route("/api/v1/batches/:id", get(batches::handle_get_batch))
        .route("/api/v1/batches/:id/items", post(batches::handle_ingest))
        .route("/api/v1/batches/:id/run", post(batches::handle_run_batch))
        .route("/api/v1/batches/:id/cancel", post(batches::handle_cancel_batch))
        .route(
            "/api/v1/batch-items/:id/process",
            post(batches::handle_process_item),
        )
        // Previews
        .route("/api/v1/jd/normalize", post(jd::handle_normalize))
        .route("/api/v1/coach/tailor", post(coaching::handle_tailor))
        .with_state(state)
}
