mod api;
mod pages;

pub use api::*;
pub use pages::*;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/issue", post(issue_handler))
        .route("/batch", post(batch_handler))
        .route("/download/:filename", get(download_file))
        .route("/download_all", get(download_all))
        .route("/api/next-number", get(next_number))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
