// Route definitions for the coderun API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/health", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
        .route("/metrics", get(handlers::prometheus_metrics))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().merge(routes()).with_state(state)
}
