// HTTP route handlers for the coderun API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use coderun_common::{ExecutionRequest, ExecutionResponse, Language, Phase, RunnerError};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::metrics;
use crate::AppState;

/// Error surface of the API: every `RunnerError` maps to one status code
pub struct ApiError(pub RunnerError);

impl From<RunnerError> for ApiError {
    fn from(e: RunnerError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &err {
            RunnerError::UnsupportedLanguage { supported, .. } => json!({
                "error": err.kind(),
                "message": err.to_string(),
                "supported": supported,
            }),
            // Host paths and OS errors stay in the log
            e if e.is_internal() => {
                error!(error = %e, "execution failed");
                json!({
                    "error": e.kind(),
                    "message": "internal error while running code",
                })
            }
            e => json!({
                "error": e.kind(),
                "message": e.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

// Canonical name, so "Python" and "python" share a series
fn language_label(raw: &str) -> String {
    Language::from_str(raw)
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn outcome(response: &ExecutionResponse) -> &'static str {
    if response.timed_out {
        "timeout"
    } else if response.exit_code == Some(0) {
        "ok"
    } else if response.phase == Phase::Compile {
        "compile_error"
    } else {
        "runtime_error"
    }
}

/// POST /execute - Run code and wait for the result
pub async fn execute(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<ExecutionResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            metrics::record_rejected("invalid_request");
            return Err(RunnerError::Validation(rejection.body_text()).into());
        }
    };

    let _in_flight = metrics::InFlight::enter();
    match state.executor.execute(&request).await {
        Ok(response) => {
            metrics::record_execution(
                &language_label(&request.language),
                outcome(&response),
                response.duration_ms as f64,
            );
            Ok(Json(response))
        }
        Err(e) => {
            if e.is_internal() {
                metrics::record_execution(&language_label(&request.language), "error", 0.0);
            } else {
                warn!(error = %e, "request rejected");
                metrics::record_rejected(e.kind());
            }
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub languages: Vec<String>,
    pub in_flight: usize,
    pub capacity: usize,
}

/// GET /health - Liveness plus a little context
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let admission = state.executor.admission();
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        languages: Language::supported_names(),
        in_flight: admission.in_flight(),
        capacity: admission.capacity(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInfo {
    pub name: Language,
    pub source_file: &'static str,
    pub compiled: bool,
}

/// GET /languages - Supported language identifiers
pub async fn list_languages() -> impl IntoResponse {
    let languages: Vec<LanguageInfo> = Language::all_variants()
        .iter()
        .map(|&language| {
            let spec = language.spec();
            LanguageInfo {
                name: language,
                source_file: spec.source_file,
                compiled: spec.is_compiled(),
            }
        })
        .collect();
    Json(languages)
}

/// GET /metrics - Prometheus text exposition
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    metrics::record_slots_busy(state.executor.admission().in_flight());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
