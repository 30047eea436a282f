use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

use super::AppState;
use crate::ml::ModelError;

fn default_steps_ahead() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Defaults to every configured instrument
    #[serde(default)]
    pub tickers: Option<Vec<String>>,
    #[serde(default = "default_steps_ahead")]
    pub steps_ahead: i64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: BTreeMap<String, Vec<f64>>,
}

fn error_response(err: &ModelError) -> Response {
    let status = match err {
        ModelError::InvalidHorizon(_) => StatusCode::BAD_REQUEST,
        ModelError::UnknownModel { .. } | ModelError::NotFitted { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else if let Some(instrument) = err.instrument() {
        debug!("Rejected request for {}: {}", instrument, err);
    }
    (status, Json(json!({ "detail": err.to_string() }))).into_response()
}

// === Prediction ===

pub async fn post_predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Response {
    debug!("Predict request: {:?}", request);

    let horizon = match usize::try_from(request.steps_ahead) {
        Ok(h) if h >= 1 => h,
        _ => return error_response(&ModelError::InvalidHorizon(request.steps_ahead)),
    };

    let manager = state.manager.read().await;
    match manager.predict(horizon, request.tickers.as_deref()) {
        Ok(predictions) => (StatusCode::OK, Json(PredictResponse { predictions })).into_response(),
        Err(e) => error_response(&e),
    }
}

// === Models ===

pub async fn get_models(State(state): State<AppState>) -> impl IntoResponse {
    let manager = state.manager.read().await;
    Json(json!({
        "instruments": manager.instruments(),
        "x_size": manager.x_size(),
        "y_size": manager.y_size(),
        "models": manager.model_summaries(),
    }))
}

pub async fn post_reload_models(State(state): State<AppState>) -> Response {
    let mut manager = state.manager.write().await;
    match manager.load(state.store.as_ref()).await {
        Ok(report) => {
            info!(
                "Reloaded models: {} loaded, {} missing, {} rejected",
                report.loaded.len(),
                report.missing.len(),
                report.rejected.len()
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// === Health ===

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let manager = state.manager.read().await;
    Json(json!({
        "status": "ok",
        "fitted_models": manager.fitted_instruments(),
    }))
}
