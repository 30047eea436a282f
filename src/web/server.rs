use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{api, AppState};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Forecasts
        .route("/predict/", post(api::post_predict))
        // Service and model introspection
        .route("/api/health", get(api::health_check))
        .route("/api/models", get(api::get_models))
        .route("/api/models/reload", post(api::post_reload_models))
        .layer(cors)
        .with_state(state)
}

pub async fn start_prediction_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Prediction server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
