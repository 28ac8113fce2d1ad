use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::schema::{ErrorResponse, HealthResponse, PredictRequest, PredictResponse, RoutesResponse};
use crate::ml::PredictionEngine;

/// Paths served by the prediction service, sorted.
pub const ROUTES: [&str; 4] = ["/", "/health", "/predict", "/routes"];

#[derive(Clone)]
pub struct PredictorServer {
    engine: Arc<PredictionEngine>,
}

impl PredictorServer {
    pub fn new(engine: Arc<PredictionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Static page
            .route("/", get(serve_home))
            // Diagnostics
            .route("/health", get(health))
            .route("/routes", get(routes))
            // Prediction API
            .route("/predict", post(predict))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// Serves until Ctrl-C.
    pub async fn start(&self, host: &str, port: u16) -> Result<()> {
        info!("Starting prediction service on port {}", port);
        info!("Model path: {}", self.engine.model_path().display());

        // Start server
        let listener = tokio::net::TcpListener::bind((host, port)).await?;
        info!("Prediction service listening on http://{}:{}", host, port);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received, stopping prediction service");
            })
            .await?;
        Ok(())
    }
}

async fn serve_home() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn routes(State(server): State<PredictorServer>) -> Json<RoutesResponse> {
    let running_file = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    Json(RoutesResponse {
        running_file,
        cwd,
        model_path: server.engine.model_path().display().to_string(),
        model_exists: server.engine.model_exists(),
        routes: ROUTES.iter().map(|r| r.to_string()).collect(),
    })
}

async fn predict(State(server): State<PredictorServer>, body: Bytes) -> Response {
    // Parse and validate input
    let features = match PredictRequest::from_body(&body).validate() {
        Ok(features) => features,
        Err(e) => {
            debug!("Rejecting prediction request: {}", e);
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_input())).into_response();
        }
    };

    // Model first, fallback formula otherwise
    let estimate = server.engine.estimate(&features).await;
    Json(PredictResponse::from(&estimate)).into_response()
}
