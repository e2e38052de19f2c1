// HTTP Surface
//
// Read-only endpoints over the engine for dashboards and the map front end:
// health, Prometheus metrics, the engagement report and entity popularity.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::engine::AnalyticsEngine;
use crate::models::{EngagementReport, StatePopularity};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalyticsEngine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub window_days: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/report", get(report_handler))
        .route("/popular", get(popular_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.engine.metrics().registry.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn report_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<EngagementReport> {
    Json(state.engine.get_engagement_report(query.window_days).await)
}

async fn popular_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Vec<StatePopularity>> {
    Json(state.engine.get_popular_entities(query.window_days).await)
}
