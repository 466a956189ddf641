//! HTTP Transport
//!
//! JSON-over-HTTP routes in front of [`SafetyAnalyzer`].

use crate::{
    schemas::{
        AnalysisRequest, AnalysisResponse, AppUsageData, LocationData, ModelStatus,
        PerformanceMetrics,
    },
    SafetyAnalyzer, SafetyError,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

/// Service name reported by the root endpoint
pub const SERVICE_NAME: &str = "Safewatch risk analysis server";

/// Shared router state
pub type AppState = Arc<SafetyAnalyzer>;

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

/// Transport-level error
#[derive(Debug)]
pub struct ApiError(SafetyError);

impl From<SafetyError> for ApiError {
    fn from(e: SafetyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SafetyError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorResponse {
            code: code.into(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Pattern learning submission
#[derive(Debug, Serialize, Deserialize)]
pub struct LearnPatternRequest {
    /// Subject of the data
    pub user_id: String,
    /// Behavioral data, opaque to the server
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Pattern learning acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct LearnPatternAck {
    /// Status line
    pub message: String,
    /// Subject of the data
    pub user_id: String,
    /// Queued learning job
    pub job_id: Uuid,
    /// Acknowledgement time (RFC 3339)
    pub timestamp: String,
}

/// Build the API router
pub fn build_router(analyzer: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/analyze/safety", post(analyze_safety))
        .route("/learn/pattern", post(learn_pattern))
        .route("/model/status", get(model_status))
        .route("/metrics/performance", get(performance_metrics))
        .route("/test/analyze", post(test_analysis))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(analyzer)
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "ai_service": "operational",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn analyze_safety(
    State(analyzer): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    request.validate()?;
    tracing::info!(user_id = %request.user_id, "safety analysis request received");
    Ok(Json(analyzer.analyze(&request)))
}

async fn learn_pattern(
    State(analyzer): State<AppState>,
    Json(body): Json<LearnPatternRequest>,
) -> Result<Json<LearnPatternAck>, ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(SafetyError::InvalidRequest("user_id must not be empty".into()).into());
    }
    let job_id = analyzer.learn_pattern(&body.user_id, body.data);
    Ok(Json(LearnPatternAck {
        message: "Pattern learning started".into(),
        user_id: body.user_id,
        job_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn model_status(State(analyzer): State<AppState>) -> Json<ModelStatus> {
    Json(analyzer.status())
}

async fn performance_metrics(State(analyzer): State<AppState>) -> Json<PerformanceMetrics> {
    Json(analyzer.metrics())
}

async fn test_analysis(State(analyzer): State<AppState>) -> Json<AnalysisResponse> {
    let now = Utc::now().to_rfc3339();
    let request = AnalysisRequest {
        user_id: "test_user".into(),
        app_usage: Some(AppUsageData {
            screen_time: 120,
            app_open_count: 15,
            last_activity: now.clone(),
        }),
        location: Some(LocationData {
            latitude: 37.5665,
            longitude: 126.9780,
            accuracy: 10.0,
            timestamp: now.clone(),
        }),
        last_checkin: Some(now),
        additional_data: None,
    };
    Json(analyzer.analyze(&request))
}
