//! Request and Response Schemas

use crate::{features::FeatureRecord, SafetyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// App usage summary reported by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppUsageData {
    /// Screen time (minutes)
    #[serde(alias = "screen_time_minutes")]
    pub screen_time: u32,
    /// App launches in the reporting window
    pub app_open_count: u32,
    /// Last activity (ISO-8601), may be malformed
    pub last_activity: String,
}

/// Location fix reported by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationData {
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Accuracy radius (meters)
    pub accuracy: f64,
    /// Fix time (ISO-8601)
    pub timestamp: String,
}

/// Safety analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Subject of the analysis
    pub user_id: String,
    /// App usage, if reported
    #[serde(default)]
    pub app_usage: Option<AppUsageData>,
    /// Latest location fix, if reported
    #[serde(default)]
    pub location: Option<LocationData>,
    /// Last check-in (ISO-8601), may be malformed
    #[serde(default)]
    pub last_checkin: Option<String>,
    /// Opaque client payload, not used for scoring
    #[serde(default)]
    pub additional_data: Option<serde_json::Value>,
}

impl AnalysisRequest {
    /// Reject requests the transport should never hand to the analyzer
    pub fn validate(&self) -> Result<(), SafetyError> {
        if self.user_id.trim().is_empty() {
            return Err(SafetyError::InvalidRequest("user_id must not be empty".into()));
        }
        if let Some(loc) = &self.location {
            if !(loc.latitude.is_finite() && loc.longitude.is_finite() && loc.accuracy.is_finite()) {
                return Err(SafetyError::InvalidRequest(
                    "location coordinates must be finite".into(),
                ));
            }
        }
        Ok(())
    }
}

/// How a risk level was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Trained classifier
    Model,
    /// Threshold rules, no model available
    RuleBased,
    /// Threshold rules after the model path failed
    RuleBasedFallback,
}

impl AnalysisMethod {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Model => "model",
            AnalysisMethod::RuleBased => "rule_based",
            AnalysisMethod::RuleBasedFallback => "rule_based_fallback",
        }
    }
}

/// Diagnostic details attached to a response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    /// Strategy that produced the risk level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<AnalysisMethod>,
    /// Extracted features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureRecord>,
    /// Pipeline time (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Populated only on the degraded path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Safety analysis response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Risk level (0-10)
    pub risk_level: u8,
    /// Confidence (0-1)
    pub confidence: f64,
    /// Ordered guidance for the user
    pub recommendations: Vec<String>,
    /// Never empty
    pub risk_factors: Vec<String>,
    /// Response time
    pub timestamp: DateTime<Utc>,
    /// Model version that served the request
    pub model_version: String,
    /// Diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_details: Option<AnalysisDetails>,
}

impl AnalysisResponse {
    /// Check the response invariants before it leaves the analyzer
    pub fn validate(&self) -> Result<(), SafetyError> {
        if self.risk_level > 10 {
            return Err(SafetyError::Numeric(format!(
                "risk level {} outside 0-10",
                self.risk_level
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SafetyError::Numeric(format!(
                "confidence {} outside 0-1",
                self.confidence
            )));
        }
        if self.risk_factors.is_empty() {
            return Err(SafetyError::Model("risk factor list is empty".into()));
        }
        Ok(())
    }
}

/// Model status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    /// Reported model name
    pub model_name: String,
    /// Model version
    pub version: String,
    /// `operational` or `initializing`
    pub status: String,
    /// Training time of the loaded model
    pub last_trained: Option<DateTime<Utc>>,
    /// Reported accuracy, absent without a model
    pub accuracy: Option<f64>,
    /// Completed predictions
    pub total_predictions: u64,
}

/// Performance metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Reported accuracy
    pub accuracy: f64,
    /// Reported precision
    pub precision: f64,
    /// Reported recall
    pub recall: f64,
    pub f1_score: f64,
    /// Completed predictions
    pub total_predictions: u64,
    /// Mean response time (seconds)
    pub avg_response_time: f64,
    /// Snapshot time
    pub last_updated: DateTime<Utc>,
}
