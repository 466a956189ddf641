//! Safety Analyzer
//!
//! Orchestrates extraction, scoring, composition and metrics. `analyze`
//! always returns a well-formed response: model errors fall back to the
//! rules, anything else becomes the degraded response.

use crate::{
    config::AnalyzerConfig,
    features,
    learning::PatternLearner,
    metrics::{self, MetricsTracker},
    models::{self, ModelStore, TrainedModel},
    outcome,
    schemas::*,
    scoring::{RiskAssessment, RiskScorer, RuleBasedScorer},
    Result, SafetyError,
};
use chrono::{DateTime, Utc};
use std::time::Instant;
use uuid::Uuid;

/// Name reported in status snapshots
pub const MODEL_NAME: &str = "SafetyAnalyzer";

const DEGRADED_RISK_LEVEL: u8 = 5;
const DEGRADED_CONFIDENCE: f64 = 0.5;

/// Risk analysis service core
pub struct SafetyAnalyzer {
    config: AnalyzerConfig,
    model: Option<TrainedModel>,
    initialized: bool,
    metrics: MetricsTracker,
    learner: PatternLearner,
}

impl SafetyAnalyzer {
    /// Uninitialized analyzer; scores with rules until [`initialize`](Self::initialize)
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            model: None,
            initialized: false,
            metrics: MetricsTracker::new(),
            learner: PatternLearner::new(),
        }
    }

    /// Initialized analyzer without a model
    pub fn rule_based(config: AnalyzerConfig) -> Self {
        let mut analyzer = Self::new(config);
        analyzer.initialized = true;
        analyzer
    }

    /// Initialized analyzer using the given model
    pub fn with_model(config: AnalyzerConfig, model: TrainedModel) -> Self {
        let mut analyzer = Self::rule_based(config);
        analyzer.model = Some(model);
        analyzer
    }

    /// Load the persisted model or synthesize one. Never fails: on error
    /// the analyzer stays rule-based and is still marked operational.
    pub fn initialize(&mut self) {
        tracing::info!("Initializing safety model...");

        match self.load_or_synthesize() {
            Ok(model) => {
                self.model = Some(model);
                tracing::info!("Safety model ready");
            }
            Err(e) => {
                tracing::error!("Model initialization failed, using rule-based analysis only: {}", e);
                self.model = None;
            }
        }

        self.initialized = true;
    }

    fn load_or_synthesize(&self) -> Result<TrainedModel> {
        let store = ModelStore::new(&self.config.model_dir);

        match store.load() {
            Ok(Some((forest, scaler))) => {
                tracing::info!("Loaded persisted model from {}", self.config.model_dir.display());
                return Ok(TrainedModel::new(Box::new(forest), scaler));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Persisted model unusable, rebuilding: {}", e),
        }

        let (forest, scaler) = models::synthesize(&self.config.forest)?;
        if let Err(e) = store.save(&forest, &scaler) {
            tracing::warn!("Could not persist synthesized model: {}", e);
        }
        tracing::info!("Synthesized default model");
        Ok(TrainedModel::new(Box::new(forest), scaler))
    }

    /// Analyze a request against the current clock
    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisResponse {
        self.analyze_at(request, Utc::now())
    }

    /// Analyze a request against a fixed `now`
    pub fn analyze_at(&self, request: &AnalysisRequest, now: DateTime<Utc>) -> AnalysisResponse {
        let start = Instant::now();
        tracing::info!(user_id = %request.user_id, "safety analysis started");

        match self.try_analyze(request, now, start) {
            Ok(response) => {
                let method = response
                    .analysis_details
                    .as_ref()
                    .and_then(|d| d.method)
                    .map_or("unknown", |m| m.as_str());
                tracing::info!(
                    user_id = %request.user_id,
                    risk_level = response.risk_level,
                    confidence = response.confidence,
                    method,
                    "safety analysis complete"
                );
                response
            }
            Err(e) => {
                tracing::error!(user_id = %request.user_id, "safety analysis failed: {}", e);
                self.degraded_response(&e)
            }
        }
    }

    fn try_analyze(
        &self,
        request: &AnalysisRequest,
        now: DateTime<Utc>,
        start: Instant,
    ) -> Result<AnalysisResponse> {
        let features = features::extract(request, now);
        let (assessment, method) = self.score(&features)?;

        let response = AnalysisResponse {
            risk_level: assessment.level(),
            confidence: assessment.confidence,
            recommendations: outcome::recommendations(assessment.risk_level, &features),
            risk_factors: outcome::risk_factors(&features),
            timestamp: Utc::now(),
            model_version: self.config.model_version.clone(),
            analysis_details: None,
        };
        response.validate()?;

        let elapsed = start.elapsed();
        self.metrics.record(elapsed);

        Ok(AnalysisResponse {
            analysis_details: Some(AnalysisDetails {
                method: Some(method),
                features: Some(features),
                response_time_ms: Some(elapsed.as_millis() as u64),
                error: None,
            }),
            ..response
        })
    }

    /// Model when available; rules otherwise or when the model path errors.
    /// Errors outside the model path propagate to `analyze_at`.
    fn score(
        &self,
        features: &features::FeatureRecord,
    ) -> Result<(RiskAssessment, AnalysisMethod)> {
        let Some(model) = &self.model else {
            return Ok((RuleBasedScorer::assess(features), AnalysisMethod::RuleBased));
        };

        match model.predict(features) {
            Ok(assessment) => Ok((assessment, model.method())),
            Err(e) if e.is_model_path() => {
                tracing::warn!("Model prediction failed, falling back to rules: {}", e);
                Ok((RuleBasedScorer::assess(features), AnalysisMethod::RuleBasedFallback))
            }
            Err(e) => Err(e),
        }
    }

    fn degraded_response(&self, error: &SafetyError) -> AnalysisResponse {
        AnalysisResponse {
            risk_level: DEGRADED_RISK_LEVEL,
            confidence: DEGRADED_CONFIDENCE,
            recommendations: vec![outcome::DEGRADED_RECOMMENDATION.into()],
            risk_factors: vec![outcome::ANALYSIS_ERROR_FACTOR.into()],
            timestamp: Utc::now(),
            model_version: self.config.model_version.clone(),
            analysis_details: Some(AnalysisDetails {
                error: Some(error.to_string()),
                ..Default::default()
            }),
        }
    }

    /// Queue behavioral data for background learning
    pub fn learn_pattern(&self, user_id: &str, data: serde_json::Value) -> Uuid {
        let job_id = self.learner.submit(user_id, data);
        tracing::info!(user_id, %job_id, "pattern learning queued");
        job_id
    }

    /// Background learning queue
    pub fn learner(&self) -> &PatternLearner {
        &self.learner
    }

    /// Model status snapshot
    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            model_name: MODEL_NAME.into(),
            version: self.config.model_version.clone(),
            status: if self.initialized { "operational" } else { "initializing" }.into(),
            last_trained: self.model.as_ref().and_then(|m| m.classifier().trained_at()),
            accuracy: self.model.as_ref().map(|_| metrics::PLACEHOLDER_ACCURACY),
            total_predictions: self.metrics.total_predictions(),
        }
    }

    /// Performance metrics snapshot
    pub fn metrics(&self) -> PerformanceMetrics {
        let snapshot = self.metrics.snapshot();
        PerformanceMetrics {
            accuracy: metrics::PLACEHOLDER_ACCURACY,
            precision: metrics::PLACEHOLDER_PRECISION,
            recall: metrics::PLACEHOLDER_RECALL,
            f1_score: metrics::PLACEHOLDER_F1,
            total_predictions: snapshot.total_predictions,
            avg_response_time: snapshot.avg_response_time(),
            last_updated: Utc::now(),
        }
    }

    /// True when scoring goes through the trained model
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}
