//! Safewatch Risk Analysis Engine
//!
//! Wellbeing risk scoring for people living alone, driven by sparse
//! behavioral signals (app usage, check-in recency, location presence).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SAFETY ANALYZER                                   │
//! │                                                                         │
//! │  ┌──────────────┐                                                       │
//! │  │   Feature    │   request → fixed-shape FeatureRecord                 │
//! │  │  Extractor   │                                                       │
//! │  └──────┬───────┘                                                       │
//! │         │                                                               │
//! │  ┌──────▼──────────────────────────────┐                                │
//! │  │           SCORING                   │                                │
//! │  │  Model (scaler + tree ensemble)     │── model error ┐                │
//! │  │  Rule-based thresholds  ◄───────────┼───────────────┘                │
//! │  └──────┬──────────────────────────────┘                                │
//! │         │                                                               │
//! │  ┌──────▼───────┐  ┌──────────────┐  ┌──────────────┐                  │
//! │  │   Outcome    │  │   Metrics    │  │   Pattern    │                  │
//! │  │   Composer   │  │   Tracker    │  │   Learner    │                  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod analyzer;
pub mod config;
pub mod features;
pub mod learning;
pub mod metrics;
pub mod models;
pub mod outcome;
pub mod schemas;
pub mod scoring;
pub mod server;

use thiserror::Error;

pub use analyzer::SafetyAnalyzer;
pub use config::AnalyzerConfig;
pub use features::FeatureRecord;
pub use models::{Classifier, ForestClassifier, StandardScaler, TrainedModel};
pub use schemas::*;
pub use scoring::{RiskAssessment, RiskScorer, RuleBasedScorer};

/// Safewatch error types
#[derive(Debug, Error)]
pub enum SafetyError {
    /// Classifier or model artifact failure
    #[error("model error: {0}")]
    Model(String),
    /// Model input width differs from the trained width
    #[error("feature shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Width the model was trained on
        expected: usize,
        /// Width supplied
        found: usize,
    },
    /// Scaler or classifier used before fitting
    #[error("model is not fitted")]
    NotFitted,
    /// Non-finite or out-of-range numbers
    #[error("numeric error: {0}")]
    Numeric(String),
    /// Request rejected by validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Sampling distribution could not be built
    #[error("distribution error: {0}")]
    Distribution(String),
    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encode/decode failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SafetyError {
    /// Errors the analyzer recovers from by scoring with the rules instead
    pub fn is_model_path(&self) -> bool {
        matches!(
            self,
            SafetyError::Model(_)
                | SafetyError::ShapeMismatch { .. }
                | SafetyError::NotFitted
                | SafetyError::Numeric(_)
        )
    }
}

/// Crate result alias
pub type Result<T> = std::result::Result<T, SafetyError>;
