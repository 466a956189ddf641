//! Risk Scoring Strategies
//!
//! Both strategies implement [`RiskScorer`]. The rule-based scorer never
//! fails; the model scorer returns typed errors and leaves the fallback
//! decision to the analyzer.

use crate::{
    features::FeatureRecord,
    models::{TrainedModel, NUM_CLASSES},
    schemas::AnalysisMethod,
    Result, SafetyError,
};
use ndarray::Array2;

/// Upper bound of the risk scale
pub const MAX_RISK_LEVEL: f64 = 10.0;

/// Fixed confidence of the threshold rules
pub const RULE_CONFIDENCE: f64 = 0.8;

/// Risk level and confidence from one strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    /// 0.0 - 10.0
    pub risk_level: f64,
    /// 0.0 - 1.0
    pub confidence: f64,
}

impl RiskAssessment {
    /// Integer level reported to callers (truncated)
    pub fn level(&self) -> u8 {
        self.risk_level.clamp(0.0, MAX_RISK_LEVEL) as u8
    }
}

/// Scoring strategy
pub trait RiskScorer {
    /// Method reported in the response details
    fn method(&self) -> AnalysisMethod;
    /// Score one feature record
    fn predict(&self, features: &FeatureRecord) -> Result<RiskAssessment>;
}

/// Deterministic threshold scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl RuleBasedScorer {
    /// Additive threshold score, clamped to 10
    pub fn score(features: &FeatureRecord) -> u32 {
        let mut risk_score = 0;

        // Screen time (minutes)
        if features.screen_time < 30.0 {
            risk_score += 2;
        } else if features.screen_time < 60.0 {
            risk_score += 1;
        }

        if features.app_open_count < 3.0 {
            risk_score += 2;
        } else if features.app_open_count < 8.0 {
            risk_score += 1;
        }

        let checkin = features.hours_since_checkin;
        if checkin > 48.0 {
            risk_score += 4;
        } else if checkin > 24.0 {
            risk_score += 3;
        } else if checkin > 12.0 {
            risk_score += 1;
        }

        if features.hours_since_activity > 6.0 {
            risk_score += 1;
        }

        risk_score.min(MAX_RISK_LEVEL as u32)
    }

    /// Rule score with the fixed rule confidence
    pub fn assess(features: &FeatureRecord) -> RiskAssessment {
        RiskAssessment {
            risk_level: Self::score(features) as f64,
            confidence: RULE_CONFIDENCE,
        }
    }
}

impl RiskScorer for RuleBasedScorer {
    fn method(&self) -> AnalysisMethod {
        AnalysisMethod::RuleBased
    }

    fn predict(&self, features: &FeatureRecord) -> Result<RiskAssessment> {
        Ok(Self::assess(features))
    }
}

impl RiskScorer for TrainedModel {
    fn method(&self) -> AnalysisMethod {
        AnalysisMethod::Model
    }

    fn predict(&self, features: &FeatureRecord) -> Result<RiskAssessment> {
        let vector = features.to_model_vector();
        let records = Array2::from_shape_vec((1, vector.len()), vector.to_vec())
            .map_err(|e| SafetyError::Model(e.to_string()))?;

        let expected = self.classifier().n_features();
        if expected != records.ncols() {
            return Err(SafetyError::ShapeMismatch {
                expected,
                found: records.ncols(),
            });
        }

        let scaled = self.scaler().transform(&records)?;
        let class = self
            .classifier()
            .predict(&scaled)?
            .get(0)
            .copied()
            .ok_or_else(|| SafetyError::Model("classifier returned no prediction".into()))?;
        let probabilities = self.classifier().predict_proba(&scaled)?;

        let row = probabilities
            .rows()
            .into_iter()
            .next()
            .filter(|row| !row.is_empty())
            .ok_or_else(|| SafetyError::Model("empty probability vector".into()))?;
        if row.iter().any(|p| !p.is_finite()) {
            return Err(SafetyError::Numeric("non-finite class probability".into()));
        }
        let confidence = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(SafetyError::Numeric(format!("invalid class probability {}", confidence)));
        }
        if class >= NUM_CLASSES {
            tracing::debug!(class, "classifier returned class outside the known range");
        }

        let risk_level = (class as f64 * MAX_RISK_LEVEL / NUM_CLASSES as f64).min(MAX_RISK_LEVEL);

        Ok(RiskAssessment {
            risk_level,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classifier, StandardScaler};
    use ndarray::Array1;
    use proptest::prelude::*;

    fn features(screen: f64, opens: f64, activity: f64, checkin: f64) -> FeatureRecord {
        FeatureRecord {
            screen_time: screen,
            app_open_count: opens,
            hours_since_activity: activity,
            hours_since_checkin: checkin,
            has_location: 0.0,
            location_changes: 0.0,
        }
    }

    /// Always answers with a fixed probability row
    struct FixedClassifier(Vec<f64>);

    impl Classifier for FixedClassifier {
        fn n_features(&self) -> usize {
            4
        }

        fn predict_proba(&self, records: &Array2<f64>) -> Result<Array2<f64>> {
            let mut out = Array2::zeros((records.nrows(), self.0.len()));
            for mut row in out.rows_mut() {
                row.assign(&Array1::from(self.0.clone()));
            }
            Ok(out)
        }
    }

    fn model(proba: Vec<f64>) -> TrainedModel {
        TrainedModel::new(
            Box::new(FixedClassifier(proba)),
            StandardScaler::new(vec![0.0; 4], vec![1.0; 4]).unwrap(),
        )
    }

    #[test]
    fn test_rule_thresholds() {
        assert_eq!(RuleBasedScorer::score(&features(120.0, 15.0, 0.0, 5.0)), 0);
        assert_eq!(RuleBasedScorer::score(&features(29.0, 15.0, 0.0, 5.0)), 2);
        assert_eq!(RuleBasedScorer::score(&features(30.0, 15.0, 0.0, 5.0)), 1);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 2.0, 0.0, 5.0)), 2);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 7.0, 0.0, 5.0)), 1);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 15.0, 0.0, 49.0)), 4);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 15.0, 0.0, 48.0)), 3);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 15.0, 0.0, 24.0)), 1);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 15.0, 0.0, 12.0)), 0);
        assert_eq!(RuleBasedScorer::score(&features(120.0, 15.0, 6.5, 5.0)), 1);
        assert_eq!(RuleBasedScorer::score(&features(0.0, 0.0, 100.0, 100.0)), 9);
    }

    #[test]
    fn test_rule_scorer_trait() {
        let a = RuleBasedScorer.predict(&features(10.0, 1.0, 0.0, 50.0)).unwrap();
        assert_eq!(a.risk_level, 8.0);
        assert_eq!(a.confidence, RULE_CONFIDENCE);
        assert_eq!(RuleBasedScorer.method(), AnalysisMethod::RuleBased);
    }

    #[test]
    fn test_model_class_mapping() {
        let f = features(120.0, 15.0, 0.0, 5.0);

        let safe = model(vec![0.9, 0.1, 0.0]).predict(&f).unwrap();
        assert_eq!(safe.risk_level, 0.0);
        assert_eq!(safe.confidence, 0.9);

        let caution = model(vec![0.2, 0.7, 0.1]).predict(&f).unwrap();
        assert_eq!(caution.level(), 3);

        let danger = model(vec![0.1, 0.3, 0.6]).predict(&f).unwrap();
        assert_eq!(danger.level(), 6);
        assert!((danger.risk_level - 20.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_errors() {
        let f = features(120.0, 15.0, 0.0, 5.0);
        assert!(matches!(model(vec![]).predict(&f), Err(SafetyError::Model(_))));
        assert!(matches!(
            model(vec![f64::NAN, 0.2, 0.1]).predict(&f),
            Err(SafetyError::Numeric(_))
        ));

        let narrow = TrainedModel::new(
            Box::new(FixedClassifier(vec![1.0, 0.0, 0.0])),
            StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap(),
        );
        assert!(matches!(narrow.predict(&f), Err(SafetyError::ShapeMismatch { .. })));
    }

    fn arb_features() -> impl Strategy<Value = FeatureRecord> {
        (0.0..600.0f64, 0.0..60.0f64, 0.0..200.0f64, 0.0..200.0f64)
            .prop_map(|(s, o, a, c)| features(s, o, a, c))
    }

    proptest! {
        #[test]
        fn prop_rule_bounds(f in arb_features()) {
            let a = RuleBasedScorer::assess(&f);
            prop_assert!((0.0..=10.0).contains(&a.risk_level));
            prop_assert_eq!(a.confidence, 0.8);
        }

        #[test]
        fn prop_rule_monotonic(f in arb_features(), ds in 0.0..100.0f64, dopen in 0.0..20.0f64, dc in 0.0..100.0f64, da in 0.0..100.0f64) {
            let base = RuleBasedScorer::score(&f);

            let mut more_screen = f;
            more_screen.screen_time += ds;
            prop_assert!(RuleBasedScorer::score(&more_screen) <= base);

            let mut more_opens = f;
            more_opens.app_open_count += dopen;
            prop_assert!(RuleBasedScorer::score(&more_opens) <= base);

            let mut older_checkin = f;
            older_checkin.hours_since_checkin += dc;
            prop_assert!(RuleBasedScorer::score(&older_checkin) >= base);

            let mut older_activity = f;
            older_activity.hours_since_activity += da;
            prop_assert!(RuleBasedScorer::score(&older_activity) >= base);
        }
    }
}
