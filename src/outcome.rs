//! Recommendations and Risk Factors

use crate::features::FeatureRecord;

/// Emitted when no risk factor applies
pub const NO_RISK_FACTORS: &str = "No notable risk factors";

/// Single factor reported on the degraded path
pub const ANALYSIS_ERROR_FACTOR: &str = "Analysis error";

/// Single recommendation reported on the degraded path
pub const DEGRADED_RECOMMENDATION: &str =
    "The system is being checked. Please try again in a moment.";

const URGENT: &[&str] = &[
    "🚨 Please confirm your safety right away",
    "Consider contacting your emergency contact",
    "Let a nearby neighbor or family member know how you are",
];

const CHECK_IN: &[&str] = &[
    "⚠️ Please complete a regular check-in",
    "Try reaching out to a neighbor",
    "Please update your safety status",
];

const LIGHT: &[&str] = &[
    "📱 Check in periodically",
    "Try joining a community activity",
];

const POSITIVE: &str = "😊 Have a great day!";

const ENGAGEMENT_NUDGE: &str = "📱 Try using the app a little more";
const CHECKIN_FREQUENCY_NUDGE: &str = "⏰ Consider checking in more often";

/// Tiered messages for `risk_level`, followed by feature-triggered nudges
pub fn recommendations(risk_level: f64, features: &FeatureRecord) -> Vec<String> {
    let tier: &[&str] = if risk_level >= 8.0 {
        URGENT
    } else if risk_level >= 5.0 {
        CHECK_IN
    } else if risk_level >= 3.0 {
        LIGHT
    } else {
        &[POSITIVE]
    };

    let mut out: Vec<String> = tier.iter().map(|s| s.to_string()).collect();

    if features.screen_time < 60.0 {
        out.push(ENGAGEMENT_NUDGE.into());
    }
    if features.hours_since_checkin > 12.0 {
        out.push(CHECKIN_FREQUENCY_NUDGE.into());
    }

    out
}

/// Named risk factors in signal order; never empty
pub fn risk_factors(features: &FeatureRecord) -> Vec<String> {
    let checks = [
        (features.screen_time < 30.0, "Low app usage"),
        (features.app_open_count < 5.0, "Infrequent app launches"),
        (features.hours_since_checkin > 24.0, "Long gap since last check-in"),
        (features.hours_since_activity > 6.0, "No recent activity"),
    ];

    let factors: Vec<String> = checks
        .iter()
        .filter(|(fired, _)| *fired)
        .map(|(_, name)| name.to_string())
        .collect();

    if factors.is_empty() {
        vec![NO_RISK_FACTORS.into()]
    } else {
        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_recommendation_tiers() {
        let quiet = features(120.0, 15.0, 0.0, 1.0);

        assert_eq!(recommendations(9.0, &quiet).len(), 3);
        assert!(recommendations(8.0, &quiet)[0].contains("safety"));
        assert_eq!(recommendations(6.67, &quiet)[0], CHECK_IN[0]);
        assert_eq!(recommendations(3.33, &quiet), LIGHT.to_vec());
        assert_eq!(recommendations(1.0, &quiet), vec![POSITIVE.to_string()]);
    }

    #[test]
    fn test_nudges_are_additive() {
        let recs = recommendations(8.0, &features(40.0, 15.0, 0.0, 13.0));
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[3], ENGAGEMENT_NUDGE);
        assert_eq!(recs[4], CHECKIN_FREQUENCY_NUDGE);

        let recs = recommendations(0.0, &features(40.0, 15.0, 0.0, 12.0));
        assert_eq!(recs, vec![POSITIVE.to_string(), ENGAGEMENT_NUDGE.to_string()]);
    }

    #[test]
    fn test_risk_factor_order() {
        let factors = risk_factors(&features(10.0, 1.0, 7.0, 30.0));
        assert_eq!(
            factors,
            vec![
                "Low app usage",
                "Infrequent app launches",
                "Long gap since last check-in",
                "No recent activity",
            ]
        );

        assert_eq!(risk_factors(&features(120.0, 15.0, 7.0, 1.0)), vec!["No recent activity"]);
    }

    #[test]
    fn test_sentinel_at_boundaries() {
        // every comparison is strict, so the exact thresholds do not fire
        let factors = risk_factors(&features(30.0, 5.0, 6.0, 24.0));
        assert_eq!(factors, vec![NO_RISK_FACTORS]);
    }

    proptest! {
        #[test]
        fn prop_factors_never_empty(
            s in 0.0..300.0f64, o in 0.0..30.0f64, a in 0.0..48.0f64, c in 0.0..96.0f64
        ) {
            let f = features(s, o, a, c);
            let factors = risk_factors(&f);
            prop_assert!(!factors.is_empty());

            let any_fired = s < 30.0 || o < 5.0 || c > 24.0 || a > 6.0;
            prop_assert_eq!(factors == vec![NO_RISK_FACTORS.to_string()], !any_fired);
        }
    }
}
