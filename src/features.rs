//! Feature Extraction

use crate::schemas::AnalysisRequest;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Check-in age assumed when no usable check-in timestamp is supplied
pub const DEFAULT_HOURS_SINCE_CHECKIN: f64 = 24.0;

/// Activity age used when app usage is absent or its timestamp is malformed.
/// This is 0 rather than the 24 hours assumed for check-ins.
pub const DEFAULT_HOURS_SINCE_ACTIVITY: f64 = 0.0;

/// Width of the model input vector
pub const MODEL_FEATURE_COUNT: usize = 4;

/// Fixed-shape numeric summary of a request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Screen time (minutes)
    pub screen_time: f64,
    /// App launches
    pub app_open_count: f64,
    /// Hours since the last app activity
    pub hours_since_activity: f64,
    /// Hours since the last check-in
    pub hours_since_checkin: f64,
    /// 1.0 when a location fix was supplied
    pub has_location: f64,
    /// Always 0.0 until location history exists
    pub location_changes: f64,
}

impl FeatureRecord {
    /// Model input vector: screen time, app opens, check-in age, location changes
    pub fn to_model_vector(&self) -> [f64; MODEL_FEATURE_COUNT] {
        [
            self.screen_time,
            self.app_open_count,
            self.hours_since_checkin,
            self.location_changes,
        ]
    }
}

/// Partially populated record, completed by [`PartialFeatures::fill_defaults`]
#[derive(Debug, Default)]
struct PartialFeatures {
    screen_time: Option<f64>,
    app_open_count: Option<f64>,
    hours_since_activity: Option<f64>,
    hours_since_checkin: Option<f64>,
    has_location: Option<f64>,
    location_changes: Option<f64>,
}

impl PartialFeatures {
    fn fill_defaults(self) -> FeatureRecord {
        FeatureRecord {
            screen_time: self.screen_time.unwrap_or(0.0),
            app_open_count: self.app_open_count.unwrap_or(0.0),
            hours_since_activity: self.hours_since_activity.unwrap_or(DEFAULT_HOURS_SINCE_ACTIVITY),
            hours_since_checkin: self.hours_since_checkin.unwrap_or(DEFAULT_HOURS_SINCE_CHECKIN),
            has_location: self.has_location.unwrap_or(0.0),
            location_changes: self.location_changes.unwrap_or(0.0),
        }
    }
}

/// Extract features relative to `now`. Never fails.
pub fn extract(request: &AnalysisRequest, now: DateTime<Utc>) -> FeatureRecord {
    let mut partial = PartialFeatures::default();

    if let Some(usage) = &request.app_usage {
        partial.screen_time = Some(usage.screen_time as f64);
        partial.app_open_count = Some(usage.app_open_count as f64);
        partial.hours_since_activity = Some(
            hours_since(&usage.last_activity, now).unwrap_or(DEFAULT_HOURS_SINCE_ACTIVITY),
        );
    }

    partial.hours_since_checkin = request
        .last_checkin
        .as_deref()
        .and_then(|ts| hours_since(ts, now));

    partial.has_location = Some(if request.location.is_some() { 1.0 } else { 0.0 });
    partial.location_changes = Some(0.0);

    let features = partial.fill_defaults();
    tracing::debug!(user_id = %request.user_id, ?features, "features extracted");
    features
}

/// Hours elapsed between `timestamp` and `now`; `None` if unparseable
pub fn hours_since(timestamp: &str, now: DateTime<Utc>) -> Option<f64> {
    let then = parse_timestamp(timestamp)?;
    Some((now - then).num_milliseconds() as f64 / 3_600_000.0)
}

/// Parse RFC 3339, or a naive ISO-8601 date-time read as UTC
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{AppUsageData, LocationData};
    use chrono::Duration;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn request(
        app_usage: Option<AppUsageData>,
        location: bool,
        last_checkin: Option<String>,
    ) -> AnalysisRequest {
        AnalysisRequest {
            user_id: "user-1".into(),
            app_usage,
            location: location.then(|| LocationData {
                latitude: 37.5665,
                longitude: 126.9780,
                accuracy: 10.0,
                timestamp: now().to_rfc3339(),
            }),
            last_checkin,
            additional_data: None,
        }
    }

    fn usage(screen_time: u32, app_open_count: u32, last_activity: String) -> AppUsageData {
        AppUsageData {
            screen_time,
            app_open_count,
            last_activity,
        }
    }

    #[test]
    fn test_full_request() {
        let req = request(
            Some(usage(95, 12, (now() - Duration::hours(3)).to_rfc3339())),
            true,
            Some((now() - Duration::minutes(90)).to_rfc3339()),
        );
        let f = extract(&req, now());

        assert_eq!(f.screen_time, 95.0);
        assert_eq!(f.app_open_count, 12.0);
        assert!((f.hours_since_activity - 3.0).abs() < 1e-9);
        assert!((f.hours_since_checkin - 1.5).abs() < 1e-9);
        assert_eq!(f.has_location, 1.0);
        assert_eq!(f.location_changes, 0.0);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let f = extract(&request(None, false, None), now());

        assert_eq!(f.screen_time, 0.0);
        assert_eq!(f.app_open_count, 0.0);
        assert_eq!(f.hours_since_activity, 0.0);
        assert_eq!(f.hours_since_checkin, 24.0);
        assert_eq!(f.has_location, 0.0);
    }

    #[test]
    fn test_malformed_timestamps() {
        let req = request(
            Some(usage(10, 1, "yesterday-ish".into())),
            false,
            Some("not a date".into()),
        );
        let f = extract(&req, now());

        assert_eq!(f.hours_since_activity, 0.0);
        assert_eq!(f.hours_since_checkin, 24.0);
        assert_eq!(f.screen_time, 10.0);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T02:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T11:00:00+09:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T02:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T02:00:00.250"), Some(expected + Duration::milliseconds(250)));
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_model_vector_order() {
        let f = FeatureRecord {
            screen_time: 1.0,
            app_open_count: 2.0,
            hours_since_activity: 9.0,
            hours_since_checkin: 3.0,
            has_location: 1.0,
            location_changes: 4.0,
        };
        assert_eq!(f.to_model_vector(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_record_serializes_every_key() {
        let value = serde_json::to_value(extract(&request(None, false, None), now())).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        for key in [
            "screen_time",
            "app_open_count",
            "hours_since_activity",
            "hours_since_checkin",
            "has_location",
            "location_changes",
        ] {
            assert!(keys.iter().any(|k| k == key), "missing {key}");
        }
    }

    proptest! {
        #[test]
        fn prop_extract_is_total(
            screen in proptest::option::of(0u32..2000),
            activity in proptest::option::of(".{0,40}"),
            checkin in proptest::option::of(".{0,40}"),
            located in any::<bool>(),
        ) {
            let app_usage = screen.map(|s| usage(s, s / 10, activity.clone().unwrap_or_default()));
            let f = extract(&request(app_usage, located, checkin), now());

            prop_assert!(f.screen_time.is_finite());
            prop_assert!(f.app_open_count.is_finite());
            prop_assert!(f.hours_since_activity.is_finite());
            prop_assert!(f.hours_since_checkin.is_finite());
            prop_assert!(f.has_location == 0.0 || f.has_location == 1.0);
            prop_assert_eq!(f.location_changes, 0.0);
        }
    }
}
