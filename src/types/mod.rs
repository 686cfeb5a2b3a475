pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

use crate::quality::Issue;

/// Sentinel for an unknown altitude or heading.
pub const UNKNOWN: f64 = -1.0;

/// Maximum trust score; anything lower keeps a point off the accepted path.
pub const MAX_TRUST: u8 = 100;

/// One raw GPS fix as delivered by the location source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub lat: f64,
    pub lng: f64,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    pub accuracy_meters: f64,
}

impl Sample {
    pub fn new(lat: f64, lng: f64, timestamp_ms: i64, accuracy_meters: f64) -> Self {
        Self {
            lat,
            lng,
            timestamp_ms,
            speed: None,
            altitude: None,
            heading: None,
            accuracy_meters,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Coordinates and accuracy are all finite numbers.
    pub fn has_finite_position(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && self.accuracy_meters.is_finite()
    }
}

/// A scored (and possibly smoothed) record derived from a [`Sample`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp_ms: i64,
    /// Reported speed [m/s], 0 when unknown
    pub speed: f64,
    /// Altitude [m], [`UNKNOWN`] when not reported
    pub altitude: f64,
    /// Heading [deg], [`UNKNOWN`] when not reported
    pub heading: f64,
    /// Horizontal accuracy [m]
    pub accuracy: f64,
    /// Distance from the previous accepted point [m]
    pub distance: f64,
    /// distance / Δt [m/s]
    pub inferred_speed: f64,
    pub trust_score: u8,
    pub issues: Vec<Issue>,
}

impl TrackedPoint {
    /// Build an unscored point, defaulting missing optional fields.
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            lat: sample.lat,
            lng: sample.lng,
            timestamp_ms: sample.timestamp_ms,
            speed: sample.speed.unwrap_or(0.0),
            altitude: sample.altitude.unwrap_or(UNKNOWN),
            heading: sample.heading.unwrap_or(UNKNOWN),
            accuracy: sample.accuracy_meters,
            distance: 0.0,
            inferred_speed: 0.0,
            trust_score: MAX_TRUST,
            issues: Vec::new(),
        }
    }

    pub fn has_altitude(&self) -> bool {
        self.altitude != UNKNOWN
    }

    pub fn is_trusted(&self) -> bool {
        self.trust_score == MAX_TRUST
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed * 3.6
    }

    pub fn to_path_point(&self) -> PathPoint {
        PathPoint(
            self.lat,
            self.lng,
            self.speed_kmh(),
            self.altitude,
            self.timestamp_ms,
        )
    }
}

/// Accepted-path entry: `[lat, lng, speedKmh, altitude, timestampMs]`.
///
/// Serializes as a 5-element array, which is the shape the upload side expects.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathPoint(pub f64, pub f64, pub f64, pub f64, pub i64);

impl PathPoint {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lng(&self) -> f64 {
        self.1
    }

    pub fn speed_kmh(&self) -> f64 {
        self.2
    }

    pub fn altitude(&self) -> f64 {
        self.3
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_defaulted() {
        let point = TrackedPoint::from_sample(&Sample::new(10.0, 20.0, 1_000, 5.0));
        assert_eq!(point.speed, 0.0);
        assert_eq!(point.altitude, UNKNOWN);
        assert_eq!(point.heading, UNKNOWN);
        assert_eq!(point.trust_score, MAX_TRUST);
        assert!(point.issues.is_empty());
        assert!(!point.has_altitude());
    }

    #[test]
    fn test_finite_position() {
        assert!(Sample::new(10.0, 20.0, 0, 5.0).has_finite_position());
        assert!(!Sample::new(f64::NAN, 20.0, 0, 5.0).has_finite_position());
        assert!(!Sample::new(10.0, f64::NEG_INFINITY, 0, 5.0).has_finite_position());
        assert!(!Sample::new(10.0, 20.0, 0, f64::NAN).has_finite_position());
    }

    #[test]
    fn test_sample_json_optional_fields() {
        let json = r#"{"lat": 1.5, "lng": 2.5, "timestampMs": 42, "accuracyMeters": 8.0}"#;
        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.timestamp_ms, 42);
        assert_eq!(sample.speed, None);

        let json = r#"{"lat": 1.5, "lng": 2.5, "timestampMs": 42, "speed": 3.0,
                       "altitude": 120.0, "accuracyMeters": 8.0}"#;
        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.speed, Some(3.0));
        assert_eq!(sample.altitude, Some(120.0));
    }

    #[test]
    fn test_path_point_serializes_as_array() {
        let point = TrackedPoint::from_sample(
            &Sample::new(1.0, 2.0, 3_000, 5.0)
                .with_speed(10.0)
                .with_altitude(50.0),
        );
        let path_point = point.to_path_point();
        assert_eq!(path_point.speed_kmh(), 36.0);

        let json = serde_json::to_string(&path_point).unwrap();
        assert_eq!(json, "[1.0,2.0,36.0,50.0,3000]");
    }
}
