//! Physical-plausibility scoring of GPS fixes.
//!
//! Each new fix is compared against the last accepted one. Every rule is
//! evaluated independently and penalties stack; the score starts at 100 and
//! is clamped into [0, 100] after each subtraction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{TrackedPoint, MAX_TRUST};

/// Violated plausibility rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    LowAccuracy,
    PastTimestamp,
    FutureTimestamp,
    LargeTimeGap,
    SpeedMismatch,
    HighReportedSpeed,
    HighInferredSpeed,
    HighReportedAcceleration,
    HighInferredAcceleration,
    RapidAltitudeChange,
}

impl Issue {
    /// Points subtracted from the trust score when the rule fires.
    pub fn penalty(self) -> u8 {
        match self {
            Issue::LowAccuracy => 50,
            Issue::PastTimestamp | Issue::FutureTimestamp => 30,
            Issue::LargeTimeGap => 20,
            Issue::SpeedMismatch => 10,
            Issue::HighReportedSpeed | Issue::HighInferredSpeed => 20,
            Issue::HighReportedAcceleration | Issue::HighInferredAcceleration => 30,
            Issue::RapidAltitudeChange => 10,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Issue::LowAccuracy => "low_accuracy",
            Issue::PastTimestamp => "past_timestamp",
            Issue::FutureTimestamp => "future_timestamp",
            Issue::LargeTimeGap => "large_time_gap",
            Issue::SpeedMismatch => "speed_mismatch",
            Issue::HighReportedSpeed => "high_reported_speed",
            Issue::HighInferredSpeed => "high_inferred_speed",
            Issue::HighReportedAcceleration => "high_reported_acceleration",
            Issue::HighInferredAcceleration => "high_inferred_acceleration",
            Issue::RapidAltitudeChange => "rapid_altitude_change",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Rule thresholds. Defaults are the production values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Horizontal accuracy above this is untrusted [m]
    pub max_accuracy_m: f64,
    /// Allowed clock skew into the future [ms]
    pub future_tolerance_ms: i64,
    /// Longest tolerated gap between fixes [s]
    pub max_gap_s: f64,
    /// Largest tolerated |inferred - reported| speed [m/s]
    pub max_speed_mismatch_ms: f64,
    /// ~97 km/h, well beyond walking or cycling [m/s]
    pub max_speed_ms: f64,
    /// [m/s²]
    pub max_acceleration_ms2: f64,
    /// [m/s]
    pub max_vertical_rate_ms: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_accuracy_m: 30.0,
            future_tolerance_ms: 60_000,
            max_gap_s: 30.0 * 60.0,
            max_speed_mismatch_ms: 10.0,
            max_speed_ms: 27.0,
            max_acceleration_ms2: 10.0,
            max_vertical_rate_ms: 100.0,
        }
    }
}

/// Outcome of scoring one fix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assessment {
    pub score: u8,
    pub issues: Vec<Issue>,
}

impl Assessment {
    pub fn trusted() -> Self {
        Self {
            score: MAX_TRUST,
            issues: Vec::new(),
        }
    }

    fn penalize(&mut self, issue: Issue) {
        self.score = self.score.saturating_sub(issue.penalty()).min(MAX_TRUST);
        self.issues.push(issue);
    }

    pub fn is_trusted(&self) -> bool {
        self.score == MAX_TRUST
    }
}

/// Rate of change `delta / elapsed_s`, or 0 when no time has passed.
pub fn rate_of_change(delta: f64, elapsed_s: f64) -> f64 {
    if elapsed_s > 0.0 {
        delta / elapsed_s
    } else {
        0.0
    }
}

/// Speed implied by covering `distance_m` in `elapsed_s`.
///
/// A non-zero distance covered in zero or negative time is infinitely fast,
/// so the speed rules reject it instead of dividing by zero.
pub fn inferred_speed(distance_m: f64, elapsed_s: f64) -> f64 {
    if elapsed_s > 0.0 {
        distance_m / elapsed_s
    } else if distance_m > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct QualityScorer {
    thresholds: QualityThresholds,
}

impl QualityScorer {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Score `point` against `previous`.
    ///
    /// `point.distance` and `point.inferred_speed` must already hold the raw
    /// values relative to `previous`. With no previous point the fix is the
    /// trip anchor and is trusted unconditionally.
    pub fn assess(
        &self,
        previous: Option<&TrackedPoint>,
        point: &TrackedPoint,
        elapsed_s: f64,
        now_ms: i64,
    ) -> Assessment {
        let mut assessment = Assessment::trusted();
        let Some(prev) = previous else {
            return assessment;
        };
        let t = &self.thresholds;

        if point.accuracy > t.max_accuracy_m {
            assessment.penalize(Issue::LowAccuracy);
        }
        if point.timestamp_ms < prev.timestamp_ms {
            assessment.penalize(Issue::PastTimestamp);
        }
        if point.timestamp_ms > now_ms.saturating_add(t.future_tolerance_ms) {
            assessment.penalize(Issue::FutureTimestamp);
        }
        if elapsed_s > t.max_gap_s {
            assessment.penalize(Issue::LargeTimeGap);
        }
        if (point.inferred_speed - point.speed).abs() > t.max_speed_mismatch_ms {
            assessment.penalize(Issue::SpeedMismatch);
        }
        if point.speed > t.max_speed_ms {
            assessment.penalize(Issue::HighReportedSpeed);
        }
        if point.inferred_speed > t.max_speed_ms {
            assessment.penalize(Issue::HighInferredSpeed);
        }

        let reported_accel = rate_of_change((point.speed - prev.speed).abs(), elapsed_s);
        if reported_accel > t.max_acceleration_ms2 {
            assessment.penalize(Issue::HighReportedAcceleration);
        }
        let inferred_accel =
            rate_of_change((point.inferred_speed - prev.inferred_speed).abs(), elapsed_s);
        if inferred_accel > t.max_acceleration_ms2 {
            assessment.penalize(Issue::HighInferredAcceleration);
        }

        if point.has_altitude() && prev.has_altitude() {
            let vertical_rate = rate_of_change((point.altitude - prev.altitude).abs(), elapsed_s);
            if vertical_rate > t.max_vertical_rate_ms {
                assessment.penalize(Issue::RapidAltitudeChange);
            }
        }

        assessment
    }
}
