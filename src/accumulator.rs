//! Online route accumulation: score, smooth, then accept or reject each fix.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::export::TripSnapshot;
use crate::filters::{FilterState, PositionSmoother};
use crate::geo_math::distance_m;
use crate::quality::{inferred_speed, QualityScorer};
use crate::types::{PathPoint, Sample, TrackedPoint};

/// What happened to a fix passed to [`RouteAccumulator::add_coordinate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// First fix of the trip, accepted without scoring
    Anchored,
    /// Flawless score; on the path and counted in the distance
    Accepted,
    /// Kept in the raw history only
    Rejected,
    /// Second fix failed scoring; the trip now starts from it instead
    Reanchored,
    /// Non-finite position; not scored and not recorded
    Dropped,
}

/// Accepted path, raw audit trail and running distance for one trip.
///
/// One instance per active trip. Calls must not overlap; wrap the
/// accumulator in a lock when samples can arrive concurrently
/// (see [`crate::session::TripSession`]).
pub struct RouteAccumulator {
    scorer: QualityScorer,
    smoother: PositionSmoother,
    last_accepted: Option<TrackedPoint>,
    raw_history: Vec<TrackedPoint>,
    accepted_path: Vec<PathPoint>,
    total_distance: f64,
}

impl RouteAccumulator {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            scorer: QualityScorer::new(config.quality),
            smoother: PositionSmoother::new(config.smoother),
            last_accepted: None,
            raw_history: Vec::new(),
            accepted_path: Vec::new(),
            total_distance: 0.0,
        }
    }

    /// Process one fix against the current wall clock.
    pub fn add_coordinate(&mut self, sample: &Sample) -> Outcome {
        self.add_coordinate_at(sample, Utc::now().timestamp_millis())
    }

    /// Process one fix; `now_ms` is the wall clock used for the
    /// future-timestamp rule.
    pub fn add_coordinate_at(&mut self, sample: &Sample, now_ms: i64) -> Outcome {
        if !sample.has_finite_position() {
            log::warn!(
                "Dropping fix t={} with non-finite position ({}, {}, ±{})",
                sample.timestamp_ms,
                sample.lat,
                sample.lng,
                sample.accuracy_meters
            );
            return Outcome::Dropped;
        }
        let mut point = TrackedPoint::from_sample(sample);

        let Some(prev) = self.last_accepted.as_ref() else {
            log::info!(
                "Trip anchored at ({:.6}, {:.6}) t={}",
                point.lat,
                point.lng,
                point.timestamp_ms
            );
            self.accept(point);
            return Outcome::Anchored;
        };

        let elapsed_s = point.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0;
        point.distance = distance_m(prev.lat, prev.lng, point.lat, point.lng);
        point.inferred_speed = inferred_speed(point.distance, elapsed_s);

        let assessment = self.scorer.assess(Some(prev), &point, elapsed_s, now_ms);
        point.trust_score = assessment.score;
        point.issues = assessment.issues;

        match self.smoother.correct(point.lat, point.lng, elapsed_s) {
            Ok((lat, lng)) => {
                point.lat = lat;
                point.lng = lng;
                point.distance = distance_m(prev.lat, prev.lng, lat, lng);
            }
            Err(e) => {
                log::warn!(
                    "Smoothing skipped for fix t={}, keeping raw position: {}",
                    point.timestamp_ms,
                    e
                );
            }
        }

        if point.is_trusted() {
            log::debug!(
                "Accepted fix t={} (+{:.1} m, {:.1} m/s)",
                point.timestamp_ms,
                point.distance,
                point.inferred_speed
            );
            self.accept(point);
            return Outcome::Accepted;
        }

        if self.raw_history.len() == 1 {
            // A lone anchor contradicted by the next fix is not trusted either
            log::info!(
                "Re-anchoring trip on fix t={} (score {}, issues {:?})",
                point.timestamp_ms,
                point.trust_score,
                point.issues
            );
            // A trip anchor has covered nothing yet
            point.distance = 0.0;
            point.inferred_speed = 0.0;
            self.raw_history.clear();
            self.accepted_path.clear();
            self.total_distance = 0.0;
            self.accept(point);
            return Outcome::Reanchored;
        }

        log::debug!(
            "Rejected fix t={} (score {}, issues {:?})",
            point.timestamp_ms,
            point.trust_score,
            point.issues
        );
        self.raw_history.push(point);
        Outcome::Rejected
    }

    /// Plant a reference fix without scoring, smoothing or counting distance.
    pub fn add_stationary_coordinate(&mut self, sample: &Sample) {
        if !sample.has_finite_position() {
            log::warn!("Ignoring stationary fix t={} with non-finite position", sample.timestamp_ms);
            return;
        }
        let point = TrackedPoint::from_sample(sample);
        log::debug!(
            "Stationary reference at ({:.6}, {:.6}) t={}",
            point.lat,
            point.lng,
            point.timestamp_ms
        );
        self.last_accepted = Some(point);
    }

    /// Empty every collection and the smoother state for a new trip.
    pub fn reset(&mut self) {
        log::info!(
            "Resetting route ({} raw fixes, {} accepted, {:.1} m)",
            self.raw_history.len(),
            self.accepted_path.len(),
            self.total_distance
        );
        self.last_accepted = None;
        self.raw_history.clear();
        self.accepted_path.clear();
        self.total_distance = 0.0;
        self.smoother.reset();
    }

    fn accept(&mut self, point: TrackedPoint) {
        self.total_distance += point.distance;
        self.accepted_path.push(point.to_path_point());
        self.raw_history.push(point.clone());
        self.last_accepted = Some(point);
    }

    pub fn accepted_path(&self) -> &[PathPoint] {
        &self.accepted_path
    }

    pub fn raw_history(&self) -> &[TrackedPoint] {
        &self.raw_history
    }

    /// Sum of the smoothed distances of every accepted fix [m]
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn last_accepted(&self) -> Option<&TrackedPoint> {
        self.last_accepted.as_ref()
    }

    pub fn filter_state(&self) -> Option<&FilterState> {
        self.smoother.state()
    }

    pub fn snapshot(&self) -> TripSnapshot {
        TripSnapshot::capture(self)
    }
}

impl Default for RouteAccumulator {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
