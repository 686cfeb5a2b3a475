//! Constant-velocity Kalman smoother over raw (lat, lng).
//!
//! State Vector (4D):
//! [0-1]: Position (lat, lng) [deg]
//! [2-3]: Velocity (v_lat, v_lng) [deg / step]
//!
//! Observation (2D): position only. The step length is a fixed nominal unit
//! unless `Timestep::Elapsed` is configured.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::types::{KalmanGain, ObsMat2, ObsModel, ObsVec2, StateMat4, StateVec4};

/// Length of one prediction step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timestep {
    /// Always 1 unit, regardless of the real interval between fixes
    #[default]
    Nominal,
    /// Real seconds elapsed since the previous correction
    Elapsed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherParams {
    /// Observation noise variance per axis [deg²]
    pub observation_noise: f64,
    /// Process noise on position [deg²]
    pub position_process_noise: f64,
    /// Process noise on velocity [(deg/step)²]
    pub velocity_process_noise: f64,
    /// Velocity variance right after initialization [(deg/step)²]
    pub initial_velocity_variance: f64,
    pub timestep: Timestep,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            observation_noise: 1e-4,
            position_process_noise: 1e-5,
            velocity_process_noise: 5e-5,
            initial_velocity_variance: 1.0,
            timestep: Timestep::Nominal,
        }
    }
}

/// Last corrected estimate.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterState {
    pub mean: StateVec4,
    pub covariance: StateMat4,
}

impl FilterState {
    pub fn position(&self) -> (f64, f64) {
        (self.mean[0], self.mean[1])
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.mean[2], self.mean[3])
    }

    fn ensure_finite(self, what: &str) -> Result<Self> {
        let finite = self.mean.iter().all(|v| v.is_finite())
            && self.covariance.iter().all(|v| v.is_finite());
        if finite {
            Ok(self)
        } else {
            Err(TrackerError::NonFinite(what.to_string()))
        }
    }
}

pub struct PositionSmoother {
    params: SmootherParams,
    state: Option<FilterState>,
    corrections: u64,
}

impl PositionSmoother {
    pub fn new(params: SmootherParams) -> Self {
        Self {
            params,
            state: None,
            corrections: 0,
        }
    }

    pub fn params(&self) -> &SmootherParams {
        &self.params
    }

    pub fn state(&self) -> Option<&FilterState> {
        self.state.as_ref()
    }

    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// Forget the running estimate; the next observation re-initializes.
    pub fn reset(&mut self) {
        self.state = None;
        self.corrections = 0;
    }

    /// Fold one observation into the filter and return the smoothed position.
    ///
    /// `elapsed_s` is only used with `Timestep::Elapsed`. On error the stored
    /// state is left untouched.
    pub fn correct(&mut self, lat: f64, lng: f64, elapsed_s: f64) -> Result<(f64, f64)> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(TrackerError::NonFinite("observation".to_string()));
        }
        let observation = ObsVec2::new(lat, lng);

        let corrected = match self.state.as_ref() {
            None => self.initialize(&observation)?,
            Some(previous) => {
                let predicted = self.predict(previous, self.step_length(elapsed_s));
                self.update(&predicted, &observation)?
            }
        };

        let position = corrected.position();
        self.state = Some(corrected);
        self.corrections += 1;
        Ok(position)
    }

    fn step_length(&self, elapsed_s: f64) -> f64 {
        match self.params.timestep {
            Timestep::Nominal => 1.0,
            // A repeated or out-of-order fix predicts nothing forward
            Timestep::Elapsed => elapsed_s.max(0.0),
        }
    }

    /// First fix: take the observation as the mean, velocity unknown.
    fn initialize(&self, observation: &ObsVec2) -> Result<FilterState> {
        let r = self.params.observation_noise;
        let v0 = self.params.initial_velocity_variance;
        FilterState {
            mean: StateVec4::new(observation[0], observation[1], 0.0, 0.0),
            covariance: StateMat4::from_diagonal(&StateVec4::new(r, r, v0, v0)),
        }
        .ensure_finite("initial state")
    }

    /// x' = F x,  P' = F P Fᵀ + Q
    fn predict(&self, previous: &FilterState, dt: f64) -> FilterState {
        let f = Self::transition(dt);
        FilterState {
            mean: f * previous.mean,
            covariance: f * previous.covariance * f.transpose() + self.process_noise(),
        }
    }

    fn update(&self, predicted: &FilterState, observation: &ObsVec2) -> Result<FilterState> {
        let h = Self::observation_model();
        let r = self.observation_noise();
        let p = &predicted.covariance;

        let innovation = observation - h * predicted.mean;
        let s = h * p * h.transpose() + r;
        let s_inv = s.try_inverse().ok_or(TrackerError::SingularInnovation)?;
        let k: KalmanGain = p * h.transpose() * s_inv;

        let mean = predicted.mean + k * innovation;

        // Joseph form P = (I-KH) P (I-KH)ᵀ + K R Kᵀ
        let i_minus_kh = StateMat4::identity() - k * h;
        let joseph = i_minus_kh * p * i_minus_kh.transpose() + k * r * k.transpose();
        // Symmetrize to reduce numerical drift
        let covariance = (joseph + joseph.transpose()) * 0.5;

        FilterState { mean, covariance }.ensure_finite("corrected state")
    }

    fn transition(dt: f64) -> StateMat4 {
        let mut f = StateMat4::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        f
    }

    fn observation_model() -> ObsModel {
        let mut h = ObsModel::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h
    }

    fn observation_noise(&self) -> ObsMat2 {
        ObsMat2::from_diagonal_element(self.params.observation_noise)
    }

    fn process_noise(&self) -> StateMat4 {
        let q_pos = self.params.position_process_noise;
        let q_vel = self.params.velocity_process_noise;
        StateMat4::from_diagonal(&StateVec4::new(q_pos, q_pos, q_vel, q_vel))
    }
}

impl Default for PositionSmoother {
    fn default() -> Self {
        Self::new(SmootherParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_first_correction_returns_observation() {
        let mut smoother = PositionSmoother::default();
        let (lat, lng) = smoother.correct(45.0, 7.0, 0.0).unwrap();
        assert_eq!((lat, lng), (45.0, 7.0));

        let state = smoother.state().unwrap();
        assert_eq!(state.velocity(), (0.0, 0.0));
        assert_eq!(state.covariance[(0, 0)], 1e-4);
        assert_eq!(smoother.corrections(), 1);
    }

    #[test]
    fn test_second_correction_tracks_observation() {
        // Uninformative velocity prior: the second fix is followed almost exactly
        let mut smoother = PositionSmoother::default();
        smoother.correct(45.0, 7.0, 0.0).unwrap();
        let (lat, lng) = smoother.correct(45.001, 7.0, 5.0).unwrap();
        assert_relative_eq!(lat, 45.001, max_relative = 1e-6);
        assert_relative_eq!(lng, 7.0, max_relative = 1e-9);

        // ...and the velocity picks up the step
        let (v_lat, _) = smoother.state().unwrap().velocity();
        assert_relative_eq!(v_lat, 0.001, max_relative = 1e-3);
    }

    #[test]
    fn test_outlier_is_pulled_toward_prediction() {
        let mut smoother = PositionSmoother::default();
        for i in 0..20 {
            smoother.correct(45.0 + i as f64 * 1e-4, 7.0, 1.0).unwrap();
        }
        let (predicted_lat, _) = smoother.state().unwrap().position();
        let jump = 0.05;
        let (lat, _) = smoother.correct(predicted_lat + 1e-4 + jump, 7.0, 1.0).unwrap();
        assert!(lat < predicted_lat + 1e-4 + jump);
        assert!(lat > predicted_lat);
    }

    #[test]
    fn test_stationary_observations_stay_put() {
        let mut smoother = PositionSmoother::default();
        for _ in 0..10 {
            let (lat, lng) = smoother.correct(-33.8688, 151.2093, 1.0).unwrap();
            assert_abs_diff_eq!(lat, -33.8688, epsilon = 1e-9);
            assert_abs_diff_eq!(lng, 151.2093, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let mut smoother = PositionSmoother::default();
        for i in 0..15 {
            let wobble = if i % 2 == 0 { 2e-5 } else { -2e-5 };
            smoother.correct(10.0 + i as f64 * 3e-4 + wobble, 20.0, 1.0).unwrap();
        }
        let p = &smoother.state().unwrap().covariance;
        assert_abs_diff_eq!(*p, p.transpose(), epsilon = 1e-15);
        for i in 0..4 {
            assert!(p[(i, i)] > 0.0);
        }
    }

    #[test]
    fn test_non_finite_observation_leaves_state() {
        let mut smoother = PositionSmoother::default();
        smoother.correct(1.0, 2.0, 0.0).unwrap();
        let before = smoother.state().cloned();

        let err = smoother.correct(f64::NAN, 2.0, 1.0).unwrap_err();
        assert!(matches!(err, TrackerError::NonFinite(_)));
        assert_eq!(smoother.state().cloned(), before);
        assert_eq!(smoother.corrections(), 1);
    }

    #[test]
    fn test_non_finite_noise_fails_update() {
        let mut smoother = PositionSmoother::new(SmootherParams {
            observation_noise: f64::NAN,
            ..SmootherParams::default()
        });
        assert!(smoother.correct(1.0, 2.0, 0.0).is_err());
        assert!(smoother.state().is_none());
    }

    #[test]
    fn test_elapsed_timestep_scales_prediction() {
        let params = SmootherParams {
            timestep: Timestep::Elapsed,
            ..SmootherParams::default()
        };
        let mut smoother = PositionSmoother::new(params);
        smoother.correct(0.0, 0.0, 0.0).unwrap();
        smoother.correct(0.001, 0.0, 1.0).unwrap();
        let (v_lat, _) = smoother.state().unwrap().velocity();
        assert!(v_lat > 0.0);

        let predicted = smoother.predict(smoother.state().unwrap(), 3.0);
        assert_relative_eq!(predicted.mean[0], smoother.state().unwrap().mean[0] + 3.0 * v_lat);
    }

    #[test]
    fn test_reset() {
        let mut smoother = PositionSmoother::default();
        smoother.correct(1.0, 1.0, 0.0).unwrap();
        smoother.reset();
        assert!(smoother.state().is_none());
        assert_eq!(smoother.corrections(), 0);
        assert_eq!(smoother.correct(5.0, 6.0, 0.0).unwrap(), (5.0, 6.0));
    }
}
