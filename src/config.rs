use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::filters::position_kalman::SmootherParams;
use crate::quality::QualityThresholds;

/// Tunables for one route accumulator.
///
/// Every field has a default, so a config file only needs the values it
/// overrides:
///
/// ```json
/// { "quality": { "max_accuracy_m": 20.0 }, "smoother": { "timestep": "elapsed" } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub quality: QualityThresholds,
    pub smoother: SmootherParams,
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Reject values that would make the filter or the rules meaningless.
    pub fn validate(&self) -> Result<()> {
        let q = &self.quality;
        let thresholds = [
            ("max_accuracy_m", q.max_accuracy_m),
            ("max_gap_s", q.max_gap_s),
            ("max_speed_mismatch_ms", q.max_speed_mismatch_ms),
            ("max_speed_ms", q.max_speed_ms),
            ("max_acceleration_ms2", q.max_acceleration_ms2),
            ("max_vertical_rate_ms", q.max_vertical_rate_ms),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackerError::Config(format!(
                    "quality.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if q.future_tolerance_ms < 0 {
            return Err(TrackerError::Config(
                "quality.future_tolerance_ms must be non-negative".to_string(),
            ));
        }

        let s = &self.smoother;
        let noises = [
            ("observation_noise", s.observation_noise),
            ("position_process_noise", s.position_process_noise),
            ("velocity_process_noise", s.velocity_process_noise),
            ("initial_velocity_variance", s.initial_velocity_variance),
        ];
        for (name, value) in noises {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::Config(format!(
                    "smoother.{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
