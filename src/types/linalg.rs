//! Linear algebra type system for the position smoother
//!
//! Compile-time dimension checking for the constant-velocity Kalman filter:
//! state (lat, lng, v_lat, v_lng), observation (lat, lng).

use nalgebra::{SMatrix, SVector};

// ===== Dimensions =====
pub const STATE_DIM: usize = 4;
pub const OBS_DIM: usize = 2;

// ===== State =====
pub type StateVec4 = SVector<f64, STATE_DIM>;
pub type StateMat4 = SMatrix<f64, STATE_DIM, STATE_DIM>;

// ===== Observation =====
pub type ObsVec2 = SVector<f64, OBS_DIM>;
pub type ObsMat2 = SMatrix<f64, OBS_DIM, OBS_DIM>;

// Observation model H (2×4) and Kalman gain K (4×2)
pub type ObsModel = SMatrix<f64, OBS_DIM, STATE_DIM>;
pub type KalmanGain = SMatrix<f64, STATE_DIM, OBS_DIM>;
