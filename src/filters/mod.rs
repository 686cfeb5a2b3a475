pub mod position_kalman;

pub use position_kalman::{FilterState, PositionSmoother, SmootherParams, Timestep};
