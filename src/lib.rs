//! GPS trajectory core: scores raw fixes, smooths the trusted ones and
//! accumulates the accepted path with its travelled distance.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod geo_math;
pub mod quality;
pub mod session;
pub mod types;

pub use accumulator::{Outcome, RouteAccumulator};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use export::{GpxTrack, TripSnapshot, TripStats};
pub use filters::{PositionSmoother, SmootherParams, Timestep};
pub use quality::{Assessment, Issue, QualityScorer, QualityThresholds};
pub use session::{TripMetadata, TripSession, TripState};
pub use types::{PathPoint, Sample, TrackedPoint};
