use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::accumulator::{Outcome, RouteAccumulator};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::export::TripSnapshot;
use crate::types::Sample;

/// Trip state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripState {
    /// No trip in progress
    Idle,
    /// Feeding fixes into the accumulator
    Recording,
    /// Trip open but fixes are ignored
    Paused,
}

/// Trip metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripMetadata {
    pub trip_id: String,
    pub start_time: String,
    pub state: TripState,
    pub samples_seen: u32,
    pub accepted_count: u32,
    pub rejected_count: u32,
    pub peak_speed_ms: f64,
}

impl TripMetadata {
    fn idle() -> Self {
        TripMetadata {
            trip_id: String::new(),
            start_time: String::new(),
            state: TripState::Idle,
            samples_seen: 0,
            accepted_count: 0,
            rejected_count: 0,
            peak_speed_ms: 0.0,
        }
    }
}

/// Owns the accumulator of the active trip.
///
/// Location callbacks may arrive from several threads; every sample goes
/// through the accumulator lock so `add_coordinate` calls never overlap.
#[derive(Clone)]
pub struct TripSession {
    metadata: Arc<Mutex<TripMetadata>>,
    accumulator: Arc<Mutex<RouteAccumulator>>,
}

impl TripSession {
    /// Create new session in Idle state
    pub fn new(config: TrackerConfig) -> Self {
        TripSession {
            metadata: Arc::new(Mutex::new(TripMetadata::idle())),
            accumulator: Arc::new(Mutex::new(RouteAccumulator::new(config))),
        }
    }

    fn lock_metadata(&self) -> Result<MutexGuard<'_, TripMetadata>> {
        self.metadata
            .lock()
            .map_err(|_| TrackerError::Internal("Failed to acquire metadata lock".to_string()))
    }

    fn lock_accumulator(&self) -> Result<MutexGuard<'_, RouteAccumulator>> {
        self.accumulator
            .lock()
            .map_err(|_| TrackerError::Internal("Failed to acquire accumulator lock".to_string()))
    }

    /// Idle → Recording starts a fresh trip; Paused → Recording resumes it.
    pub fn start_trip(&self) -> Result<()> {
        let mut meta = self.lock_metadata()?;

        match meta.state {
            TripState::Idle => {
                self.lock_accumulator()?.reset();
                let now = Utc::now();
                *meta = TripMetadata {
                    trip_id: format!("trip_{}", now.timestamp_millis()),
                    start_time: now.to_rfc3339(),
                    state: TripState::Recording,
                    ..TripMetadata::idle()
                };
                log::info!("Trip {} started", meta.trip_id);
                Ok(())
            }
            TripState::Recording => Err(TrackerError::AlreadyRunning),
            TripState::Paused => {
                meta.state = TripState::Recording;
                log::info!("Trip {} resumed", meta.trip_id);
                Ok(())
            }
        }
    }

    /// Recording → Paused
    pub fn pause_trip(&self) -> Result<()> {
        let mut meta = self.lock_metadata()?;

        match meta.state {
            TripState::Recording => {
                meta.state = TripState::Paused;
                Ok(())
            }
            TripState::Paused => Err(TrackerError::InvalidState("Already paused".to_string())),
            TripState::Idle => Err(TrackerError::InvalidState("Not recording".to_string())),
        }
    }

    /// Recording | Paused → Idle; returns the finished trip.
    pub fn stop_trip(&self) -> Result<TripSnapshot> {
        let mut meta = self.lock_metadata()?;

        match meta.state {
            TripState::Recording | TripState::Paused => {
                meta.state = TripState::Idle;
                let snapshot = self.lock_accumulator()?.snapshot();
                log::info!(
                    "Trip {} stopped: {} of {} fixes accepted, {:.1} m",
                    meta.trip_id,
                    snapshot.stats.accepted_count,
                    snapshot.stats.raw_count,
                    snapshot.total_distance
                );
                Ok(snapshot)
            }
            TripState::Idle => Err(TrackerError::NotRunning),
        }
    }

    pub fn state(&self) -> Result<TripState> {
        Ok(self.lock_metadata()?.state)
    }

    pub fn is_recording(&self) -> Result<bool> {
        Ok(self.lock_metadata()?.state == TripState::Recording)
    }

    /// Feed one fix. Returns `None` when no trip is recording.
    pub fn push_sample(&self, sample: &Sample) -> Result<Option<Outcome>> {
        let mut meta = self.lock_metadata()?;
        if meta.state != TripState::Recording {
            return Ok(None);
        }

        let mut accumulator = self.lock_accumulator()?;
        let outcome = accumulator.add_coordinate(sample);

        // Same counts as TripStats; a re-anchor rewrites the history
        meta.samples_seen += 1;
        meta.accepted_count = accumulator.accepted_path().len() as u32;
        meta.rejected_count =
            accumulator.raw_history().len().saturating_sub(accumulator.accepted_path().len()) as u32;
        if let Some(speed) = sample.speed.filter(|_| outcome != Outcome::Dropped) {
            meta.peak_speed_ms = meta.peak_speed_ms.max(speed);
        }

        Ok(Some(outcome))
    }

    /// Plant a stationary reference fix while recording.
    pub fn push_stationary_sample(&self, sample: &Sample) -> Result<bool> {
        let meta = self.lock_metadata()?;
        if meta.state != TripState::Recording {
            return Ok(false);
        }
        self.lock_accumulator()?.add_stationary_coordinate(sample);
        Ok(true)
    }

    /// Get metadata snapshot
    pub fn metadata(&self) -> Result<TripMetadata> {
        Ok(self.lock_metadata()?.clone())
    }

    /// Current state of the accumulator without ending the trip.
    pub fn snapshot(&self) -> Result<TripSnapshot> {
        Ok(self.lock_accumulator()?.snapshot())
    }
}

impl Default for TripSession {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
