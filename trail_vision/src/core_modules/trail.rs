// THEORY:
// The `trail` module adds a short memory to the otherwise stateless per-frame
// analysis: the recent history of blob centroids, drawn as a motion trace.
//
// Key architectural principles:
// 1.  **One Global Trail**: There is no data association. Every accepted centroid of
//     every frame is appended to the same trail in arrival order, so a scene with
//     several blobs interleaves them. Per-object identity would need an assignment
//     step and is deliberately not attempted here.
// 2.  **Inactivity Reset**: The trail is `Active` while consecutive observations
//     arrive no more than `inactivity_window` apart (4 s by default). An observation
//     arriving later than that clears the history first and then starts a new trail
//     with itself as the only point.
// 3.  **Raw History**: No smoothing and no deduplication. Growth is unbounded unless
//     a capacity is configured, in which case the oldest point is dropped first.
// 4.  **Injected Time**: `update` takes the current stream time as a `Duration`, so
//     the tracker never reads a clock itself.

use crate::core_modules::blob::BlobObservation;
use std::collections::VecDeque;
use std::time::Duration;

/// Default gap after which a trail is considered abandoned.
pub const INACTIVITY_WINDOW: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailState {
    /// No points, or the last point is older than the inactivity window.
    Idle,
    /// Holds at least one point within the inactivity window.
    Active,
}

/// Maintains the single global centroid trail.
#[derive(Debug, Clone)]
pub struct TrailTracker {
    points: VecDeque<(f64, f64)>,
    /// Stream time of the last accepted point.
    last_update: Option<Duration>,
    inactivity_window: Duration,
    /// Maximum number of retained points; `None` keeps every point.
    capacity: Option<usize>,
}

impl Default for TrailTracker {
    fn default() -> Self {
        Self::new(INACTIVITY_WINDOW, None)
    }
}

impl TrailTracker {
    pub fn new(inactivity_window: Duration, capacity: Option<usize>) -> Self {
        Self {
            points: VecDeque::new(),
            last_update: None,
            inactivity_window,
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    /// Appends the observation's centroid and returns the current trail, oldest
    /// point first.
    pub fn update(&mut self, observation: &BlobObservation, now: Duration) -> &[(f64, f64)] {
        if let Some(last) = self.last_update {
            if now.saturating_sub(last) > self.inactivity_window {
                tracing::debug!(
                    dropped = self.points.len(),
                    idle_ms = now.saturating_sub(last).as_millis() as u64,
                    "trail timed out, starting a new one"
                );
                self.points.clear();
            }
        }

        if let Some(capacity) = self.capacity {
            while self.points.len() >= capacity {
                self.points.pop_front();
            }
        }
        self.points.push_back(observation.centroid);
        self.last_update = Some(now);
        self.points.make_contiguous()
    }

    /// Whether the trail would still be extended by an observation at `now`.
    pub fn state(&self, now: Duration) -> TrailState {
        match self.last_update {
            Some(last) if !self.points.is_empty() && now.saturating_sub(last) <= self.inactivity_window => {
                TrailState::Active
            }
            _ => TrailState::Idle,
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.points.iter()
    }

    pub fn snapshot(&self) -> Vec<(f64, f64)> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_update(&self) -> Option<Duration> {
        self.last_update
    }
}
