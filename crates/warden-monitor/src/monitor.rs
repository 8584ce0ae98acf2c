//! Bounded, concurrency-safe event store with aggregate statistics.
//!
//! The monitor retains the most recent `capacity` events; older events are
//! evicted FIFO and only counted. Statistics are computed over the retained
//! window on demand and never mutate stored events. A poisoned lock is
//! recovered rather than propagated: an audit trail with one torn write is
//! still more useful than none.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use warden_engine::{AttackCategory, ThreatLevel};

use crate::error::{MonitorError, Result};
use crate::event::DetectionEvent;

/// Default retained-window size.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Aggregate statistics over the retained event window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    /// Events recorded since construction, including evicted ones.
    pub total_recorded: u64,
    /// Events currently retained.
    pub retained: usize,
    /// Events evicted from the window.
    pub evicted: u64,
    /// Retained events per threat level, `[SAFE..CRITICAL]` by rank.
    pub level_counts: [u64; 5],
    /// Mean risk score over retained events, 0.0 when empty.
    pub mean_risk_score: f64,
    /// Most frequent category among retained events, ties resolved by
    /// category priority.
    pub top_category: Option<AttackCategory>,
}

impl AggregateStats {
    /// Count of retained events at `level`.
    #[must_use]
    pub fn count_at(&self, level: ThreatLevel) -> u64 {
        self.level_counts[level.rank() as usize]
    }
}

struct MonitorState {
    events: VecDeque<DetectionEvent>,
    total_recorded: u64,
    evicted: u64,
}

/// Bounded detection event store. Shareable across threads behind a plain
/// reference; interior locking keeps each operation atomic.
pub struct DetectionMonitor {
    capacity: usize,
    state: Mutex<MonitorState>,
}

impl DetectionMonitor {
    /// Create a monitor retaining up to `capacity` events.
    ///
    /// # Errors
    ///
    /// [`MonitorError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MonitorError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(MonitorState {
                events: VecDeque::with_capacity(capacity),
                total_recorded: 0,
                evicted: 0,
            }),
        })
    }

    /// Create a monitor with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            state: Mutex::new(MonitorState {
                events: VecDeque::with_capacity(DEFAULT_CAPACITY),
                total_recorded: 0,
                evicted: 0,
            }),
        }
    }

    /// Retained-window capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append one event, evicting the oldest when the window is full.
    pub fn record(&self, event: DetectionEvent) {
        let mut state = self.lock();
        if state.events.len() == self.capacity {
            state.events.pop_front();
            state.evicted += 1;
        }
        debug!(
            fingerprint = %event.fingerprint,
            threat = %event.threat_level,
            "event recorded"
        );
        state.events.push_back(event);
        state.total_recorded += 1;
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// True when no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// The most recent `n` events, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<DetectionEvent> {
        let state = self.lock();
        state.events.iter().rev().take(n).cloned().collect()
    }

    /// Compute statistics over the retained window.
    #[must_use]
    pub fn stats(&self) -> AggregateStats {
        let state = self.lock();

        let mut level_counts = [0u64; 5];
        let mut score_sum = 0.0;
        let mut category_counts = std::collections::BTreeMap::<AttackCategory, u64>::new();
        for event in &state.events {
            level_counts[event.threat_level.rank() as usize] += 1;
            score_sum += event.risk_score;
            for &category in &event.categories {
                *category_counts.entry(category).or_insert(0) += 1;
            }
        }

        let retained = state.events.len();
        let mean_risk_score = if retained == 0 {
            0.0
        } else {
            score_sum / retained as f64
        };
        let top_category = category_counts
            .iter()
            .max_by(|(ca, na), (cb, nb)| {
                na.cmp(nb).then_with(|| cb.priority().cmp(&ca.priority()))
            })
            .map(|(&c, _)| c);

        AggregateStats {
            total_recorded: state.total_recorded,
            retained,
            evicted: state.evicted,
            level_counts,
            mean_risk_score,
            top_category,
        }
    }
}

impl std::fmt::Debug for DetectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionMonitor")
            .field("capacity", &self.capacity)
            .field("retained", &self.len())
            .finish()
    }
}
