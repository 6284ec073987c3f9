//! Single-flight guard
//!
//! Each dataset has one guard. The guard is a two-state machine:
//!
//! ```text
//!   Idle --trigger--> Running --finish--> Idle
//!   Running --trigger--> (dropped)
//! ```
//!
//! A trigger that arrives while a cycle is running is dropped, not queued;
//! the next natural trigger picks up whatever changed meanwhile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// State of one dataset's sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    /// No cycle running
    Idle,
    /// A cycle is in progress
    Running,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightEvent {
    /// Someone asked for a sync
    Trigger,
    /// The running cycle ended (successfully or not)
    Finish,
}

impl FlightState {
    /// Next state for an event, or `None` when the event is dropped
    pub fn next(self, event: FlightEvent) -> Option<FlightState> {
        match (self, event) {
            (FlightState::Idle, FlightEvent::Trigger) => Some(FlightState::Running),
            (FlightState::Running, FlightEvent::Trigger) => None,
            (_, FlightEvent::Finish) => Some(FlightState::Idle),
        }
    }
}

/// Guard enforcing at most one running cycle
#[derive(Debug)]
pub struct FlightGuard {
    state: Arc<Mutex<FlightState>>,
    dropped: AtomicU64,
}

impl Default for FlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightGuard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FlightState::Idle)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Current state
    pub fn state(&self) -> FlightState {
        *self.state.lock()
    }

    /// Try to start a cycle
    ///
    /// Returns a permit that returns the guard to `Idle` when dropped, or
    /// `None` if a cycle is already running.
    pub fn try_acquire(&self) -> Option<FlightPermit> {
        let mut state = self.state.lock();
        match state.next(FlightEvent::Trigger) {
            Some(next) => {
                *state = next;
                Some(FlightPermit {
                    state: Arc::clone(&self.state),
                })
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Number of triggers dropped because a cycle was running
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Proof that a cycle is running; releases the guard on drop
#[derive(Debug)]
pub struct FlightPermit {
    state: Arc<Mutex<FlightState>>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(next) = state.next(FlightEvent::Finish) {
            *state = next;
        }
    }
}
