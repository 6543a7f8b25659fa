//! # Monitors
//!
//! Generated monitors embed a [`MonitorCore`] (the base type) and override
//! pause/resume to forward the transition to each of their events:
//!
//! - pause: guard, base flag, then every event in declaration order
//! - resume: guard, every event in declaration order, then base flag
//!
//! Transitions of one monitor are serialized, so each event sees every
//! effective transition exactly once even when pause and resume race.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::observer::{Pausable, RunState};
use crate::source::MonitorEvent;

/// A live monitor.
pub trait Monitor: Pausable {
    fn name(&self) -> &str;

    /// Event members in declaration order.
    fn events(&self) -> Vec<Arc<dyn MonitorEvent>>;
}

/// Base state shared by every generated monitor.
#[derive(Debug, Default)]
pub struct MonitorCore {
    name: String,
    state: RunState,
    transition: Mutex<()>,
}

impl MonitorCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RunState::new(),
            transition: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Serializes one pause or resume transition. Hold the guard for the
    /// whole transition, event forwarding included.
    pub fn transition(&self) -> MutexGuard<'_, ()> {
        self.transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Base pause: flips the flag only.
    pub fn set_paused(&self) {
        self.state.pause();
        tracing::debug!(monitor = %self.name, "paused");
    }

    /// Base resume: flips the flag only.
    pub fn set_running(&self) {
        self.state.resume();
        tracing::debug!(monitor = %self.name, "resumed");
    }

    /// Pauses the monitor and its events. Returns `false` if it was already paused.
    pub fn pause(&self, events: &[Arc<dyn MonitorEvent>]) -> bool {
        let _transition = self.transition();
        if self.state.is_paused() {
            return false;
        }
        self.set_paused();
        for event in events {
            event.pause();
        }
        true
    }

    /// Resumes the events and the monitor. Returns `false` if it was already running.
    pub fn resume(&self, events: &[Arc<dyn MonitorEvent>]) -> bool {
        let _transition = self.transition();
        if !self.state.is_paused() {
            return false;
        }
        for event in events {
            event.resume();
        }
        self.set_running();
        true
    }
}
