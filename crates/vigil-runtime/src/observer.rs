//! # Observer Pattern
//!
//! Generated event types are subjects; generated handler adapters are
//! observers. Delivery happens on consumer threads, so everything here is
//! `Send + Sync` and pausing filters delivery instead of blocking it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::event::{Event, EventType};
use crate::failure::{FailurePolicy, LogAndContinue};

/// Receives notifications from a [`Subject`].
pub trait Observer: Send + Sync {
    fn notify(&self, event: &Event);
}

/// Paused/running flag with idempotent transitions.
///
/// Transitions use compare-exchange, so concurrent `pause` and `resume` calls
/// from any thread leave the flag in one of its two valid states and report
/// exactly one effective transition each.
#[derive(Debug, Default)]
pub struct RunState {
    paused: AtomicBool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to paused. Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        self.paused
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves to running. Returns `false` if already running.
    pub fn resume(&self) -> bool {
        self.paused
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

/// Something that can be paused and resumed.
pub trait Pausable: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;
}

/// An observable: a list of observers plus a run state.
#[derive(Default)]
pub struct Subject {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
    state: RunState,
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        if let Ok(mut guard) = self.observers.write() {
            guard.push(observer);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Notifies every observer unless paused. Returns how many were notified.
    pub fn notify_observers(&self, event: &Event) -> usize {
        if self.state.is_paused() {
            return 0;
        }
        // Snapshot first: an observer may subscribe further observers.
        let observers: Vec<Arc<dyn Observer>> = match self.observers.read() {
            Ok(guard) => guard.clone(),
            Err(_) => return 0,
        };
        for observer in &observers {
            observer.notify(event);
        }
        observers.len()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }
}

impl Pausable for Subject {
    fn pause(&self) {
        self.state.pause();
    }

    fn resume(&self) {
        self.state.resume();
    }

    fn is_paused(&self) -> bool {
        self.state.is_paused()
    }
}

type HandlerBody = dyn Fn(&Event) -> crate::Result<()> + Send + Sync;

/// Bridges generic notifications to a handler declared for one payload type.
///
/// Notifications of any other payload type are ignored without error.
pub struct ObserverAdapter {
    name: String,
    payload: EventType,
    body: Box<HandlerBody>,
    policy: Arc<dyn FailurePolicy>,
}

impl ObserverAdapter {
    pub fn new(
        name: impl Into<String>,
        payload: EventType,
        body: impl Fn(&Event) -> crate::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            payload,
            body: Box::new(body),
            policy: Arc::new(LogAndContinue),
        }
    }

    /// Routes handler failures to `policy` instead of the default logger.
    pub fn with_policy(mut self, policy: Arc<dyn FailurePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> EventType {
        self.payload
    }
}

impl Observer for ObserverAdapter {
    fn notify(&self, event: &Event) {
        if event.event_type() != self.payload {
            return;
        }
        if let Err(err) = (self.body)(event) {
            self.policy.on_failure(&self.name, &err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeEvent, IntervalEvent};
    use crate::failure::CapturingPolicy;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_adapter(payload: EventType, hits: Arc<AtomicUsize>) -> ObserverAdapter {
        ObserverAdapter::new("h", payload, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn run_state_transitions_are_idempotent() {
        let state = RunState::new();
        assert!(!state.is_paused());
        assert!(state.pause());
        assert!(!state.pause());
        assert!(state.is_paused());
        assert!(state.resume());
        assert!(!state.resume());
        assert!(!state.is_paused());
    }

    #[test]
    fn concurrent_transitions_keep_a_valid_flag() {
        let state = Arc::new(RunState::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if i % 2 == 0 {
                            state.pause();
                        } else {
                            state.resume();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        state.resume();
        assert!(!state.is_paused());
    }

    #[test]
    fn adapter_ignores_other_payload_types() {
        let hits = Arc::new(AtomicUsize::new(0));
        let adapter = counting_adapter(EventType::Change, Arc::clone(&hits));

        adapter.notify(&Event::Interval(IntervalEvent::new("* * * * *")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        adapter.notify(&Event::Change(ChangeEvent::new("x", json!(1), json!(2))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn paused_subject_filters_delivery() {
        let hits = Arc::new(AtomicUsize::new(0));
        let subject = Subject::new();
        subject.subscribe(Arc::new(counting_adapter(EventType::Interval, Arc::clone(&hits))));

        let event = Event::Interval(IntervalEvent::new("* * * * *"));
        assert_eq!(subject.notify_observers(&event), 1);
        subject.pause();
        assert_eq!(subject.notify_observers(&event), 0);
        subject.resume();
        assert_eq!(subject.notify_observers(&event), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handler_failures_reach_the_policy() {
        let policy = CapturingPolicy::new();
        let adapter = ObserverAdapter::new("onTick", EventType::Interval, |_| {
            Err(crate::Error::user("handler failed"))
        })
        .with_policy(policy.clone());

        adapter.notify(&Event::Interval(IntervalEvent::new("* * * * *")));
        let failures = policy.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].site, "onTick");
    }
}
