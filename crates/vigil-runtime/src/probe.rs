//! # Probes
//!
//! A probe instruments a call site and publishes the resulting events on
//! [`PROBE_EXCHANGE`] under its routing key. Generated probe events open one
//! probe per declared event through a [`ProbeFactory`] and consume from the
//! same routing key.
//!
//! [`BusProbe::intercept`] is the interception primitive: around one call it
//! raises an `InvokeEvent`, then either an `ExceptionEvent` or a
//! `TimeLapseEvent` followed by a `ReturnEvent`. All events of one call share a
//! transaction id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Instant;

use uuid::Uuid;

use crate::bus::{MessageBus, PROBE_EXCHANGE};
use crate::event::{
    Event, EventHeader, ExceptionEvent, InvokeEvent, MethodCall, ReturnEvent, TimeLapseEvent,
};
use crate::value::Value;
use crate::{Error, Result};

/// An instrumentation point publishing events under one routing key.
pub trait Probe: Send + Sync {
    fn routing_key(&self) -> &str;
    fn start(&self) -> Result<()>;
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Opens probes by routing key.
pub trait ProbeFactory: Send + Sync {
    fn open(&self, routing_key: &str) -> Result<Arc<dyn Probe>>;
}

/// Nanoseconds since the first probe reading in this process.
fn monotonic_nanos() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Probe publishing on a [`MessageBus`].
pub struct BusProbe {
    routing_key: String,
    bus: Arc<dyn MessageBus>,
    running: AtomicBool,
}

impl BusProbe {
    pub fn new(bus: Arc<dyn MessageBus>, routing_key: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            bus,
            running: AtomicBool::new(false),
        }
    }

    /// Publishes one event. Events raised while the probe is stopped are dropped.
    pub fn raise(&self, event: Event) -> Result<usize> {
        if !self.is_running() {
            return Ok(0);
        }
        self.bus.publish(PROBE_EXCHANGE, &self.routing_key, event)
    }

    /// Runs `f` as the intercepted call `class::method`.
    ///
    /// The call's own outcome is returned unchanged; publishing failures are
    /// logged and never replace it.
    pub fn intercept<T, F>(
        &self,
        class: &str,
        method: &str,
        parameters: &[&str],
        f: F,
    ) -> Result<T>
    where
        T: Into<Value> + Clone,
        F: FnOnce() -> Result<T>,
    {
        let transaction = Uuid::new_v4();
        let call = MethodCall {
            class: class.to_string(),
            method: method.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            arguments: Vec::new(),
        };

        self.raise_logged(Event::Invoke(InvokeEvent {
            header: EventHeader::new(transaction),
            call: call.clone(),
        }));

        let start = monotonic_nanos();
        let outcome = f();
        let end = monotonic_nanos();

        match &outcome {
            Err(err) => {
                self.raise_logged(Event::Exception(ExceptionEvent {
                    header: EventHeader::new(transaction),
                    call,
                    message: err.to_string(),
                }));
            }
            Ok(value) => {
                self.raise_logged(Event::TimeLapse(TimeLapseEvent {
                    header: EventHeader::new(transaction),
                    start,
                    end,
                }));
                self.raise_logged(Event::Return(ReturnEvent {
                    header: EventHeader::new(transaction),
                    call,
                    returned: value.clone().into(),
                }));
            }
        }
        outcome
    }

    fn raise_logged(&self, event: Event) {
        if let Err(err) = self.raise(event) {
            tracing::warn!(routing_key = %self.routing_key, error = %err, "probe publish failed");
        }
    }
}

impl Probe for BusProbe {
    fn routing_key(&self) -> &str {
        &self.routing_key
    }

    fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Factory handing out one [`BusProbe`] per routing key.
///
/// Opening a key twice returns the same probe, so instrumentation code can
/// look probes up with [`BusProbeFactory::probe`] after generated events
/// opened them.
pub struct BusProbeFactory {
    bus: Arc<dyn MessageBus>,
    probes: RwLock<HashMap<String, Arc<BusProbe>>>,
}

impl BusProbeFactory {
    pub fn new(bus: Arc<dyn MessageBus>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            probes: RwLock::new(HashMap::new()),
        })
    }

    /// An already opened probe.
    pub fn probe(&self, routing_key: &str) -> Option<Arc<BusProbe>> {
        self.probes
            .read()
            .ok()
            .and_then(|guard| guard.get(routing_key).cloned())
    }

    /// Routing keys of every opened probe, sorted.
    pub fn routing_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .probes
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl ProbeFactory for BusProbeFactory {
    fn open(&self, routing_key: &str) -> Result<Arc<dyn Probe>> {
        if routing_key.is_empty() {
            return Err(Error::probe(routing_key, "routing key is empty"));
        }
        let mut guard = self
            .probes
            .write()
            .map_err(|_| Error::Internal("probe registry poisoned".to_string()))?;
        let probe: Arc<dyn Probe> = guard
            .entry(routing_key.to_string())
            .or_insert_with(|| Arc::new(BusProbe::new(Arc::clone(&self.bus), routing_key)))
            .clone();
        Ok(probe)
    }
}
