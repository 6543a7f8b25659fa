//! # Runtime Context
//!
//! Bundles the collaborators generated types are instantiated against.

use std::sync::Arc;

use crate::bus::{LocalBus, MessageBus};
use crate::failure::{FailurePolicy, LogAndContinue};
use crate::probe::{BusProbeFactory, ProbeFactory};
use crate::scheduler::{ManualScheduler, Scheduler};
use crate::store::{MemoryStore, VariableStore};

/// Collaborators of generated monitors and namespaces.
#[derive(Clone)]
pub struct RuntimeContext {
    pub bus: Arc<dyn MessageBus>,
    pub probes: Arc<dyn ProbeFactory>,
    pub scheduler: Arc<dyn Scheduler>,
    pub store: Arc<dyn VariableStore>,
    pub policy: Arc<dyn FailurePolicy>,
}

impl RuntimeContext {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        probes: Arc<dyn ProbeFactory>,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn VariableStore>,
    ) -> Self {
        Self {
            bus,
            probes,
            scheduler,
            store,
            policy: Arc::new(LogAndContinue),
        }
    }

    /// In-process context: [`LocalBus`], bus-backed probes, a
    /// [`ManualScheduler`] and a [`MemoryStore`].
    pub fn local() -> Self {
        let bus = LocalBus::new();
        let probes = BusProbeFactory::new(bus.clone());
        Self::new(bus, probes, ManualScheduler::new(), MemoryStore::new())
    }

    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_probes(mut self, probes: Arc<dyn ProbeFactory>) -> Self {
        self.probes = probes;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn VariableStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn FailurePolicy>) -> Self {
        self.policy = policy;
        self
    }
}
