//! # Vigil Runtime
//!
//! The substrate generated monitors and namespaces run against: event
//! payloads, the observer pattern, an in-process message bus with threaded
//! consumers, probes, a scheduler, variable stores and namespace proxies.
//!
//! ## Module Overview
//!
//! - [`event`] - payload types and their runtime type tags
//! - [`observer`] - subjects, observers, typed adapters, run state
//! - [`bus`] / [`consumer`] - routing and threaded delivery
//! - [`probe`] - call interception publishing on the probe exchange
//! - [`scheduler`] - cron-driven jobs behind periodic events
//! - [`store`] - namespace variable storage (memory, SQLite)
//! - [`proxy`] - namespace proxy trees and the root connection
//! - [`source`] - runtime halves of generated event types
//! - [`monitor`] - monitor base state and pause/resume forwarding
//! - [`failure`] - policy receiving swallowed construction failures
//! - [`context`] - the collaborator bundle

pub mod bus;
pub mod consumer;
pub mod context;
pub mod error;
pub mod event;
pub mod failure;
pub mod monitor;
pub mod observer;
pub mod probe;
pub mod proxy;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod value;

pub use error::{Error, Result};

/// Everything generated code refers to.
pub mod prelude {
    pub use crate::bus::{LocalBus, MessageBus, PROBE_EXCHANGE};
    pub use crate::consumer::{ConsumerConfig, EventConsumer};
    pub use crate::context::RuntimeContext;
    pub use crate::event::{
        ChangeEvent, Event, EventType, ExceptionEvent, IntervalEvent, InvokeEvent, ReturnEvent,
        TimeLapseEvent,
    };
    pub use crate::failure::{FailurePolicy, LogAndContinue, guarded};
    pub use crate::monitor::{Monitor, MonitorCore};
    pub use crate::observer::{Observer, ObserverAdapter, Pausable, Subject};
    pub use crate::probe::{Probe, ProbeFactory};
    pub use crate::proxy::{NamespaceProxy, ProxyShape, RootConnection};
    pub use crate::scheduler::{EXPRESSION_KEY, Job, JobContext, Scheduler};
    pub use crate::source::{
        ChangeEventSource, Emitter, MonitorEvent, PeriodicEvent, Predicate, ProbeEventSource,
    };
    pub use crate::store::VariableStore;
    pub use crate::value::{Value, change_delta, from_decimal, numeric, percentage_of};
    pub use crate::{Error, Result};
    pub use rust_decimal::Decimal;
    pub use serde_json::json;
}
