//! # Event Sources
//!
//! Runtime halves of generated event types:
//!
//! - [`PeriodicEvent`] wraps a cron expression; handlers become scheduler jobs.
//! - [`ProbeEventSource`] owns a probe and a consumer on the probe exchange and
//!   forwards payloads of its declared type to its subject.
//! - [`ChangeEventSource`] consumes change events of one namespace variable,
//!   gated by an optional [`Predicate`].
//!
//! Probe and consumer are wired after construction, each at most once, so a
//! failed step leaves the source partially wired instead of unconstructed.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use crate::bus::MessageBus;
use crate::consumer::{ConsumerConfig, EventConsumer};
use crate::event::{ChangeEvent, EventType};
use crate::observer::{Observer, Pausable, RunState, Subject};
use crate::probe::{Probe, ProbeFactory};
use crate::scheduler::{EXPRESSION_KEY, Job, JobContext, JobId, Scheduler};
use crate::{Error, Result};

/// What raises an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitter {
    /// A cron expression.
    Schedule(String),
    /// The instrumented expression of a probe event.
    Expression(String),
    /// A namespace variable, by root namespace and path below it.
    Variable { namespace: String, path: String },
}

impl fmt::Display for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emitter::Schedule(cron) => write!(f, "cron({cron})"),
            Emitter::Expression(text) => f.write_str(text),
            Emitter::Variable { namespace, path } if path.is_empty() => f.write_str(namespace),
            Emitter::Variable { namespace, path } => write!(f, "{namespace}.{path}"),
        }
    }
}

/// Filter over change events.
pub trait Predicate: Send + Sync {
    fn test(&self, event: &ChangeEvent) -> Result<bool>;
}

/// Accessors shared by every event member of a monitor.
pub trait MonitorEvent: Pausable {
    fn name(&self) -> &str;
    fn event_type(&self) -> EventType;
    fn emitter(&self) -> Emitter;
    fn probe(&self) -> Option<Arc<dyn Probe>>;
    fn consumer(&self) -> Option<&EventConsumer>;
    /// Observer list; `None` for periodic events, which take jobs instead.
    fn subject(&self) -> Option<&Subject>;
}

/// An event raised by the scheduler.
pub struct PeriodicEvent {
    name: String,
    cron: String,
    scheduler: Arc<dyn Scheduler>,
    jobs: Mutex<Vec<JobId>>,
    state: RunState,
}

impl PeriodicEvent {
    pub fn new(name: impl Into<String>, cron: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            scheduler,
            jobs: Mutex::new(Vec::new()),
            state: RunState::new(),
        }
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    /// Schedules `job` as `<event>.<handler>` with the cron expression in its
    /// job data. Malformed expressions fail here.
    pub fn subscribe(&self, handler: &str, job: Arc<dyn Job>) -> Result<JobId> {
        let context = JobContext::new().with(EXPRESSION_KEY, self.cron.as_str());
        let id = self.scheduler.schedule(
            &format!("{}.{handler}", self.name),
            &self.cron,
            job,
            context,
        )?;
        if self.state.is_paused() {
            self.scheduler.pause(&id)?;
        }
        self.jobs
            .lock()
            .map_err(|_| Error::Internal("periodic event poisoned".to_string()))?
            .push(id.clone());
        Ok(id)
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn for_each_job(&self, action: &str, f: impl Fn(&JobId) -> Result<()>) {
        for id in self.job_ids() {
            if let Err(err) = f(&id) {
                tracing::warn!(job = %id, action, error = %err, "scheduler call failed");
            }
        }
    }
}

impl Pausable for PeriodicEvent {
    fn pause(&self) {
        if self.state.pause() {
            self.for_each_job("pause", |id| self.scheduler.pause(id));
        }
    }

    fn resume(&self) {
        if self.state.resume() {
            self.for_each_job("resume", |id| self.scheduler.resume(id));
        }
    }

    fn is_paused(&self) -> bool {
        self.state.is_paused()
    }
}

impl MonitorEvent for PeriodicEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> EventType {
        EventType::Interval
    }

    fn emitter(&self) -> Emitter {
        Emitter::Schedule(self.cron.clone())
    }

    fn probe(&self) -> Option<Arc<dyn Probe>> {
        None
    }

    fn consumer(&self) -> Option<&EventConsumer> {
        None
    }

    fn subject(&self) -> Option<&Subject> {
        None
    }
}

/// An event raised by a probe.
pub struct ProbeEventSource {
    name: String,
    payload: EventType,
    expression: String,
    subject: Arc<Subject>,
    probe: OnceLock<Arc<dyn Probe>>,
    consumer: OnceLock<EventConsumer>,
}

impl ProbeEventSource {
    pub fn new(name: impl Into<String>, payload: EventType, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload,
            expression: expression.into(),
            subject: Arc::new(Subject::new()),
            probe: OnceLock::new(),
            consumer: OnceLock::new(),
        }
    }

    /// Opens and starts the probe for `routing_key`.
    pub fn open_probe(&self, factory: &dyn ProbeFactory, routing_key: &str) -> Result<()> {
        let probe = factory.open(routing_key)?;
        probe.start()?;
        self.probe
            .set(probe)
            .map_err(|_| Error::probe(routing_key, "probe already opened"))
    }

    /// Starts a consumer forwarding payloads of the declared type.
    pub fn start_consumer(&self, bus: Arc<dyn MessageBus>, config: ConsumerConfig) -> Result<()> {
        let queue = config.queue.clone();
        let subject = Arc::clone(&self.subject);
        let payload = self.payload;
        let consumer = EventConsumer::new(bus, config, move |event| {
            if event.event_type() == payload {
                subject.notify_observers(&event);
            }
        });
        consumer.start()?;
        self.consumer
            .set(consumer)
            .map_err(|_| Error::consumer(queue, "consumer already started"))
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.subject.subscribe(observer);
    }
}

impl Pausable for ProbeEventSource {
    fn pause(&self) {
        self.subject.pause();
    }

    fn resume(&self) {
        self.subject.resume();
    }

    fn is_paused(&self) -> bool {
        self.subject.is_paused()
    }
}

impl MonitorEvent for ProbeEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> EventType {
        self.payload
    }

    fn emitter(&self) -> Emitter {
        Emitter::Expression(self.expression.clone())
    }

    fn probe(&self) -> Option<Arc<dyn Probe>> {
        self.probe.get().cloned()
    }

    fn consumer(&self) -> Option<&EventConsumer> {
        self.consumer.get()
    }

    fn subject(&self) -> Option<&Subject> {
        Some(&self.subject)
    }
}

/// An event raised by writes to one namespace variable.
pub struct ChangeEventSource {
    name: String,
    namespace: String,
    variable_path: String,
    predicate: Option<Arc<dyn Predicate>>,
    subject: Arc<Subject>,
    consumer: OnceLock<EventConsumer>,
}

impl ChangeEventSource {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        variable_path: impl Into<String>,
        predicate: Option<Arc<dyn Predicate>>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            variable_path: variable_path.into(),
            predicate,
            subject: Arc::new(Subject::new()),
            consumer: OnceLock::new(),
        }
    }

    pub fn variable_path(&self) -> &str {
        &self.variable_path
    }

    /// Starts a consumer forwarding exact path matches accepted by the predicate.
    pub fn start_consumer(&self, bus: Arc<dyn MessageBus>, config: ConsumerConfig) -> Result<()> {
        let queue = config.queue.clone();
        let subject = Arc::clone(&self.subject);
        let path = self.variable_path.clone();
        let predicate = self.predicate.clone();
        let consumer = EventConsumer::new(bus, config, move |event| {
            let Some(change) = event.as_change() else {
                return;
            };
            if change.variable != path {
                return;
            }
            let accepted = match &predicate {
                None => true,
                Some(predicate) => predicate.test(change).unwrap_or_else(|err| {
                    tracing::debug!(variable = %path, error = %err, "change rejected by specifier");
                    false
                }),
            };
            if accepted {
                subject.notify_observers(&event);
            }
        });
        consumer.start()?;
        self.consumer
            .set(consumer)
            .map_err(|_| Error::consumer(queue, "consumer already started"))
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.subject.subscribe(observer);
    }
}

impl Pausable for ChangeEventSource {
    fn pause(&self) {
        self.subject.pause();
    }

    fn resume(&self) {
        self.subject.resume();
    }

    fn is_paused(&self) -> bool {
        self.subject.is_paused()
    }
}

impl MonitorEvent for ChangeEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> EventType {
        EventType::Change
    }

    fn emitter(&self) -> Emitter {
        Emitter::Variable {
            namespace: self.namespace.clone(),
            path: self.variable_path.clone(),
        }
    }

    fn probe(&self) -> Option<Arc<dyn Probe>> {
        None
    }

    fn consumer(&self) -> Option<&EventConsumer> {
        self.consumer.get()
    }

    fn subject(&self) -> Option<&Subject> {
        Some(&self.subject)
    }
}
