//! Monitor linking.
//!
//! A [`LinkedMonitor`] is the live counterpart of a lowered monitor: fields
//! are initialized in declaration order, then the lowered constructor runs.
//! Method bodies (constructor, `initialize`, `pause`, `resume`) are executed
//! statement by statement; user code comes from [`Bindings`].

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::{Arc, RwLock, Weak};

use vigil_runtime::consumer::ConsumerConfig;
use vigil_runtime::context::RuntimeContext;
use vigil_runtime::event::{Event, EventType, IntervalEvent};
use vigil_runtime::failure::guarded;
use vigil_runtime::monitor::{Monitor, MonitorCore};
use vigil_runtime::observer::{Observer, ObserverAdapter, Pausable};
use vigil_runtime::proxy::NamespaceProxy;
use vigil_runtime::scheduler::{EXPRESSION_KEY, Job, JobContext};
use vigil_runtime::source::{
    ChangeEventSource, MonitorEvent, PeriodicEvent, Predicate, ProbeEventSource,
};
use vigil_runtime::value::Value;
use vigil_runtime::{Error, Result};

use super::bindings::Bindings;
use super::namespace::initial_value;
use crate::diagnostic::CompilerError;
use crate::target::{
    CodeOrigin, FieldInit, FieldType, GeneratedType, Method, RunStateCheck, SpecifierPredicate,
    Stmt, TypeKind,
};

/// An event member of a linked monitor.
#[derive(Clone)]
pub enum LinkedEvent {
    Periodic(Arc<PeriodicEvent>),
    Probe(Arc<ProbeEventSource>),
    Change(Arc<ChangeEventSource>),
}

impl LinkedEvent {
    pub fn as_monitor_event(&self) -> Arc<dyn MonitorEvent> {
        match self {
            LinkedEvent::Periodic(event) => event.clone(),
            LinkedEvent::Probe(event) => event.clone(),
            LinkedEvent::Change(event) => event.clone(),
        }
    }
}

/// The adapter a handler is reached through.
#[derive(Clone)]
pub enum LinkedHandler {
    Job(Arc<dyn Job>),
    Observer(Arc<dyn Observer>),
}

struct Variable {
    value: RwLock<Value>,
    constant: bool,
}

enum AdapterPlan {
    Job { handler: String },
    Observer { payload: EventType, handler: String, site: String },
}

/// Calls a handler body from a scheduler job.
struct DispatchJob {
    monitor: Weak<LinkedMonitor>,
    handler: String,
}

impl Job for DispatchJob {
    fn execute(&self, context: &JobContext) -> Result<()> {
        let expression = context.get_string(EXPRESSION_KEY)?;
        let event = Event::Interval(IntervalEvent::new(expression));
        match self.monitor.upgrade() {
            Some(monitor) => monitor.dispatch(&self.handler, &event),
            None => Ok(()),
        }
    }
}

/// A monitor instantiated from its lowered type.
pub struct LinkedMonitor {
    core: MonitorCore,
    context: RuntimeContext,
    bindings: Bindings,
    variables: BTreeMap<String, Variable>,
    events: Vec<(String, LinkedEvent)>,
    handlers: BTreeMap<String, LinkedHandler>,
    registry: BTreeMap<String, Arc<NamespaceProxy>>,
    proxies: RwLock<BTreeMap<String, Arc<NamespaceProxy>>>,
    methods: Vec<Method>,
}

pub fn link_monitor(
    generated: &GeneratedType,
    context: &RuntimeContext,
    bindings: &Bindings,
    registry: &BTreeMap<String, Arc<NamespaceProxy>>,
) -> std::result::Result<Arc<LinkedMonitor>, CompilerError> {
    if generated.kind != TypeKind::Monitor {
        return Err(CompilerError::link(&generated.qualified_name, "not a monitor"));
    }
    let qualified = generated.qualified_name.as_str();

    let mut variables = BTreeMap::new();
    let mut events = Vec::new();
    let mut adapters = Vec::new();

    for field in &generated.fields {
        match (&field.ty, &field.init) {
            (FieldType::Proxy { .. }, _) => {}
            (FieldType::Value { .. }, Some(FieldInit::Expr { expr })) => {
                let name = format!("{qualified}.{}", field.name);
                let value = initial_value(&name, expr, bindings)
                    .map_err(|e| CompilerError::link(&name, e))?;
                variables.insert(
                    field.name.clone(),
                    Variable {
                        value: RwLock::new(value),
                        constant: field.constant,
                    },
                );
            }
            (FieldType::Periodic, Some(FieldInit::Cron { expression })) => {
                let event = PeriodicEvent::new(
                    field.name.as_str(),
                    expression.as_str(),
                    context.scheduler.clone(),
                );
                events.push((field.name.clone(), LinkedEvent::Periodic(Arc::new(event))));
            }
            (FieldType::Event { type_name }, _) => {
                let nested = nested(generated, type_name)?;
                events.push((field.name.clone(), link_event(nested, context)?));
            }
            (FieldType::Handler { type_name }, _) => {
                let nested = nested(generated, type_name)?;
                let plan = match &nested.kind {
                    TypeKind::IntervalJob { handler } => AdapterPlan::Job {
                        handler: handler.clone(),
                    },
                    TypeKind::ObserverAdapter { payload, handler } => AdapterPlan::Observer {
                        payload: *payload,
                        handler: handler.clone(),
                        site: nested.qualified_name.clone(),
                    },
                    other => {
                        return Err(CompilerError::link(
                            &nested.qualified_name,
                            format!("{other:?} is not a handler adapter"),
                        ));
                    }
                };
                adapters.push((field.name.clone(), plan));
            }
            (ty, _) => {
                return Err(CompilerError::link(
                    qualified,
                    format!("field '{}' of kind {ty:?} cannot be linked", field.name),
                ));
            }
        }
    }

    let monitor = Arc::new_cyclic(|this: &Weak<LinkedMonitor>| {
        let handlers = adapters
            .into_iter()
            .map(|(name, plan)| (name, adapter(this, plan, context)))
            .collect();
        LinkedMonitor {
            core: MonitorCore::new(qualified),
            context: context.clone(),
            bindings: bindings.clone(),
            variables,
            events,
            handlers,
            registry: registry.clone(),
            proxies: RwLock::new(BTreeMap::new()),
            methods: generated.methods.clone(),
        }
    });

    monitor
        .run(&generated.constructor)
        .map_err(|e| CompilerError::link(qualified, e))?;
    tracing::debug!(monitor = %qualified, events = monitor.events.len(), "monitor linked");
    Ok(monitor)
}

fn nested<'a>(
    generated: &'a GeneratedType,
    type_name: &str,
) -> std::result::Result<&'a GeneratedType, CompilerError> {
    generated.nested_type(type_name).ok_or_else(|| {
        CompilerError::link(
            &generated.qualified_name,
            format!("nested type '{type_name}' is missing"),
        )
    })
}

fn adapter(monitor: &Weak<LinkedMonitor>, plan: AdapterPlan, context: &RuntimeContext) -> LinkedHandler {
    match plan {
        AdapterPlan::Job { handler } => LinkedHandler::Job(Arc::new(DispatchJob {
            monitor: monitor.clone(),
            handler,
        })),
        AdapterPlan::Observer {
            payload,
            handler,
            site,
        } => {
            let monitor = monitor.clone();
            let observer = ObserverAdapter::new(site, payload, move |event| match monitor.upgrade() {
                Some(monitor) => monitor.dispatch(&handler, event),
                None => Ok(()),
            })
            .with_policy(context.policy.clone());
            LinkedHandler::Observer(Arc::new(observer))
        }
    }
}

fn member_name(nested: &GeneratedType) -> &str {
    nested
        .qualified_name
        .rsplit('.')
        .next()
        .unwrap_or(&nested.qualified_name)
}

fn link_event(
    nested: &GeneratedType,
    context: &RuntimeContext,
) -> std::result::Result<LinkedEvent, CompilerError> {
    match &nested.kind {
        TypeKind::ProbeEvent { payload, emitter } => {
            let source = Arc::new(ProbeEventSource::new(
                member_name(nested),
                *payload,
                emitter.as_str(),
            ));
            wire(
                nested,
                context,
                |key| source.open_probe(context.probes.as_ref(), key),
                |config| source.start_consumer(context.bus.clone(), config),
            )?;
            Ok(LinkedEvent::Probe(source))
        }
        TypeKind::ChangeEvent { namespace, path } => {
            let predicate = nested
                .fields
                .iter()
                .find_map(|field| match &field.ty {
                    FieldType::Predicate { type_name } => Some(type_name),
                    _ => None,
                })
                .map(|type_name| link_predicate(self::nested(nested, type_name)?))
                .transpose()?;
            let source = Arc::new(ChangeEventSource::new(
                member_name(nested),
                namespace.as_str(),
                path.as_str(),
                predicate.map(|p| Arc::new(p) as Arc<dyn Predicate>),
            ));
            wire(
                nested,
                context,
                |key| {
                    Err(Error::probe(key, "change events are not raised by probes"))
                },
                |config| source.start_consumer(context.bus.clone(), config),
            )?;
            Ok(LinkedEvent::Change(source))
        }
        other => Err(CompilerError::link(
            &nested.qualified_name,
            format!("{other:?} is not an event type"),
        )),
    }
}

/// Runs an event constructor: guarded probe and consumer wiring.
fn wire(
    nested: &GeneratedType,
    context: &RuntimeContext,
    open_probe: impl Fn(&str) -> Result<()>,
    start_consumer: impl Fn(ConsumerConfig) -> Result<()>,
) -> std::result::Result<(), CompilerError> {
    for stmt in &nested.constructor {
        let Stmt::Guarded { site, body } = stmt else {
            return Err(CompilerError::link(
                &nested.qualified_name,
                format!("unexpected constructor statement {stmt:?}"),
            ));
        };
        guarded(context.policy.as_ref(), site, || {
            for inner in body {
                match inner {
                    Stmt::OpenProbe { routing_key } => open_probe(routing_key)?,
                    Stmt::StartConsumer {
                        exchange,
                        routing_key,
                        queue,
                        ..
                    } => start_consumer(
                        ConsumerConfig::new(exchange.as_str(), routing_key.as_str())
                            .with_queue(queue.as_str()),
                    )?,
                    other => {
                        return Err(Error::Internal(format!(
                            "statement not supported in event constructors: {other:?}"
                        )));
                    }
                }
            }
            Ok(())
        });
    }
    Ok(())
}

fn link_predicate(
    predicate: &GeneratedType,
) -> std::result::Result<SpecifierPredicate, CompilerError> {
    let expr = predicate
        .method("test")
        .and_then(|m| match m.body.as_slice() {
            [Stmt::ReturnPredicate { expr }] => Some(expr.clone()),
            _ => None,
        })
        .ok_or_else(|| CompilerError::link(&predicate.qualified_name, "predicate has no test body"))?;
    let thresholds = predicate
        .fields
        .iter()
        .filter_map(|field| match &field.init {
            Some(FieldInit::Decimal { value }) => Some((field.name.clone(), *value)),
            _ => None,
        })
        .collect();
    Ok(SpecifierPredicate::new(expr, thresholds))
}

impl LinkedMonitor {
    pub fn qualified_name(&self) -> &str {
        self.core.name()
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    pub fn variable(&self, name: &str) -> Result<Value> {
        let variable = self.variables.get(name).ok_or_else(|| unknown("variable", name))?;
        variable
            .value
            .read()
            .map(|v| v.clone())
            .map_err(|_| Error::Internal(format!("variable '{name}' poisoned")))
    }

    /// Assigns a writable variable. Returns the previous value.
    pub fn set_variable(&self, name: &str, value: Value) -> Result<Value> {
        let variable = self.variables.get(name).ok_or_else(|| unknown("variable", name))?;
        if variable.constant {
            return Err(Error::ReadOnly(format!("{}.{name}", self.qualified_name())));
        }
        let mut guard = variable
            .value
            .write()
            .map_err(|_| Error::Internal(format!("variable '{name}' poisoned")))?;
        Ok(std::mem::replace(&mut *guard, value))
    }

    pub fn event(&self, name: &str) -> Option<&LinkedEvent> {
        self.events.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn handler(&self, name: &str) -> Option<&LinkedHandler> {
        self.handlers.get(name)
    }

    /// Proxy of a namespace bound by `initialize`.
    pub fn namespace(&self, name: &str) -> Result<Arc<NamespaceProxy>> {
        self.proxies
            .read()
            .map_err(|_| Error::Internal("proxies poisoned".to_string()))?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Disconnected(name.to_string()))
    }

    /// Attaches handler `handler` to event `event`: a scheduler job for
    /// periodic events, an observer for probe and change events.
    pub fn subscribe(&self, event: &str, handler: &str) -> Result<()> {
        let linked_event = self.event(event).ok_or_else(|| unknown("event", event))?;
        let linked_handler = self.handler(handler).ok_or_else(|| unknown("handler", handler))?;
        match (linked_event, linked_handler) {
            (LinkedEvent::Periodic(source), LinkedHandler::Job(job)) => {
                source.subscribe(handler, job.clone())?;
            }
            (LinkedEvent::Probe(source), LinkedHandler::Observer(observer)) => {
                source.subscribe(observer.clone());
            }
            (LinkedEvent::Change(source), LinkedHandler::Observer(observer)) => {
                source.subscribe(observer.clone());
            }
            _ => {
                return Err(Error::IncompatibleHandler {
                    event: event.to_string(),
                    handler: handler.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Runs the body bound to `handler` with `event`.
    pub fn dispatch(&self, handler: &str, event: &Event) -> Result<()> {
        let body = self
            .bindings
            .handler_for(self.qualified_name(), handler)
            .ok_or_else(|| Error::Unbound(format!("{}.{handler}", self.qualified_name())))?;
        body(self, event)
    }

    fn method(&self, name: &str) -> Result<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| unknown("method", name))
    }

    fn run(&self, stmts: &[Stmt]) -> Result<ControlFlow<()>> {
        for stmt in stmts {
            match stmt {
                Stmt::UserCode {
                    origin: CodeOrigin::Block { index },
                    ..
                } => {
                    let body = self
                        .bindings
                        .code_for(self.qualified_name(), *index)
                        .ok_or_else(|| {
                            Error::Unbound(format!("{}.code_{index}", self.qualified_name()))
                        })?;
                    body(self)?;
                }
                Stmt::CallSelf { method } => {
                    let method = self.method(method)?;
                    self.run(&method.body)?;
                }
                Stmt::CallSuper { method } => match method.as_str() {
                    "pause" => self.core.set_paused(),
                    "resume" => self.core.set_running(),
                    other => return Err(unknown("base method", other)),
                },
                Stmt::CallField { field, method } => {
                    let event = self
                        .event(field)
                        .ok_or_else(|| unknown("event", field))?
                        .as_monitor_event();
                    match method.as_str() {
                        "pause" => event.pause(),
                        "resume" => event.resume(),
                        other => return Err(unknown("event method", other)),
                    }
                }
                Stmt::ReturnIf { state } => {
                    let paused = self.core.is_paused();
                    let done = match state {
                        RunStateCheck::Paused => paused,
                        RunStateCheck::Running => !paused,
                    };
                    if done {
                        return Ok(ControlFlow::Break(()));
                    }
                }
                Stmt::Guarded { site, body } => {
                    guarded(self.context.policy.as_ref(), site, || self.run(body));
                }
                Stmt::ConstructProxy { field, namespace } => {
                    let proxy = self
                        .registry
                        .get(namespace)
                        .cloned()
                        .ok_or_else(|| unknown("namespace", namespace))?;
                    self.proxies
                        .write()
                        .map_err(|_| Error::Internal("proxies poisoned".to_string()))?
                        .insert(field.clone(), proxy);
                }
                other => {
                    return Err(Error::Internal(format!(
                        "statement not supported in monitor bodies: {other:?}"
                    )));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn transition(&self, name: &str) {
        let _transition = self.core.transition();
        if let Err(err) = self.method(name).and_then(|m| self.run(&m.body)) {
            let site = format!("{}::{name}", self.qualified_name());
            self.context.policy.on_failure(&site, &err);
        }
    }
}

fn unknown(kind: &'static str, name: &str) -> Error {
    Error::UnknownMember {
        kind,
        name: name.to_string(),
    }
}

impl Pausable for LinkedMonitor {
    fn pause(&self) {
        self.transition("pause");
    }

    fn resume(&self) {
        self.transition("resume");
    }

    fn is_paused(&self) -> bool {
        self.core.is_paused()
    }
}

impl Monitor for LinkedMonitor {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn events(&self) -> Vec<Arc<dyn MonitorEvent>> {
        self.events.iter().map(|(_, e)| e.as_monitor_event()).collect()
    }
}
