//! Statements of generated bodies.

use serde::Serialize;
use vigil_runtime::event::EventType;

use super::predicate::PredicateExpr;
use crate::ir::Expr;

/// Where a piece of user code came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CodeOrigin {
    /// The n-th code block of a monitor.
    Block { index: usize },
    /// The body of a handler.
    Handler { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStateCheck {
    Paused,
    Running,
}

/// Which delivered events a consumer forwards to its observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeliveryFilter {
    /// Events whose runtime type is `payload`.
    Payload { payload: EventType },
    /// Change events of exactly `path`, accepted by `predicate` (a field
    /// holding a nested predicate type) when present.
    VariablePath {
        path: String,
        predicate: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Stmt {
    /// Verbatim user code.
    UserCode { origin: CodeOrigin, source: String },
    CallSelf { method: String },
    /// Delegates to the runtime base type (`pause` / `resume` of the run state).
    CallSuper { method: String },
    /// Calls `method` on the object held by `field`.
    CallField { field: String, method: String },
    /// Returns early when the run state already matches.
    ReturnIf { state: RunStateCheck },
    /// Failure boundary: runs `body` until the first error, which goes to the
    /// failure policy under `site`.
    Guarded { site: String, body: Vec<Stmt> },
    /// Assigns the proxy of root namespace `namespace` to the static `field`.
    ConstructProxy { field: String, namespace: String },
    /// Registers the namespace variables (nested storage type) and opens the
    /// root connection. `exchange` is where writes publish change events.
    ConnectStore { namespace: String, exchange: String },
    RegisterVariable {
        qualified_name: String,
        initializer: Expr,
        writable: bool,
    },
    OpenProbe { routing_key: String },
    StartConsumer {
        exchange: String,
        routing_key: String,
        queue: String,
        filter: DeliveryFilter,
    },
    /// Runtime type check, then the typed handler body.
    DispatchTyped { payload: EventType, handler: String },
    /// Reads the cron expression from the job data, raises a fresh interval
    /// event and calls the handler body.
    DispatchInterval { handler: String },
    GetVariable { qualified_name: String },
    SetVariable { qualified_name: String },
    /// Returns the child proxy held by `field`.
    ReturnField { field: String },
    ReturnPredicate { expr: PredicateExpr },
    ReturnConst { value: bool },
}
