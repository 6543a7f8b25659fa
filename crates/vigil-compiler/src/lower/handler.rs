//! Handler lowering.
//!
//! A handler becomes a body method on the monitor plus a nested adapter the
//! event sources call: a scheduler job for `IntervalEvent` handlers, a typed
//! observer for everything else.

use vigil_runtime::event::EventType;

use super::MonitorScope;
use crate::diagnostic::CompilerError;
use crate::ir::HandlerDecl;
use crate::target::{CodeOrigin, Field, FieldInit, FieldType, GeneratedType, Method, Stmt, TypeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredHandler {
    /// Adapter instance held by the monitor.
    pub field: Field,
    /// The handler body as a monitor method.
    pub body: Method,
    pub adapter: GeneratedType,
}

/// Payload type a handler parameter declares.
pub fn handler_payload(scope: &MonitorScope<'_>, handler: &HandlerDecl) -> Result<EventType, CompilerError> {
    EventType::from_type_name(&handler.param.typ).ok_or_else(|| CompilerError::UnknownEventType {
        monitor: scope.qualified_name.clone(),
        handler: handler.name.clone(),
        type_name: handler.param.typ.clone(),
    })
}

pub fn lower_handler(
    scope: &MonitorScope<'_>,
    handler: &HandlerDecl,
) -> Result<LoweredHandler, CompilerError> {
    let payload = handler_payload(scope, handler)?;

    let body = Method::new(
        &handler.name,
        vec![Stmt::UserCode {
            origin: CodeOrigin::Handler {
                name: handler.name.clone(),
            },
            source: handler.body.source.clone(),
        }],
    )
    .param(&handler.param.name, payload.type_name())
    .propagating();

    let mut adapter = if payload == EventType::Interval {
        let mut job = GeneratedType::new(
            scope.nested_name(&handler.name, "Job"),
            scope.member(&handler.name),
            TypeKind::IntervalJob {
                handler: handler.name.clone(),
            },
        );
        job.methods.push(
            Method::new(
                "execute",
                vec![Stmt::DispatchInterval {
                    handler: handler.name.clone(),
                }],
            )
            .param("context", "JobContext")
            .overriding()
            .propagating(),
        );
        job
    } else {
        let mut observer = GeneratedType::new(
            scope.nested_name(&handler.name, "Observer"),
            scope.member(&handler.name),
            TypeKind::ObserverAdapter {
                payload,
                handler: handler.name.clone(),
            },
        );
        observer.methods.push(
            Method::new(
                "notify",
                vec![Stmt::DispatchTyped {
                    payload,
                    handler: handler.name.clone(),
                }],
            )
            .param("event", "Event")
            .overriding(),
        );
        observer
    };
    adapter.doc = handler
        .doc
        .clone()
        .or_else(|| Some(format!("Dispatches `{payload}` to `{}`.", handler.name)));

    let field = Field::new(
        &handler.name,
        FieldType::Handler {
            type_name: adapter.name.clone(),
        },
    )
    .with_init(FieldInit::Construct {
        type_name: adapter.name.clone(),
    });

    Ok(LoweredHandler {
        field,
        body,
        adapter,
    })
}
