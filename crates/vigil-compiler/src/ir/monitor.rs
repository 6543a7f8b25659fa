//! Monitor declarations.

use serde::{Deserialize, Serialize};

use super::expr::{Expr, SpecifierNode};
use super::namespace::VariableDecl;
use crate::diagnostic::Span;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorDecl {
    pub name: String,
    /// Imported root namespaces.
    #[serde(default)]
    pub usings: Vec<NamespaceRef>,
    /// Body statements in declaration order.
    #[serde(default)]
    pub body: Vec<MonitorStatement>,
    #[serde(default)]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRef {
    /// Root namespace name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MonitorStatement {
    Variable(VariableDecl),
    Event(EventDecl),
    Handler(HandlerDecl),
    Code(CodeBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    pub emitter: EmitterSpec,
    #[serde(default)]
    pub span: Option<Span>,
}

/// What raises an event: a cron schedule or a typed runtime occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EmitterSpec {
    Periodic {
        cron: String,
    },
    Typed {
        #[serde(rename = "eventKind")]
        event_kind: EventKind,
        emitter: Expr,
        #[serde(default)]
        specifier: Option<SpecifierNode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Invoke,
    Return,
    Exception,
    #[serde(rename = "TIMELAPSE")]
    TimeLapse,
    Change,
}

impl EventKind {
    /// Payload type delivered for this kind.
    pub fn payload(self) -> vigil_runtime::event::EventType {
        use vigil_runtime::event::EventType;
        match self {
            EventKind::Invoke => EventType::Invoke,
            EventKind::Return => EventType::Return,
            EventKind::Exception => EventType::Exception,
            EventKind::TimeLapse => EventType::TimeLapse,
            EventKind::Change => EventType::Change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDecl {
    pub name: String,
    pub param: Parameter,
    pub body: CodeBlock,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Declared payload type name (`IntervalEvent`, `ChangeEvent`, ...).
    pub typ: String,
}

/// Target-language statements, opaque to lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub source: String,
}
