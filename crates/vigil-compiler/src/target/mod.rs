//! Target representation produced by lowering.
//!
//! A [`GeneratedType`] is a type to be emitted: its fields (initialized in
//! declaration order before the constructor body runs), constructor,
//! methods and nested types. Method and constructor bodies are lists of
//! [`Stmt`], a closed set of the operations lowering emits. Two backends
//! consume this representation: `codegen` renders Rust source against
//! `vigil_runtime`, and `link` instantiates live runtime objects.

mod acceptor;
mod names;
mod predicate;
mod stmt;

pub use acceptor::{Acceptor, CollectingAcceptor, OutputChannel};
pub use names::NameGen;
pub use predicate::{PredicateExpr, SpecifierPredicate};
pub use stmt::{CodeOrigin, DeliveryFilter, RunStateCheck, Stmt};

use rust_decimal::Decimal;
use serde::Serialize;
use vigil_runtime::event::EventType;

use crate::ir::Expr;

/// A type emitted by lowering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedType {
    /// Simple type name (`Perf`, `PerfSlow`).
    pub name: String,
    /// Package-qualified name of the declaration it was lowered from.
    pub qualified_name: String,
    pub kind: TypeKind,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
    pub constructor: Vec<Stmt>,
    pub methods: Vec<Method>,
    pub nested: Vec<GeneratedType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeKind {
    Monitor,
    /// `root` is the root namespace name, `path` the dotted path of this node.
    NamespaceProxy { root: String, path: String },
    NamespaceStorage,
    /// `emitter` is the source text of the intercepted expression.
    ProbeEvent { payload: EventType, emitter: String },
    /// Watches `path` (relative to root namespace `namespace`).
    ChangeEvent { namespace: String, path: String },
    IntervalJob { handler: String },
    ObserverAdapter { payload: EventType, handler: String },
    Predicate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    /// Never reassigned after initialization.
    pub constant: bool,
    /// Shared by every instance (namespace proxies of `using` clauses).
    pub is_static: bool,
    pub init: Option<FieldInit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldType {
    /// A monitor variable.
    Value { declared: Option<String> },
    /// A periodic event (cron expression wrapper).
    Periodic,
    /// Instance of a nested event type.
    Event { type_name: String },
    /// Instance of a nested job or observer adapter type.
    Handler { type_name: String },
    /// Namespace proxy of a `using` clause.
    Proxy { namespace: String },
    /// Child proxy of a namespace proxy.
    ChildProxy { type_name: String },
    /// Decimal threshold of a predicate.
    Threshold,
    /// Instance of a nested predicate type.
    Predicate { type_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldInit {
    Expr { expr: Expr },
    Cron { expression: String },
    Construct { type_name: String },
    Decimal { value: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Method {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<String>,
    /// Overrides a method of the runtime base type.
    pub overrides: bool,
    /// Errors propagate to the caller instead of the failure policy.
    pub propagates: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

impl GeneratedType {
    pub fn new(name: impl Into<String>, qualified_name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            doc: None,
            fields: Vec::new(),
            constructor: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn nested_type(&self, name: &str) -> Option<&GeneratedType> {
        self.nested.iter().find(|t| t.name == name)
    }

    /// This type and every nested type, depth first.
    pub fn walk(&self) -> Vec<&GeneratedType> {
        let mut out = vec![self];
        for nested in &self.nested {
            out.extend(nested.walk());
        }
        out
    }
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            constant: true,
            is_static: false,
            init: None,
        }
    }

    pub fn mutable(mut self) -> Self {
        self.constant = false;
        self
    }

    pub fn shared(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_init(mut self, init: FieldInit) -> Self {
        self.init = Some(init);
        self
    }
}

impl Method {
    pub fn new(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            overrides: false,
            propagates: false,
            body,
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }

    pub fn propagating(mut self) -> Self {
        self.propagates = true;
        self
    }
}
