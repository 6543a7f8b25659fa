//! Source tree consumed by lowering.
//!
//! The tree is produced by the (external) Vigil front end, already parsed and
//! type-checked, and handed over as JSON. Every node kind is a closed tagged
//! variant, so unknown kinds or operators are rejected when the tree is loaded
//! and lowering can match exhaustively.
//!
//! Nodes are immutable inputs: lowering only reads them.

mod expr;
mod monitor;
mod namespace;

pub use expr::{Expr, Literal, LogicalNode, LogicalOp, RelationalLeaf, RelationalOp, SpecifierNode};
pub use monitor::{
    CodeBlock, EmitterSpec, EventDecl, EventKind, HandlerDecl, MonitorDecl, MonitorStatement,
    NamespaceRef, Parameter,
};
pub use namespace::{NamespaceDecl, NamespaceStatement, VariableDecl};

use serde::{Deserialize, Serialize};

/// One compilation unit: the declarations of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationUnit {
    /// Package the declarations live in (`org.example`), if any.
    #[serde(default)]
    pub package: Option<String>,
    pub declarations: Vec<Declaration>,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Declaration {
    Monitor(MonitorDecl),
    Namespace(NamespaceDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Monitor(m) => &m.name,
            Declaration::Namespace(n) => &n.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Declaration::Monitor(_) => "monitor",
            Declaration::Namespace(_) => "namespace",
        }
    }
}

impl CompilationUnit {
    pub fn monitors(&self) -> impl Iterator<Item = &MonitorDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Monitor(m) => Some(m),
            Declaration::Namespace(_) => None,
        })
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &NamespaceDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Namespace(n) => Some(n),
            Declaration::Monitor(_) => None,
        })
    }

    /// `package.name`, or just `name` outside a package.
    pub fn qualify(&self, name: &str) -> String {
        match self.package.as_deref() {
            Some(package) if !package.is_empty() => format!("{package}.{name}"),
            _ => name.to_string(),
        }
    }
}
