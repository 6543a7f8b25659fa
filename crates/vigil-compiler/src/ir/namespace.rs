//! Namespace declarations.

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use crate::diagnostic::Span;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    pub name: String,
    #[serde(default)]
    pub body: Vec<NamespaceStatement>,
    #[serde(default)]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NamespaceStatement {
    Variable(VariableDecl),
    Namespace(NamespaceDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    /// Declared or inferred type, as written by the front end.
    #[serde(default)]
    pub typ: Option<String>,
    pub initializer: Expr,
    #[serde(default)]
    pub writable: bool,
}

impl NamespaceDecl {
    pub fn variables(&self) -> impl Iterator<Item = &VariableDecl> {
        self.body.iter().filter_map(|s| match s {
            NamespaceStatement::Variable(v) => Some(v),
            NamespaceStatement::Namespace(_) => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &NamespaceDecl> {
        self.body.iter().filter_map(|s| match s {
            NamespaceStatement::Namespace(n) => Some(n),
            NamespaceStatement::Variable(_) => None,
        })
    }
}
