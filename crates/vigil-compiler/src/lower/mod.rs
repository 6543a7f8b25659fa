//! # Lowering
//!
//! Turns monitor and namespace declarations into [`GeneratedType`]s:
//!
//! - [`specifier`] - specifier trees to threshold fields and a predicate
//! - [`event`] - event declarations to fields and nested event types
//! - [`handler`] - handlers to body methods and nested dispatch adapters
//! - [`monitor`] - monitors to a type with constructor, pause and resume
//! - [`namespace`] - namespaces to a proxy tree plus a storage type
//! - [`route`] - routing of change events
//!
//! Every top-level declaration is lowered on its own: a failure is logged,
//! recorded in the [`LoweringReport`] and the remaining declarations are
//! still lowered and handed to the [`Acceptor`] exactly once each.

pub mod event;
pub mod handler;
pub mod monitor;
pub mod namespace;
pub mod route;
pub mod specifier;

use std::collections::BTreeMap;

use crate::codegen::rust_types::to_pascal_case;
use crate::diagnostic::CompilerError;
use crate::ir::{CompilationUnit, Declaration};
use crate::target::{Acceptor, GeneratedType, OutputChannel};
use crate::validate;

pub use route::{ChangeRoute, derive_change_route};
pub use specifier::{CompiledSpecifier, compile_specifier};

/// Root namespace names mapped to the canonical name of their proxy type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceIndex {
    roots: BTreeMap<String, String>,
}

impl NamespaceIndex {
    pub fn from_units(units: &[CompilationUnit]) -> Self {
        let mut index = Self::default();
        for unit in units {
            for namespace in unit.namespaces() {
                index.insert(&namespace.name, unit.qualify(&type_name(&namespace.name)));
            }
        }
        index
    }

    pub fn insert(&mut self, root: &str, canonical: impl Into<String>) {
        self.roots.insert(root.to_string(), canonical.into());
    }

    pub fn canonical_name(&self, root: &str) -> Option<&str> {
        self.roots.get(root).map(String::as_str)
    }

    pub fn contains(&self, root: &str) -> bool {
        self.roots.contains_key(root)
    }
}

/// Declaration that failed to lower.
#[derive(Debug)]
pub struct LoweringFailure {
    /// Qualified name of the declaration.
    pub declaration: String,
    pub error: CompilerError,
}

/// Outcome of lowering a set of units.
#[derive(Debug, Default)]
pub struct LoweringReport {
    /// Qualified names of accepted declarations, in order.
    pub accepted: Vec<String>,
    pub failures: Vec<LoweringFailure>,
}

impl LoweringReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Monitor being lowered.
#[derive(Debug, Clone)]
pub struct MonitorScope<'a> {
    /// Qualified monitor name (`demo.Perf`).
    pub qualified_name: String,
    /// Generated type name (`Perf`).
    pub type_name: String,
    pub namespaces: &'a NamespaceIndex,
}

impl MonitorScope<'_> {
    /// Name of a nested type derived from member `member`.
    pub fn nested_name(&self, member: &str, suffix: &str) -> String {
        format!("{}{}{suffix}", self.type_name, to_pascal_case(member))
    }

    /// Qualified name of member `member`.
    pub fn member(&self, member: &str) -> String {
        format!("{}.{member}", self.qualified_name)
    }
}

/// Generated type name of a declaration.
pub fn type_name(declared: &str) -> String {
    to_pascal_case(declared)
}

/// Lowers every declaration of `units`, validating each one first when
/// `validate` is set.
pub fn lower_units(
    units: &[CompilationUnit],
    validate: bool,
    acceptor: &mut dyn Acceptor,
) -> LoweringReport {
    let namespaces = NamespaceIndex::from_units(units);
    let mut report = LoweringReport::default();

    for unit in units {
        for declaration in &unit.declarations {
            let qualified = unit.qualify(declaration.name());
            let result = if validate {
                validate::validate_declaration(declaration, &namespaces)
                    .and_then(|()| lower_declaration(unit, declaration, &namespaces))
            } else {
                lower_declaration(unit, declaration, &namespaces)
            };

            match result {
                Ok(generated) => {
                    tracing::debug!(
                        declaration = %qualified,
                        kind = declaration.kind_name(),
                        types = generated.walk().len(),
                        "lowered"
                    );
                    acceptor.accept(generated, OutputChannel::Monitors);
                    report.accepted.push(qualified);
                }
                Err(error) => {
                    tracing::warn!(declaration = %qualified, error = %error, "lowering failed");
                    report.failures.push(LoweringFailure {
                        declaration: qualified,
                        error,
                    });
                }
            }
        }
    }

    report
}

/// Lowers and validates one unit on its own.
pub fn lower_unit(unit: &CompilationUnit, acceptor: &mut dyn Acceptor) -> LoweringReport {
    lower_units(std::slice::from_ref(unit), true, acceptor)
}

/// Lowers one top-level declaration.
pub fn lower_declaration(
    unit: &CompilationUnit,
    declaration: &Declaration,
    namespaces: &NamespaceIndex,
) -> Result<GeneratedType, CompilerError> {
    match declaration {
        Declaration::Monitor(decl) => monitor::lower_monitor(unit, decl, namespaces),
        Declaration::Namespace(decl) => Ok(namespace::lower_namespace(unit, decl)),
    }
}
