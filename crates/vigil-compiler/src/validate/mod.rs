//! Validation of source trees.
//!
//! The front end has already type-checked the tree; these checks cover what
//! lowering relies on and the front end cannot see, such as name clashes
//! in generated code and `using` clauses naming a namespace from another
//! compilation unit.

mod structure;

use crate::diagnostic::CompilerError;
use crate::ir::Declaration;
use crate::lower::NamespaceIndex;

/// Validates one top-level declaration.
pub fn validate_declaration(
    declaration: &Declaration,
    namespaces: &NamespaceIndex,
) -> Result<(), CompilerError> {
    match declaration {
        Declaration::Monitor(monitor) => structure::validate_monitor(monitor, namespaces),
        Declaration::Namespace(namespace) => structure::validate_namespace(namespace),
    }
}
