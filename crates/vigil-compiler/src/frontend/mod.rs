//! Front ends loading source trees.
//!
//! Parsing and type checking of the monitoring language happen upstream; a
//! front end here only locates the resulting trees and loads them as
//! [`CompilationUnit`]s.

pub mod json;

use std::path::Path;

use crate::diagnostic::CompilerError;
use crate::ir::CompilationUnit;

pub use json::JsonFrontend;

/// Trait for source tree front ends.
pub trait Frontend {
    /// Short format name (`json`).
    fn format(&self) -> &str;

    /// File extensions this front end handles.
    fn extensions(&self) -> &[&str];

    /// Loads every source tree under `dir`, in path order.
    fn load_directory(&self, dir: &Path) -> Result<Vec<CompilationUnit>, CompilerError>;
}
