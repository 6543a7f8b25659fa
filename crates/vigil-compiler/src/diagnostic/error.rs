//! Compiler error types.
#![allow(unused_assignments)]

use std::path::PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur during compilation.
#[allow(unused_assignments)]
#[derive(Error, Diagnostic, Debug)]
pub enum CompilerError {
    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("Failed to read file '{path}': {message}")]
    #[diagnostic(code(vigil::io::read_error))]
    IoError {
        path: PathBuf,
        message: String,
    },

    // =========================================================================
    // Source Tree Errors
    // =========================================================================
    #[error("Invalid source tree in {}: {message}", path.display())]
    #[diagnostic(
        code(vigil::tree::invalid),
        help("Source trees are JSON documents produced by the Vigil front end; unknown node kinds and operators are rejected")
    )]
    InvalidTree {
        path: PathBuf,
        message: String,
    },

    #[error("No source trees found in {}", dir.display())]
    #[diagnostic(
        code(vigil::tree::empty_input),
        help("Place one JSON source tree per compilation unit in the input directory")
    )]
    NoSourceTrees {
        dir: PathBuf,
    },

    // =========================================================================
    // Structure Errors
    // =========================================================================
    #[error("Duplicate {kind} '{name}' in '{scope}'")]
    #[diagnostic(code(vigil::structure::duplicate_member))]
    DuplicateMember {
        kind: &'static str,
        name: String,
        scope: String,
    },

    #[error("{kind} '{name}' in '{scope}' uses a name reserved by generated code")]
    #[diagnostic(
        code(vigil::structure::reserved_member),
        help("Rename the member; {reserved} are taken in this scope")
    )]
    ReservedMember {
        kind: &'static str,
        name: String,
        scope: String,
        reserved: String,
    },

    #[error("Handler '{handler}' in monitor '{monitor}' takes unknown event type '{type_name}'")]
    #[diagnostic(
        code(vigil::structure::unknown_event_type),
        help("Handler parameters must be one of IntervalEvent, InvokeEvent, ReturnEvent, ExceptionEvent, TimeLapseEvent, ChangeEvent")
    )]
    UnknownEventType {
        monitor: String,
        handler: String,
        type_name: String,
    },

    #[error("Monitor '{monitor}' uses unknown namespace '{namespace}'")]
    #[diagnostic(code(vigil::structure::unknown_namespace))]
    UnknownNamespace {
        monitor: String,
        namespace: String,
    },

    // =========================================================================
    // Lowering Errors
    // =========================================================================
    #[error("Specifier threshold must be a numeric literal, found {found}")]
    #[diagnostic(
        code(vigil::lower::invalid_threshold),
        help("Specifier thresholds must be number literals or numeric string literals")
    )]
    InvalidThreshold {
        found: String,
    },

    #[error("Change event '{event}' in monitor '{monitor}' has an empty emitter chain")]
    #[diagnostic(
        code(vigil::lower::empty_emitter),
        help("Change events are raised by a namespace variable, e.g. `cpu.limits.max`")
    )]
    EmptyEmitter {
        monitor: String,
        event: String,
    },

    #[error("Specifier on non-change event '{event}'")]
    #[diagnostic(
        code(vigil::lower::misplaced_specifier),
        help("Only CHANGE events carry a value pair a specifier can filter")
    )]
    MisplacedSpecifier {
        event: String,
    },

    // =========================================================================
    // Code Generation Errors
    // =========================================================================
    #[error("Failed to generate Rust code: {message}")]
    #[diagnostic(code(vigil::codegen::generation_failed))]
    CodegenFailed {
        message: String,
    },

    // =========================================================================
    // Link Errors
    // =========================================================================
    #[error("Cannot link '{name}': {message}")]
    #[diagnostic(code(vigil::link::failed))]
    LinkFailed {
        name: String,
        message: String,
    },
}

impl CompilerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a link error.
    pub fn link(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::LinkFailed {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
