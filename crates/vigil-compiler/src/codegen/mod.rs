//! Rust code generation from the target representation.
//!
//! Every accepted monitor and root namespace becomes one Rust module written
//! against `vigil_runtime::prelude`. Module indexes and the routing manifest
//! go to the secondary channel.

mod body;
pub mod monitor;
pub mod namespace;
pub mod project;
pub mod rust_types;

use std::collections::BTreeSet;

use crate::diagnostic::CompilerError;
use crate::frontend::json::MANIFEST_FILE;
use crate::manifest::RoutingManifest;
use crate::target::{GeneratedType, OutputChannel, TypeKind};
use rust_types::to_snake_case;

/// Generated Rust code.
pub struct GeneratedCode {
    /// Relative path, content and output channel of every file.
    pub files: Vec<(String, String, OutputChannel)>,
}

impl GeneratedCode {
    /// Files of `channel`, in emission order.
    pub fn channel(&self, channel: OutputChannel) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .filter(move |(_, _, c)| *c == channel)
            .map(|(path, content, _)| (path.as_str(), content.as_str()))
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(p, _, _)| p == path)
            .map(|(_, content, _)| content.as_str())
    }
}

/// Generates Rust modules for the accepted top-level types.
pub fn generate(types: &[GeneratedType], emit_manifest: bool) -> Result<GeneratedCode, CompilerError> {
    let mut files = Vec::new();
    let mut monitors = Vec::new();
    let mut namespaces = Vec::new();
    let mut paths = BTreeSet::new();

    for generated in types {
        let (dir, code) = match &generated.kind {
            TypeKind::Monitor => ("monitors", monitor::generate_monitor(generated)?),
            TypeKind::NamespaceProxy { .. } => ("namespaces", namespace::generate_namespace(generated)?),
            _ => {
                return Err(CompilerError::CodegenFailed {
                    message: format!("'{}' is not a top-level type", generated.qualified_name),
                });
            }
        };

        let path = format!("{dir}/{}.rs", to_snake_case(&generated.name));
        if !paths.insert(path.clone()) {
            return Err(CompilerError::CodegenFailed {
                message: format!(
                    "'{}' maps to module {path}, which is already generated",
                    generated.qualified_name
                ),
            });
        }
        tracing::debug!(path = %path, declaration = %generated.qualified_name, "generated");
        files.push((path, code, OutputChannel::Monitors));

        match dir {
            "monitors" => monitors.push(generated.name.clone()),
            _ => namespaces.push(generated.name.clone()),
        }
    }

    files.push((
        "mod.rs".to_string(),
        project::generate_root_index(),
        OutputChannel::Secondary,
    ));
    files.push((
        "monitors/mod.rs".to_string(),
        project::generate_monitor_index(&monitors),
        OutputChannel::Secondary,
    ));
    files.push((
        "namespaces/mod.rs".to_string(),
        project::generate_namespace_index(&namespaces),
        OutputChannel::Secondary,
    ));

    if emit_manifest {
        let manifest = RoutingManifest::from_types(types);
        files.push((
            MANIFEST_FILE.to_string(),
            manifest.to_json()?,
            OutputChannel::Secondary,
        ));
    }

    Ok(GeneratedCode { files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::CompilationUnit;
    use crate::lower::lower_unit;
    use crate::target::CollectingAcceptor;

    fn types() -> Vec<GeneratedType> {
        let unit: CompilationUnit = serde_json::from_value(serde_json::json!({
            "package": "demo",
            "declarations": [
                { "kind": "namespace", "name": "cpu", "body": [
                    { "kind": "variable", "name": "load", "initializer": { "kind": "literal", "value": { "number": "0" } }, "writable": true }
                ] },
                { "kind": "monitor", "name": "HighLoad", "usings": [{ "name": "cpu" }], "body": [
                    { "kind": "event", "name": "hot", "emitter": {
                        "kind": "typed", "eventKind": "CHANGE",
                        "emitter": { "kind": "featureCall", "feature": "load", "receiver": { "kind": "featureCall", "feature": "cpu" } }
                    } }
                ] }
            ]
        }))
        .unwrap();
        let mut acceptor = CollectingAcceptor::new();
        assert!(lower_unit(&unit, &mut acceptor).is_clean());
        acceptor.into_types()
    }

    #[test]
    fn files_land_on_their_channels() {
        let code = generate(&types(), true).unwrap();
        let primary: Vec<_> = code.channel(OutputChannel::Monitors).map(|(p, _)| p).collect();
        assert_eq!(primary, ["namespaces/cpu.rs", "monitors/high_load.rs"]);
        let secondary: Vec<_> = code.channel(OutputChannel::Secondary).map(|(p, _)| p).collect();
        assert_eq!(
            secondary,
            ["mod.rs", "monitors/mod.rs", "namespaces/mod.rs", MANIFEST_FILE]
        );
        assert!(code.file("monitors/mod.rs").unwrap().contains("pub use high_load::HighLoad;"));
    }

    #[test]
    fn manifest_is_optional() {
        let code = generate(&types(), false).unwrap();
        assert!(code.file(MANIFEST_FILE).is_none());
    }

    #[test]
    fn colliding_modules_are_rejected() {
        let mut types = types();
        types.push(types[1].clone());
        let err = generate(&types, false).err().unwrap();
        assert!(matches!(err, CompilerError::CodegenFailed { .. }));
    }
}
