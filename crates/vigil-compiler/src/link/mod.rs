//! Linking lowered types into live runtime objects.
//!
//! The linker is the in-process counterpart of `codegen`: instead of
//! rendering source for a later build, it interprets the target
//! representation against a [`RuntimeContext`]. Namespaces are linked before
//! monitors, since a monitor's `initialize` binds the proxies of the
//! namespaces it uses.

mod bindings;
mod monitor;
mod namespace;

pub use bindings::{Bindings, CodeFn, HandlerFn, ValueFn};
pub use monitor::{LinkedEvent, LinkedHandler, LinkedMonitor};

use std::collections::BTreeMap;
use std::sync::Arc;

use vigil_runtime::context::RuntimeContext;
use vigil_runtime::proxy::NamespaceProxy;

use crate::diagnostic::CompilerError;
use crate::target::{GeneratedType, TypeKind};

/// Everything produced by [`Linker::link_all`].
pub struct Linked {
    /// Root namespace proxies by namespace name.
    pub namespaces: BTreeMap<String, Arc<NamespaceProxy>>,
    /// Monitors in declaration order.
    pub monitors: Vec<Arc<LinkedMonitor>>,
}

pub struct Linker {
    context: RuntimeContext,
    bindings: Bindings,
    namespaces: BTreeMap<String, Arc<NamespaceProxy>>,
}

impl Linker {
    pub fn new(context: RuntimeContext, bindings: Bindings) -> Self {
        Self {
            context,
            bindings,
            namespaces: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// Links a root namespace and registers it for later monitors.
    pub fn link_namespace(
        &mut self,
        generated: &GeneratedType,
    ) -> Result<Arc<NamespaceProxy>, CompilerError> {
        let TypeKind::NamespaceProxy { root, .. } = &generated.kind else {
            return Err(CompilerError::link(
                &generated.qualified_name,
                "not a namespace proxy",
            ));
        };
        if self.namespaces.contains_key(root) {
            return Err(CompilerError::link(
                &generated.qualified_name,
                format!("namespace '{root}' is already linked"),
            ));
        }
        let proxy = namespace::link_namespace(generated, &self.context, &self.bindings)?;
        self.namespaces.insert(root.clone(), proxy.clone());
        Ok(proxy)
    }

    /// Links a monitor against the namespaces registered so far.
    pub fn link_monitor(
        &self,
        generated: &GeneratedType,
    ) -> Result<Arc<LinkedMonitor>, CompilerError> {
        monitor::link_monitor(generated, &self.context, &self.bindings, &self.namespaces)
    }

    /// Links all namespaces of `types`, then all monitors.
    pub fn link_all(&mut self, types: &[GeneratedType]) -> Result<Linked, CompilerError> {
        for generated in types {
            if matches!(generated.kind, TypeKind::NamespaceProxy { .. }) {
                self.link_namespace(generated)?;
            }
        }
        let monitors = types
            .iter()
            .filter(|generated| generated.kind == TypeKind::Monitor)
            .map(|generated| self.link_monitor(generated))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            namespaces = self.namespaces.len(),
            monitors = monitors.len(),
            "linked"
        );
        Ok(Linked {
            namespaces: self.namespaces.clone(),
            monitors,
        })
    }

    pub fn namespace(&self, name: &str) -> Option<Arc<NamespaceProxy>> {
        self.namespaces.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::CompilationUnit;
    use crate::lower::lower_unit;
    use crate::target::CollectingAcceptor;
    use serde_json::json;
    use vigil_runtime::monitor::Monitor;

    fn types() -> Vec<GeneratedType> {
        let unit: CompilationUnit = serde_json::from_value(json!({
            "package": "demo",
            "declarations": [
                { "kind": "monitor", "name": "Watch", "usings": [{ "name": "mem" }], "body": [] },
                { "kind": "namespace", "name": "mem", "body": [
                    { "kind": "variable", "name": "free", "initializer": { "kind": "literal", "value": { "number": "1" } }, "writable": true }
                ] }
            ]
        }))
        .unwrap();
        let mut acceptor = CollectingAcceptor::new();
        assert!(lower_unit(&unit, &mut acceptor).is_clean());
        acceptor.into_types()
    }

    #[test]
    fn namespaces_link_before_monitors() {
        let mut linker = Linker::new(RuntimeContext::local(), Bindings::new());
        let linked = linker.link_all(&types()).unwrap();

        assert_eq!(linked.namespaces.keys().collect::<Vec<_>>(), ["mem"]);
        assert_eq!(linked.monitors.len(), 1);
        let monitor = &linked.monitors[0];
        assert_eq!(monitor.name(), "demo.Watch");
        assert_eq!(monitor.namespace("mem").unwrap().get("free").unwrap(), json!(1));
        assert!(linker.namespace("mem").unwrap().is_connected());
    }

    #[test]
    fn a_namespace_links_once() {
        let types = types();
        let mut linker = Linker::new(RuntimeContext::local(), Bindings::new());
        linker.link_namespace(&types[1]).unwrap();
        assert!(linker.link_namespace(&types[1]).is_err());
        assert!(linker.link_namespace(&types[0]).is_err());
    }
}
