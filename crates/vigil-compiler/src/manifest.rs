//! Routing manifest.
//!
//! The manifest (`vigil.manifest.json`) is written next to the generated code.
//! It records, per monitor, where every event binds on the message bus and
//! which handlers exist, and per namespace the exchange its writes publish
//! on. Operators use it to provision queues; `vigil check` prints it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vigil_runtime::event::EventType;

use crate::codegen::rust_types::literal_value;
use crate::diagnostic::CompilerError;
use crate::ir::Expr;
use crate::target::{DeliveryFilter, FieldType, GeneratedType, Method, Stmt, TypeKind};

/// The manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// The complete routing manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingManifest {
    pub version: String,

    /// When this manifest was generated (RFC 3339).
    pub generated_at: String,

    pub compiler_version: String,

    /// Monitors keyed by qualified name.
    pub monitors: BTreeMap<String, MonitorEntry>,

    /// Root namespaces keyed by name.
    pub namespaces: BTreeMap<String, NamespaceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorEntry {
    pub type_name: String,
    /// Root namespaces the monitor imports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usings: Vec<String>,
    pub events: Vec<EventEntry>,
    pub handlers: Vec<HandlerEntry>,
    /// Number of custom code blocks run at construction.
    pub code_blocks: usize,
}

/// One event member and its binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub name: String,
    /// `periodic`, `probe` or `change`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_path: Option<String>,
    #[serde(default)]
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub exchange: String,
    pub routing_key: String,
    pub queue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerEntry {
    pub name: String,
    pub payload: EventType,
    pub adapter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceEntry {
    pub type_name: String,
    /// Exchange change events publish on.
    pub exchange: String,
    /// Qualified variable names with their initial values.
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl RoutingManifest {
    /// Builds the manifest of the given top-level types.
    pub fn from_types<'a>(types: impl IntoIterator<Item = &'a GeneratedType>) -> Self {
        let mut manifest = Self {
            version: MANIFEST_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
            monitors: BTreeMap::new(),
            namespaces: BTreeMap::new(),
        };

        for generated in types {
            match &generated.kind {
                TypeKind::Monitor => {
                    manifest
                        .monitors
                        .insert(generated.qualified_name.clone(), monitor_entry(generated));
                }
                TypeKind::NamespaceProxy { root, .. } => {
                    manifest
                        .namespaces
                        .insert(root.clone(), namespace_entry(generated));
                }
                _ => {}
            }
        }

        manifest
    }

    /// Load a manifest from disk.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, CompilerError> {
        if !path.exists() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| CompilerError::io(path, e.to_string()))?;
        let manifest: Self = serde_json::from_str(&content).map_err(|e| {
            CompilerError::io(path, format!("Failed to parse manifest: {}", e))
        })?;

        Ok(Some(manifest))
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        serde_json::to_string_pretty(self).map_err(|e| CompilerError::CodegenFailed {
            message: format!("Failed to serialize manifest: {}", e),
        })
    }

    /// Every bus binding, sorted by queue.
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut bindings: Vec<&Binding> = self
            .monitors
            .values()
            .flat_map(|m| m.events.iter().filter_map(|e| e.binding.as_ref()))
            .collect();
        bindings.sort_by(|a, b| a.queue.cmp(&b.queue));
        bindings
    }
}

fn monitor_entry(monitor: &GeneratedType) -> MonitorEntry {
    let mut entry = MonitorEntry {
        type_name: monitor.name.clone(),
        usings: Vec::new(),
        events: Vec::new(),
        handlers: Vec::new(),
        code_blocks: monitor
            .methods
            .iter()
            .filter(|m| is_code_block(m))
            .count(),
    };

    for field in &monitor.fields {
        match &field.ty {
            FieldType::Proxy { namespace } => entry.usings.push(namespace.clone()),
            FieldType::Periodic => entry.events.push(EventEntry {
                name: field.name.clone(),
                kind: "periodic".to_string(),
                payload: Some(EventType::Interval),
                cron: match &field.init {
                    Some(crate::target::FieldInit::Cron { expression }) => Some(expression.clone()),
                    _ => None,
                },
                binding: None,
                variable_path: None,
                filtered: false,
            }),
            FieldType::Event { type_name } => {
                if let Some(nested) = monitor.nested_type(type_name) {
                    entry.events.push(event_entry(&field.name, nested));
                }
            }
            FieldType::Handler { type_name } => {
                let payload = match monitor.nested_type(type_name).map(|t| &t.kind) {
                    Some(TypeKind::IntervalJob { .. }) => Some(EventType::Interval),
                    Some(TypeKind::ObserverAdapter { payload, .. }) => Some(*payload),
                    _ => None,
                };
                if let Some(payload) = payload {
                    entry.handlers.push(HandlerEntry {
                        name: field.name.clone(),
                        payload,
                        adapter: type_name.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    entry
}

fn event_entry(name: &str, event: &GeneratedType) -> EventEntry {
    let (kind, payload) = match &event.kind {
        TypeKind::ProbeEvent { payload, .. } => ("probe", Some(*payload)),
        TypeKind::ChangeEvent { .. } => ("change", Some(EventType::Change)),
        _ => ("unknown", None),
    };

    let mut entry = EventEntry {
        name: name.to_string(),
        kind: kind.to_string(),
        payload,
        cron: None,
        binding: None,
        variable_path: None,
        filtered: false,
    };

    for stmt in flatten(&event.constructor) {
        if let Stmt::StartConsumer {
            exchange,
            routing_key,
            queue,
            filter,
        } = stmt
        {
            entry.binding = Some(Binding {
                exchange: exchange.clone(),
                routing_key: routing_key.clone(),
                queue: queue.clone(),
            });
            if let DeliveryFilter::VariablePath { path, predicate } = filter {
                entry.variable_path = Some(path.clone());
                entry.filtered = predicate.is_some();
            }
        }
    }

    entry
}

fn namespace_entry(root: &GeneratedType) -> NamespaceEntry {
    let exchange = flatten(&root.constructor)
        .find_map(|stmt| match stmt {
            Stmt::ConnectStore { exchange, .. } => Some(exchange.clone()),
            _ => None,
        })
        .unwrap_or_else(|| root.qualified_name.clone());

    let variables = root
        .walk()
        .into_iter()
        .filter(|t| t.kind == TypeKind::NamespaceStorage)
        .flat_map(|t| t.constructor.iter())
        .filter_map(|stmt| match stmt {
            Stmt::RegisterVariable {
                qualified_name,
                initializer,
                ..
            } => Some((qualified_name.clone(), initial_value(initializer))),
            _ => None,
        })
        .collect();

    NamespaceEntry {
        type_name: root.name.clone(),
        exchange,
        variables,
    }
}

/// Literal initializers by value, anything else by its source text.
fn initial_value(initializer: &Expr) -> serde_json::Value {
    match initializer {
        Expr::Literal { value } => literal_value(value),
        other => serde_json::Value::String(other.to_string()),
    }
}

fn is_code_block(method: &Method) -> bool {
    method.body.iter().any(|stmt| {
        matches!(
            stmt,
            Stmt::UserCode {
                origin: crate::target::CodeOrigin::Block { .. },
                ..
            }
        )
    })
}

/// Statements of `body`, descending into failure boundaries.
fn flatten(body: &[Stmt]) -> impl Iterator<Item = &Stmt> {
    body.iter().flat_map(|stmt| match stmt {
        Stmt::Guarded { body, .. } => body.iter().collect::<Vec<_>>(),
        other => vec![other],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompilationUnit, Declaration, NamespaceDecl, NamespaceStatement, VariableDecl};
    use crate::lower::lower_unit;
    use crate::target::CollectingAcceptor;
    use tempfile::TempDir;

    fn unit() -> CompilationUnit {
        serde_json::from_value(serde_json::json!({
            "package": "demo",
            "declarations": [
                { "kind": "namespace", "name": "cpu", "body": [
                    { "kind": "variable", "name": "load", "initializer": { "kind": "literal", "value": { "number": "0" } }, "writable": true }
                ] },
                { "kind": "monitor", "name": "Perf", "usings": [{ "name": "cpu" }], "body": [
                    { "kind": "event", "name": "tick", "emitter": { "kind": "periodic", "cron": "* * * * *" } },
                    { "kind": "event", "name": "hot", "emitter": {
                        "kind": "typed", "eventKind": "CHANGE",
                        "emitter": { "kind": "featureCall", "feature": "load", "receiver": { "kind": "featureCall", "feature": "cpu" } },
                        "specifier": { "kind": "relational", "operator": "ABOVE", "value": { "kind": "literal", "value": { "number": "90" } } }
                    } },
                    { "kind": "handler", "name": "onHot", "param": { "name": "e", "typ": "ChangeEvent" }, "body": { "source": "" } },
                    { "kind": "code", "source": "self.hot.subscribe(self.on_hot.clone());" }
                ] }
            ]
        }))
        .unwrap()
    }

    fn manifest() -> RoutingManifest {
        let mut acceptor = CollectingAcceptor::new();
        let report = lower_unit(&unit(), &mut acceptor);
        assert!(report.is_clean());
        RoutingManifest::from_types(acceptor.types())
    }

    #[test]
    fn records_change_bindings() {
        let manifest = manifest();
        let perf = &manifest.monitors["demo.Perf"];
        assert_eq!(perf.usings, ["cpu"]);
        assert_eq!(perf.code_blocks, 1);

        let hot = perf.events.iter().find(|e| e.name == "hot").unwrap();
        assert_eq!(hot.kind, "change");
        assert!(hot.filtered);
        assert_eq!(hot.variable_path.as_deref(), Some("load"));
        assert_eq!(
            hot.binding,
            Some(Binding {
                exchange: "demo.Cpu".to_string(),
                routing_key: "cpu".to_string(),
                queue: "demo.Perf.hot.cpu.load".to_string(),
            })
        );

        let tick = perf.events.iter().find(|e| e.name == "tick").unwrap();
        assert_eq!(tick.cron.as_deref(), Some("* * * * *"));
        assert_eq!(perf.handlers[0].payload, EventType::Change);
    }

    #[test]
    fn records_namespace_exchanges() {
        let manifest = manifest();
        let cpu = &manifest.namespaces["cpu"];
        assert_eq!(cpu.exchange, "demo.Cpu");
        assert_eq!(cpu.variables["cpu.load"], serde_json::json!(0));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vigil.manifest.json");
        let manifest = manifest();
        std::fs::write(&path, manifest.to_json().unwrap()).unwrap();

        let loaded = RoutingManifest::load(&path).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        assert!(RoutingManifest::load(&dir.path().join("missing.json")).unwrap().is_none());
    }

    #[test]
    fn unpackaged_namespaces_publish_on_their_type_name() {
        let unit = CompilationUnit {
            package: None,
            declarations: vec![Declaration::Namespace(NamespaceDecl {
                name: "mem".to_string(),
                body: vec![NamespaceStatement::Variable(VariableDecl {
                    name: "free".to_string(),
                    typ: None,
                    initializer: Expr::number("1"),
                    writable: false,
                })],
                span: None,
            })],
        };
        let mut acceptor = CollectingAcceptor::new();
        lower_unit(&unit, &mut acceptor);
        let manifest = RoutingManifest::from_types(acceptor.types());
        assert_eq!(manifest.namespaces["mem"].exchange, "Mem");
        assert!(manifest.monitors.is_empty());
    }
}
