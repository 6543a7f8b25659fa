//! Structure validation for monitors and namespaces.
//!
//! Member names are compared in their generated (snake_case) form, so
//! `onTick` and `on_tick` clash.

use std::collections::HashSet;

use vigil_runtime::event::EventType;

use crate::codegen::rust_types::to_snake_case;
use crate::diagnostic::CompilerError;
use crate::ir::{MonitorDecl, MonitorStatement, NamespaceDecl, NamespaceStatement};
use crate::lower::NamespaceIndex;

/// Members every generated monitor defines.
const MONITOR_RESERVED: &[&str] = &[
    "new",
    "initialize",
    "pause",
    "resume",
    "is_paused",
    "name",
    "events",
    "core",
    "context",
];

/// Members every generated namespace proxy defines.
const NAMESPACE_RESERVED: &[&str] = &["new", "connection", "root"];

pub fn validate_monitor(monitor: &MonitorDecl, namespaces: &NamespaceIndex) -> Result<(), CompilerError> {
    let mut seen = Members::new(&monitor.name, MONITOR_RESERVED);

    for using in &monitor.usings {
        if !namespaces.contains(&using.name) {
            return Err(CompilerError::UnknownNamespace {
                monitor: monitor.name.clone(),
                namespace: using.name.clone(),
            });
        }
        seen.insert("namespace", &using.name)?;
    }

    for statement in &monitor.body {
        match statement {
            MonitorStatement::Variable(variable) => seen.insert("variable", &variable.name)?,
            MonitorStatement::Event(event) => seen.insert("event", &event.name)?,
            MonitorStatement::Handler(handler) => {
                seen.insert("handler", &handler.name)?;
                if EventType::from_type_name(&handler.param.typ).is_none() {
                    return Err(CompilerError::UnknownEventType {
                        monitor: monitor.name.clone(),
                        handler: handler.name.clone(),
                        type_name: handler.param.typ.clone(),
                    });
                }
            }
            MonitorStatement::Code(_) => {}
        }
    }

    Ok(())
}

pub fn validate_namespace(namespace: &NamespaceDecl) -> Result<(), CompilerError> {
    validate_namespace_at(namespace, &namespace.name)
}

fn validate_namespace_at(namespace: &NamespaceDecl, path: &str) -> Result<(), CompilerError> {
    let mut seen = Members::new(path, NAMESPACE_RESERVED);
    for statement in &namespace.body {
        match statement {
            NamespaceStatement::Variable(variable) => seen.insert("variable", &variable.name)?,
            NamespaceStatement::Namespace(child) => {
                seen.insert("namespace", &child.name)?;
                validate_namespace_at(child, &format!("{path}.{}", child.name))?;
            }
        }
    }

    // Child accessors share the method namespace with variable getters and setters.
    for child in namespace.children() {
        let generated = to_snake_case(&child.name);
        let shadows = namespace.variables().any(|variable| {
            let name = to_snake_case(&variable.name);
            generated == format!("get_{name}") || generated == format!("set_{name}")
        });
        if shadows {
            return Err(CompilerError::DuplicateMember {
                kind: "namespace",
                name: child.name.clone(),
                scope: path.to_string(),
            });
        }
    }
    Ok(())
}

struct Members<'a> {
    scope: &'a str,
    reserved: &'static [&'static str],
    names: HashSet<String>,
}

impl<'a> Members<'a> {
    fn new(scope: &'a str, reserved: &'static [&'static str]) -> Self {
        Self {
            scope,
            reserved,
            names: HashSet::new(),
        }
    }

    fn insert(&mut self, kind: &'static str, name: &str) -> Result<(), CompilerError> {
        let generated = to_snake_case(name);
        if self.reserved.contains(&generated.as_str()) || generated.starts_with("code_") {
            return Err(CompilerError::ReservedMember {
                kind,
                name: name.to_string(),
                scope: self.scope.to_string(),
                reserved: self.reserved.join(", "),
            });
        }
        if !self.names.insert(generated) {
            return Err(CompilerError::DuplicateMember {
                kind,
                name: name.to_string(),
                scope: self.scope.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CodeBlock, Expr, HandlerDecl, NamespaceRef, Parameter, VariableDecl};

    fn variable(name: &str) -> VariableDecl {
        VariableDecl {
            name: name.to_string(),
            typ: None,
            initializer: Expr::number("0"),
            writable: false,
        }
    }

    fn handler(name: &str, typ: &str) -> MonitorStatement {
        MonitorStatement::Handler(HandlerDecl {
            name: name.to_string(),
            param: Parameter {
                name: "e".to_string(),
                typ: typ.to_string(),
            },
            body: CodeBlock {
                source: String::new(),
            },
            doc: None,
            span: None,
        })
    }

    fn namespace(name: &str, body: Vec<NamespaceStatement>) -> NamespaceDecl {
        NamespaceDecl {
            name: name.to_string(),
            body,
            span: None,
        }
    }

    fn monitor(body: Vec<MonitorStatement>) -> MonitorDecl {
        MonitorDecl {
            name: "Perf".to_string(),
            usings: Vec::new(),
            body,
            span: None,
        }
    }

    #[test]
    fn accepts_distinct_members() {
        let decl = monitor(vec![
            MonitorStatement::Variable(variable("count")),
            handler("onTick", "IntervalEvent"),
        ]);
        assert!(validate_monitor(&decl, &NamespaceIndex::default()).is_ok());
    }

    #[test]
    fn rejects_clashing_generated_names() {
        let decl = monitor(vec![
            MonitorStatement::Variable(variable("on_tick")),
            handler("onTick", "IntervalEvent"),
        ]);
        let err = validate_monitor(&decl, &NamespaceIndex::default()).unwrap_err();
        assert!(matches!(err, CompilerError::DuplicateMember { kind: "handler", .. }));
    }

    #[test]
    fn rejects_reserved_names() {
        let decl = monitor(vec![handler("pause", "IntervalEvent")]);
        assert!(validate_monitor(&decl, &NamespaceIndex::default()).is_err());
        let decl = monitor(vec![MonitorStatement::Variable(variable("code_0"))]);
        assert!(validate_monitor(&decl, &NamespaceIndex::default()).is_err());
    }

    #[test]
    fn monitor_members_cannot_take_generated_field_names() {
        let decl = monitor(vec![MonitorStatement::Variable(variable("context"))]);
        let err = validate_monitor(&decl, &NamespaceIndex::default()).unwrap_err();
        assert!(matches!(
            err,
            CompilerError::ReservedMember { kind: "variable", name, .. } if name == "context"
        ));

        let decl = monitor(vec![handler("isPaused", "IntervalEvent")]);
        assert!(matches!(
            validate_monitor(&decl, &NamespaceIndex::default()),
            Err(CompilerError::ReservedMember { kind: "handler", .. })
        ));
    }

    #[test]
    fn namespace_members_cannot_take_proxy_internals() {
        for name in ["connection", "root", "new"] {
            let ns = namespace(
                "cpu",
                vec![NamespaceStatement::Namespace(namespace(
                    name,
                    vec![NamespaceStatement::Variable(variable("max"))],
                ))],
            );
            let err = validate_namespace(&ns).unwrap_err();
            assert!(
                matches!(&err, CompilerError::ReservedMember { kind: "namespace", scope, .. } if scope == "cpu"),
                "{name}: {err:?}"
            );
        }

        let ns = namespace(
            "cpu",
            vec![NamespaceStatement::Namespace(namespace(
                "limits",
                vec![NamespaceStatement::Variable(variable("connection"))],
            ))],
        );
        assert!(matches!(
            validate_namespace(&ns),
            Err(CompilerError::ReservedMember { scope, .. }) if scope == "cpu.limits"
        ));
    }

    #[test]
    fn child_namespaces_cannot_shadow_accessors() {
        let ns = namespace(
            "cpu",
            vec![
                NamespaceStatement::Namespace(namespace("getLoad", Vec::new())),
                NamespaceStatement::Variable(variable("load")),
            ],
        );
        assert!(matches!(
            validate_namespace(&ns),
            Err(CompilerError::DuplicateMember { kind: "namespace", .. })
        ));
    }

    #[test]
    fn rejects_unknown_usings_and_event_types() {
        let mut decl = monitor(Vec::new());
        decl.usings.push(NamespaceRef {
            name: "mem".to_string(),
        });
        assert!(matches!(
            validate_monitor(&decl, &NamespaceIndex::default()),
            Err(CompilerError::UnknownNamespace { .. })
        ));

        let decl = monitor(vec![handler("onX", "Whatever")]);
        assert!(matches!(
            validate_monitor(&decl, &NamespaceIndex::default()),
            Err(CompilerError::UnknownEventType { .. })
        ));
    }

    #[test]
    fn nested_namespaces_are_checked_per_level() {
        let ns = NamespaceDecl {
            name: "cpu".to_string(),
            body: vec![
                NamespaceStatement::Variable(variable("max")),
                NamespaceStatement::Namespace(NamespaceDecl {
                    name: "limits".to_string(),
                    body: vec![
                        NamespaceStatement::Variable(variable("max")),
                        NamespaceStatement::Variable(variable("max")),
                    ],
                    span: None,
                }),
            ],
            span: None,
        };
        let err = validate_namespace(&ns).unwrap_err();
        assert!(matches!(err, CompilerError::DuplicateMember { scope, .. } if scope == "cpu.limits"));
    }
}
