//! Namespace linking.
//!
//! Builds a runtime [`NamespaceProxy`] tree from a lowered namespace: the
//! shape comes from the proxy types' getters and setters, the registrations
//! from the storage type, and the root constructor connects to the store
//! inside its failure boundary.

use std::sync::Arc;

use vigil_runtime::context::RuntimeContext;
use vigil_runtime::failure::guarded;
use vigil_runtime::proxy::{NamespaceProxy, ProxyShape, RootConnection};
use vigil_runtime::value::Value;

use super::bindings::Bindings;
use crate::codegen::rust_types::literal_value;
use crate::diagnostic::CompilerError;
use crate::ir::Expr;
use crate::target::{GeneratedType, Stmt, TypeKind};

pub fn link_namespace(
    generated: &GeneratedType,
    context: &RuntimeContext,
    bindings: &Bindings,
) -> Result<Arc<NamespaceProxy>, CompilerError> {
    let TypeKind::NamespaceProxy { root, .. } = &generated.kind else {
        return Err(CompilerError::link(
            &generated.qualified_name,
            "not a namespace proxy",
        ));
    };
    let storage = generated
        .nested
        .iter()
        .find(|t| t.kind == TypeKind::NamespaceStorage)
        .ok_or_else(|| CompilerError::link(&generated.qualified_name, "missing storage type"))?;

    let shape = shape_of(generated, root);
    let mut connection = None;

    for stmt in &generated.constructor {
        let Stmt::Guarded { site, body } = stmt else {
            return Err(unsupported(generated, stmt));
        };
        for inner in body {
            let Stmt::ConnectStore { namespace, exchange } = inner else {
                return Err(unsupported(generated, inner));
            };
            connection = guarded(context.policy.as_ref(), site, || {
                let connection = RootConnection::new(
                    namespace.as_str(),
                    exchange.as_str(),
                    context.store.clone(),
                    context.bus.clone(),
                );
                connection.register_all(&registrations(storage, bindings)?)?;
                Ok(connection)
            });
        }
    }

    tracing::debug!(
        namespace = %root,
        connected = connection.is_some(),
        "namespace linked"
    );
    Ok(NamespaceProxy::build(&shape, connection))
}

fn unsupported(generated: &GeneratedType, stmt: &Stmt) -> CompilerError {
    CompilerError::link(
        &generated.qualified_name,
        format!("unexpected constructor statement {stmt:?}"),
    )
}

fn shape_of(proxy: &GeneratedType, name: &str) -> ProxyShape {
    let mut variables = Vec::new();
    for method in &proxy.methods {
        if let [Stmt::GetVariable { qualified_name }] = method.body.as_slice() {
            let writable = proxy.methods.iter().any(|m| {
                matches!(m.body.as_slice(), [Stmt::SetVariable { qualified_name: q }] if q == qualified_name)
            });
            let simple = qualified_name.rsplit('.').next().unwrap_or(qualified_name);
            variables.push((simple.to_string(), writable));
        }
    }

    let children = proxy
        .nested
        .iter()
        .filter_map(|child| match &child.kind {
            TypeKind::NamespaceProxy { path, .. } => {
                let simple = path.rsplit('.').next().unwrap_or(path);
                Some(shape_of(child, simple))
            }
            _ => None,
        })
        .collect();

    ProxyShape {
        name: name.to_string(),
        variables,
        children,
    }
}

fn registrations(
    storage: &GeneratedType,
    bindings: &Bindings,
) -> vigil_runtime::Result<Vec<(String, Value, bool)>> {
    storage
        .constructor
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::RegisterVariable {
                qualified_name,
                initializer,
                writable,
            } => Some((qualified_name, initializer, *writable)),
            _ => None,
        })
        .map(|(name, initializer, writable)| {
            let value = initial_value(name, initializer, bindings)?;
            Ok((name.clone(), value, writable))
        })
        .collect()
}

/// Literal initializers evaluate directly; anything else needs a binding.
pub(crate) fn initial_value(
    qualified_name: &str,
    initializer: &Expr,
    bindings: &Bindings,
) -> vigil_runtime::Result<Value> {
    match initializer {
        Expr::Literal { value } => Ok(literal_value(value)),
        _ => match bindings.value_for(qualified_name) {
            Some(init) => init(),
            None => Err(vigil_runtime::Error::Unbound(qualified_name.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompilationUnit, NamespaceDecl, NamespaceStatement, VariableDecl};
    use crate::lower::namespace::lower_namespace;
    use serde_json::json;
    use vigil_runtime::failure::CapturingPolicy;

    fn variable(name: &str, initializer: Expr, writable: bool) -> NamespaceStatement {
        NamespaceStatement::Variable(VariableDecl {
            name: name.to_string(),
            typ: None,
            initializer,
            writable,
        })
    }

    fn cpu(load: Expr) -> GeneratedType {
        let unit = CompilationUnit {
            package: Some("demo".to_string()),
            declarations: Vec::new(),
        };
        let decl = NamespaceDecl {
            name: "cpu".to_string(),
            body: vec![
                variable("load", load, true),
                variable("cores", Expr::number("4"), false),
                NamespaceStatement::Namespace(NamespaceDecl {
                    name: "limits".to_string(),
                    body: vec![variable("max", Expr::number("90"), true)],
                    span: None,
                }),
            ],
            span: None,
        };
        lower_namespace(&unit, &decl)
    }

    #[test]
    fn shape_follows_getters_and_setters() {
        let shape = shape_of(&cpu(Expr::number("0")), "cpu");
        assert_eq!(
            shape.variables,
            vec![("load".to_string(), true), ("cores".to_string(), false)]
        );
        assert_eq!(shape.children[0].name, "limits");
        assert_eq!(shape.children[0].variables, vec![("max".to_string(), true)]);
    }

    #[test]
    fn set_then_get_round_trips() {
        let context = RuntimeContext::local();
        let proxy = link_namespace(&cpu(Expr::number("0")), &context, &Bindings::new()).unwrap();

        assert_eq!(proxy.get("load").unwrap(), json!(0));
        assert_eq!(proxy.set("load", json!(7)).unwrap(), json!(0));
        assert_eq!(proxy.get("load").unwrap(), json!(7));

        let limits = proxy.child_namespace("limits").unwrap();
        limits.set("max", json!(95)).unwrap();
        assert_eq!(context.store.get("cpu.limits.max").unwrap(), json!(95));
        assert!(proxy.set("cores", json!(8)).is_err());
    }

    #[test]
    fn unbound_initializer_leaves_the_root_disconnected() {
        let policy = CapturingPolicy::new();
        let context = RuntimeContext::local().with_policy(policy.clone());
        let load = Expr::Source {
            text: "sensors::load()".to_string(),
        };

        let proxy = link_namespace(&cpu(load), &context, &Bindings::new()).unwrap();

        assert!(!proxy.is_connected());
        let failures = policy.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].site, "Cpu::new");
    }

    #[test]
    fn bound_initializers_are_evaluated() {
        let context = RuntimeContext::local();
        let load = Expr::Source {
            text: "sensors::load()".to_string(),
        };
        let bindings = Bindings::new().value("cpu.load", || Ok(json!(0.5)));

        let proxy = link_namespace(&cpu(load), &context, &bindings).unwrap();
        assert_eq!(proxy.get("load").unwrap(), json!(0.5));
    }
}
