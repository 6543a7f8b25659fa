//! Namespace code generation.
//!
//! The root proxy owns the [`RootConnection`]; child proxies hold a weak
//! reference to it, so dropping the root disconnects the whole tree.
//!
//! [`RootConnection`]: vigil_runtime::proxy::RootConnection

use super::monitor::{field_init, field_type, generate_method};
use super::rust_types::{ident, value_expr};
use crate::diagnostic::CompilerError;
use crate::target::{GeneratedType, Stmt, TypeKind};

/// Generates the Rust module of one root namespace.
pub fn generate_namespace(root: &GeneratedType) -> Result<String, CompilerError> {
    let TypeKind::NamespaceProxy { root: namespace, .. } = &root.kind else {
        return Err(CompilerError::CodegenFailed {
            message: format!("'{}' is not a namespace", root.qualified_name),
        });
    };

    let mut output = String::new();
    output.push_str(&format!(
        "//! Generated by vigil from namespace `{namespace}`. Do not edit.\n"
    ));
    output.push_str("#![allow(dead_code, unused_imports, unused_variables, clippy::all)]\n\n");
    output.push_str("use std::sync::{Arc, Weak};\n\n");
    output.push_str("use vigil_runtime::prelude::*;\n\n");

    let storage = root
        .nested
        .iter()
        .find(|t| t.kind == TypeKind::NamespaceStorage)
        .ok_or_else(|| CompilerError::CodegenFailed {
            message: format!("namespace '{}' has no storage type", root.qualified_name),
        })?;
    output.push_str(&generate_storage(storage)?);
    output.push('\n');
    output.push_str(&generate_proxy(root, Some(storage))?);

    Ok(output)
}

fn generate_storage(storage: &GeneratedType) -> Result<String, CompilerError> {
    let mut output = String::new();
    output.push_str("/// Variables of the namespace tree by qualified name.\n");
    output.push_str(&format!("pub struct {};\n\n", storage.name));
    output.push_str(&format!("impl {} {{\n", storage.name));
    output.push_str("    pub fn variables() -> Vec<(String, Value, bool)> {\n");
    output.push_str("        vec![\n");
    for stmt in &storage.constructor {
        let Stmt::RegisterVariable {
            qualified_name,
            initializer,
            writable,
        } = stmt
        else {
            return Err(CompilerError::CodegenFailed {
                message: format!("unexpected statement in '{}'", storage.name),
            });
        };
        output.push_str(&format!(
            "            ({qualified_name:?}.to_string(), {}, {writable}),\n",
            value_expr(initializer)
        ));
    }
    output.push_str("        ]\n");
    output.push_str("    }\n");
    output.push_str("}\n");
    Ok(output)
}

/// Renders one proxy type and, after it, its child proxies.
fn generate_proxy(
    proxy: &GeneratedType,
    storage: Option<&GeneratedType>,
) -> Result<String, CompilerError> {
    let TypeKind::NamespaceProxy { path, .. } = &proxy.kind else {
        return Err(CompilerError::CodegenFailed {
            message: format!("'{}' is not a namespace proxy", proxy.name),
        });
    };

    let mut output = String::new();
    match &proxy.doc {
        Some(doc) => output.push_str(&format!("/// {doc}\n")),
        None => output.push_str(&format!("/// Namespace `{path}`.\n")),
    }
    output.push_str(&format!("pub struct {} {{\n", proxy.name));
    match storage {
        Some(_) => output.push_str("    connection: Option<Arc<RootConnection>>,\n"),
        None => output.push_str("    root: Weak<RootConnection>,\n"),
    }
    for field in &proxy.fields {
        output.push_str(&format!("    {}: {},\n", ident(&field.name), field_type(field)));
    }
    output.push_str("}\n\n");

    output.push_str(&format!("impl {} {{\n", proxy.name));
    match storage {
        Some(storage) => {
            let (site, exchange) = connect_target(proxy)?;
            output.push_str("    pub fn new(context: &RuntimeContext) -> Arc<Self> {\n");
            output.push_str(&format!(
                "        let connection = guarded(context.policy.as_ref(), {site:?}, || {{\n"
            ));
            output.push_str(&format!(
                "            let connection = RootConnection::new({path:?}, {exchange:?}, context.store.clone(), context.bus.clone());\n"
            ));
            output.push_str(&format!(
                "            connection.register_all(&{}::variables())?;\n",
                storage.name
            ));
            output.push_str("            Ok(connection)\n");
            output.push_str("        });\n");
            output.push_str(
                "        let weak = connection.as_ref().map(Arc::downgrade).unwrap_or_default();\n",
            );
            output.push_str("        let root = &weak;\n");
            output.push_str("        Arc::new(Self {\n");
            output.push_str("            connection,\n");
        }
        None => {
            output.push_str("    pub fn new(root: &Weak<RootConnection>) -> Arc<Self> {\n");
            output.push_str("        Arc::new(Self {\n");
            output.push_str("            root: root.clone(),\n");
        }
    }
    for field in &proxy.fields {
        output.push_str(&format!(
            "            {}: {},\n",
            ident(&field.name),
            field_init(proxy, field)?
        ));
    }
    output.push_str("        })\n");
    output.push_str("    }\n\n");

    output.push_str("    fn connection(&self) -> Result<Arc<RootConnection>> {\n");
    let connection = match storage {
        Some(_) => "self.connection.clone()",
        None => "self.root.upgrade()",
    };
    output.push_str(&format!(
        "        {connection}.ok_or_else(|| Error::Disconnected({path:?}.to_string()))\n"
    ));
    output.push_str("    }\n");

    for method in &proxy.methods {
        output.push('\n');
        output.push_str(&generate_method(method, "pub ")?);
    }
    output.push_str("}\n");

    for child in proxy
        .nested
        .iter()
        .filter(|t| matches!(t.kind, TypeKind::NamespaceProxy { .. }))
    {
        output.push('\n');
        output.push_str(&generate_proxy(child, None)?);
    }

    Ok(output)
}

/// Failure site and exchange of the root's store connection.
fn connect_target(root: &GeneratedType) -> Result<(String, String), CompilerError> {
    root.constructor
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::Guarded { site, body } => body.iter().find_map(|inner| match inner {
                Stmt::ConnectStore { exchange, .. } => Some((site.clone(), exchange.clone())),
                _ => None,
            }),
            _ => None,
        })
        .ok_or_else(|| CompilerError::CodegenFailed {
            message: format!("namespace '{}' never connects to the store", root.qualified_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompilationUnit, Expr, NamespaceDecl, NamespaceStatement, VariableDecl};
    use crate::lower::namespace::lower_namespace;

    fn variable(name: &str, value: &str, writable: bool) -> NamespaceStatement {
        NamespaceStatement::Variable(VariableDecl {
            name: name.to_string(),
            typ: None,
            initializer: Expr::number(value),
            writable,
        })
    }

    fn generated() -> String {
        let unit = CompilationUnit {
            package: Some("demo".to_string()),
            declarations: Vec::new(),
        };
        let cpu = NamespaceDecl {
            name: "cpu".to_string(),
            body: vec![
                variable("load", "0", true),
                variable("cores", "4", false),
                NamespaceStatement::Namespace(NamespaceDecl {
                    name: "limits".to_string(),
                    body: vec![variable("max", "90", true)],
                    span: None,
                }),
            ],
            span: None,
        };
        generate_namespace(&lower_namespace(&unit, &cpu)).unwrap()
    }

    #[test]
    fn storage_lists_the_whole_tree_read_only() {
        let code = generated();
        assert!(code.contains("pub struct CpuStorage;"));
        assert!(code.contains("            (\"cpu.load\".to_string(), json!(0), false),\n"));
        assert!(code.contains("            (\"cpu.limits.max\".to_string(), json!(90), false),\n"));
    }

    #[test]
    fn root_connects_with_its_canonical_exchange() {
        let code = generated();
        assert!(code.contains(
            "let connection = RootConnection::new(\"cpu\", \"demo.Cpu\", context.store.clone(), context.bus.clone());"
        ));
        assert!(code.contains("guarded(context.policy.as_ref(), \"Cpu::new\", || {"));
        assert!(code.contains("            limits: CpuLimits::new(root),\n"));
    }

    #[test]
    fn accessors_follow_writability() {
        let code = generated();
        assert!(code.contains(
            "    pub fn get_load(&self) -> Result<Value> {\n        self.connection()?.get(\"cpu.load\")\n    }\n"
        ));
        assert!(code.contains("    pub fn set_load(&self, value: Value) -> Result<Value> {\n"));
        assert!(code.contains("    pub fn get_cores(&self) -> Result<Value> {\n"));
        assert!(!code.contains("set_cores"));
        assert!(code.contains(
            "    pub fn limits(&self) -> &Arc<CpuLimits> {\n        &self.limits\n    }\n"
        ));
    }

    #[test]
    fn children_borrow_the_root_connection() {
        let code = generated();
        assert!(code.contains("pub struct CpuLimits {\n    root: Weak<RootConnection>,\n}"));
        assert!(code.contains("self.root.upgrade().ok_or_else(|| Error::Disconnected(\"cpu.limits\".to_string()))"));
        assert!(code.contains("self.connection()?.set(\"cpu.limits.max\", value)"));
    }

    #[test]
    fn monitors_are_rejected() {
        let ty = GeneratedType::new("Perf", "demo.Perf", TypeKind::Monitor);
        assert!(generate_namespace(&ty).is_err());
    }
}
