//! Namespace lowering.
//!
//! A root namespace `cpu` becomes:
//!
//! - `Cpu`, the root proxy: getters and setters per variable, one accessor
//!   per child namespace, and a constructor that connects to the store
//! - `CpuStorage`, the storage type registering every variable of the tree
//!   under its dotted qualified name (`cpu.limits.max`)
//! - `CpuLimits`, ... one child proxy type per nested namespace
//!
//! Writes through a setter publish on the exchange named after the root
//! proxy type (its canonical name, `demo.Cpu`).

use super::type_name;
use crate::ir::{CompilationUnit, NamespaceDecl};
use crate::target::{Field, FieldInit, FieldType, GeneratedType, Method, Stmt, TypeKind};

pub fn lower_namespace(unit: &CompilationUnit, namespace: &NamespaceDecl) -> GeneratedType {
    let root_type = type_name(&namespace.name);
    let canonical = unit.qualify(&root_type);

    let mut root = proxy_type(namespace, &namespace.name, &namespace.name, &root_type, &canonical);
    root.doc = Some(format!("Namespace `{}`.", namespace.name));
    root.constructor = vec![Stmt::Guarded {
        site: format!("{root_type}::new"),
        body: vec![Stmt::ConnectStore {
            namespace: namespace.name.clone(),
            exchange: canonical.clone(),
        }],
    }];

    let mut storage = GeneratedType::new(
        format!("{root_type}Storage"),
        format!("{canonical}Storage"),
        TypeKind::NamespaceStorage,
    );
    collect_registrations(namespace, &namespace.name, &mut storage.constructor);
    root.nested.insert(0, storage);

    root
}

/// Proxy type for `namespace` at dotted `path`, with nested child proxy types.
fn proxy_type(
    namespace: &NamespaceDecl,
    root: &str,
    path: &str,
    name: &str,
    qualified_name: &str,
) -> GeneratedType {
    let mut generated = GeneratedType::new(
        name,
        qualified_name,
        TypeKind::NamespaceProxy {
            root: root.to_string(),
            path: path.to_string(),
        },
    );

    for variable in namespace.variables() {
        let qualified = format!("{path}.{}", variable.name);
        generated.methods.push(
            Method::new(
                format!("get_{}", variable.name),
                vec![Stmt::GetVariable {
                    qualified_name: qualified.clone(),
                }],
            )
            .returns("Value")
            .propagating(),
        );
        if variable.writable {
            generated.methods.push(
                Method::new(
                    format!("set_{}", variable.name),
                    vec![Stmt::SetVariable {
                        qualified_name: qualified,
                    }],
                )
                .param("value", "Value")
                .returns("Value")
                .propagating(),
            );
        }
    }

    for child in namespace.children() {
        let child_type = format!("{name}{}", type_name(&child.name));
        let child_path = format!("{path}.{}", child.name);
        let nested = proxy_type(
            child,
            root,
            &child_path,
            &child_type,
            &format!("{qualified_name}.{}", child.name),
        );

        generated.fields.push(
            Field::new(
                &child.name,
                FieldType::ChildProxy {
                    type_name: child_type.clone(),
                },
            )
            .with_init(FieldInit::Construct {
                type_name: child_type.clone(),
            }),
        );
        generated.methods.push(
            Method::new(
                &child.name,
                vec![Stmt::ReturnField {
                    field: child.name.clone(),
                }],
            )
            .returns(child_type),
        );
        generated.nested.push(nested);
    }

    generated
}

fn collect_registrations(namespace: &NamespaceDecl, path: &str, out: &mut Vec<Stmt>) {
    for variable in namespace.variables() {
        out.push(Stmt::RegisterVariable {
            qualified_name: format!("{path}.{}", variable.name),
            initializer: variable.initializer.clone(),
            // setters on the proxy are the only write path
            writable: false,
        });
    }
    for child in namespace.children() {
        collect_registrations(child, &format!("{path}.{}", child.name), out);
    }
}
