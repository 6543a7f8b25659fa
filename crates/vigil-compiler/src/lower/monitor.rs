//! Monitor lowering.
//!
//! Members are lowered in declaration order. Code blocks become methods
//! `code_0`, `code_1`, ... which the constructor calls in order after
//! `initialize` has bound the namespace proxies, all inside one failure
//! boundary. `pause` and `resume` are overridden to forward the transition
//! to every event member.

use super::event::lower_event;
use super::handler::lower_handler;
use super::{MonitorScope, NamespaceIndex, type_name};
use crate::diagnostic::CompilerError;
use crate::ir::{CompilationUnit, MonitorDecl, MonitorStatement};
use crate::target::{
    CodeOrigin, Field, FieldInit, FieldType, GeneratedType, Method, NameGen, RunStateCheck, Stmt,
    TypeKind,
};

/// Name of the method binding namespace proxies.
pub const INITIALIZE: &str = "initialize";

pub fn lower_monitor(
    unit: &CompilationUnit,
    monitor: &MonitorDecl,
    namespaces: &NamespaceIndex,
) -> Result<GeneratedType, CompilerError> {
    let scope = MonitorScope {
        qualified_name: unit.qualify(&monitor.name),
        type_name: type_name(&monitor.name),
        namespaces,
    };
    let mut names = NameGen::new();
    let mut generated = GeneratedType::new(&scope.type_name, &scope.qualified_name, TypeKind::Monitor);
    generated.doc = Some(format!("Monitor `{}`.", scope.qualified_name));

    for using in &monitor.usings {
        generated.fields.push(
            Field::new(
                &using.name,
                FieldType::Proxy {
                    namespace: using.name.clone(),
                },
            )
            .shared(),
        );
    }

    let mut events = Vec::new();
    let mut code_blocks = Vec::new();
    for statement in &monitor.body {
        match statement {
            MonitorStatement::Variable(variable) => {
                let field = Field::new(
                    &variable.name,
                    FieldType::Value {
                        declared: variable.typ.clone(),
                    },
                )
                .with_init(FieldInit::Expr {
                    expr: variable.initializer.clone(),
                });
                generated.fields.push(if variable.writable {
                    field.mutable()
                } else {
                    field
                });
            }
            MonitorStatement::Event(event) => {
                let lowered = lower_event(&scope, event, &mut names)?;
                generated.fields.push(lowered.field);
                generated.nested.extend(lowered.nested);
                events.push(event.name.clone());
            }
            MonitorStatement::Handler(handler) => {
                let lowered = lower_handler(&scope, handler)?;
                generated.fields.push(lowered.field);
                generated.methods.push(lowered.body);
                generated.nested.push(lowered.adapter);
            }
            MonitorStatement::Code(block) => {
                let name = names.fresh("code");
                let index = names.issued("code") - 1;
                generated.methods.push(
                    Method::new(
                        &name,
                        vec![Stmt::UserCode {
                            origin: CodeOrigin::Block { index },
                            source: block.source.clone(),
                        }],
                    )
                    .propagating(),
                );
                code_blocks.push(name);
            }
        }
    }

    let initialize = monitor
        .usings
        .iter()
        .map(|using| Stmt::ConstructProxy {
            field: using.name.clone(),
            namespace: using.name.clone(),
        })
        .collect();
    generated
        .methods
        .push(Method::new(INITIALIZE, initialize).propagating());

    let mut steps = vec![Stmt::CallSelf {
        method: INITIALIZE.to_string(),
    }];
    steps.extend(code_blocks.into_iter().map(|method| Stmt::CallSelf { method }));
    generated.constructor = vec![Stmt::Guarded {
        site: format!("{}::new", scope.type_name),
        body: steps,
    }];

    generated.methods.push(pause_method(&events));
    generated.methods.push(resume_method(&events));

    Ok(generated)
}

fn pause_method(events: &[String]) -> Method {
    let mut body = vec![
        Stmt::ReturnIf {
            state: RunStateCheck::Paused,
        },
        Stmt::CallSuper {
            method: "pause".to_string(),
        },
    ];
    body.extend(events.iter().map(|event| Stmt::CallField {
        field: event.clone(),
        method: "pause".to_string(),
    }));
    Method::new("pause", body).overriding()
}

fn resume_method(events: &[String]) -> Method {
    let mut body = vec![Stmt::ReturnIf {
        state: RunStateCheck::Running,
    }];
    body.extend(events.iter().map(|event| Stmt::CallField {
        field: event.clone(),
        method: "resume".to_string(),
    }));
    body.push(Stmt::CallSuper {
        method: "resume".to_string(),
    });
    Method::new("resume", body).overriding()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        CodeBlock, EmitterSpec, EventDecl, EventKind, Expr, HandlerDecl, NamespaceRef, Parameter,
        VariableDecl,
    };

    fn unit() -> CompilationUnit {
        CompilationUnit {
            package: Some("demo".to_string()),
            declarations: Vec::new(),
        }
    }

    fn code(source: &str) -> MonitorStatement {
        MonitorStatement::Code(CodeBlock {
            source: source.to_string(),
        })
    }

    fn perf() -> MonitorDecl {
        MonitorDecl {
            name: "Perf".to_string(),
            usings: vec![NamespaceRef {
                name: "cpu".to_string(),
            }],
            body: vec![
                code("first();"),
                MonitorStatement::Variable(VariableDecl {
                    name: "count".to_string(),
                    typ: Some("int".to_string()),
                    initializer: Expr::number("0"),
                    writable: true,
                }),
                MonitorStatement::Event(EventDecl {
                    name: "tick".to_string(),
                    emitter: EmitterSpec::Periodic {
                        cron: "* * * * *".to_string(),
                    },
                    span: None,
                }),
                code("second();"),
                MonitorStatement::Event(EventDecl {
                    name: "calls".to_string(),
                    emitter: EmitterSpec::Typed {
                        event_kind: EventKind::Invoke,
                        emitter: Expr::chain(&["svc", "run"]),
                        specifier: None,
                    },
                    span: None,
                }),
                MonitorStatement::Handler(HandlerDecl {
                    name: "onTick".to_string(),
                    param: Parameter {
                        name: "e".to_string(),
                        typ: "IntervalEvent".to_string(),
                    },
                    body: CodeBlock {
                        source: "count += 1;".to_string(),
                    },
                    doc: None,
                    span: None,
                }),
                code("third();"),
            ],
            span: None,
        }
    }

    fn lower() -> GeneratedType {
        lower_monitor(&unit(), &perf(), &NamespaceIndex::default()).unwrap()
    }

    #[test]
    fn constructor_runs_initialize_then_code_in_order() {
        let generated = lower();
        assert_eq!(
            generated.constructor,
            vec![Stmt::Guarded {
                site: "Perf::new".to_string(),
                body: vec![
                    Stmt::CallSelf {
                        method: "initialize".to_string()
                    },
                    Stmt::CallSelf {
                        method: "code_0".to_string()
                    },
                    Stmt::CallSelf {
                        method: "code_1".to_string()
                    },
                    Stmt::CallSelf {
                        method: "code_2".to_string()
                    },
                ],
            }]
        );
        assert_eq!(
            generated.method("code_1").unwrap().body,
            vec![Stmt::UserCode {
                origin: CodeOrigin::Block { index: 1 },
                source: "second();".to_string()
            }]
        );
    }

    #[test]
    fn initialize_binds_every_using() {
        let generated = lower();
        assert_eq!(
            generated.method(INITIALIZE).unwrap().body,
            vec![Stmt::ConstructProxy {
                field: "cpu".to_string(),
                namespace: "cpu".to_string()
            }]
        );
        let field = generated.field("cpu").unwrap();
        assert!(field.is_static);
        assert!(field.init.is_none());
    }

    #[test]
    fn members_keep_declaration_order() {
        let generated = lower();
        let fields: Vec<_> = generated.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, ["cpu", "count", "tick", "calls", "onTick"]);
        assert!(!generated.field("count").unwrap().constant);
        let nested: Vec<_> = generated.nested.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(nested, ["PerfCallsEvent", "PerfOnTickJob"]);
    }

    #[test]
    fn pause_and_resume_forward_to_events() {
        let generated = lower();
        let pause = generated.method("pause").unwrap();
        assert!(pause.overrides);
        assert_eq!(
            pause.body,
            vec![
                Stmt::ReturnIf {
                    state: RunStateCheck::Paused
                },
                Stmt::CallSuper {
                    method: "pause".to_string()
                },
                Stmt::CallField {
                    field: "tick".to_string(),
                    method: "pause".to_string()
                },
                Stmt::CallField {
                    field: "calls".to_string(),
                    method: "pause".to_string()
                },
            ]
        );
        let resume = generated.method("resume").unwrap();
        assert_eq!(
            resume.body.last(),
            Some(&Stmt::CallSuper {
                method: "resume".to_string()
            })
        );
        assert_eq!(
            resume.body[1],
            Stmt::CallField {
                field: "tick".to_string(),
                method: "resume".to_string()
            }
        );
    }

    #[test]
    fn one_bad_member_fails_the_monitor() {
        let mut decl = perf();
        decl.body.push(MonitorStatement::Handler(HandlerDecl {
            name: "onWhat".to_string(),
            param: Parameter {
                name: "e".to_string(),
                typ: "Nope".to_string(),
            },
            body: CodeBlock {
                source: String::new(),
            },
            doc: None,
            span: None,
        }));
        assert!(lower_monitor(&unit(), &decl, &NamespaceIndex::default()).is_err());
    }
}
