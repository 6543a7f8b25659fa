//! Event lowering.
//!
//! | emitter            | field                        | nested type                    |
//! |--------------------|------------------------------|--------------------------------|
//! | periodic (cron)    | `Periodic`, cron initializer | none                           |
//! | INVOKE ... TIMELAPSE | instance of nested type    | probe + consumer on the probe exchange |
//! | CHANGE             | instance of nested type      | consumer on the namespace exchange, optional predicate |

use vigil_runtime::bus::PROBE_EXCHANGE;

use super::MonitorScope;
use super::route::derive_change_route;
use super::specifier::compile_specifier;
use crate::diagnostic::CompilerError;
use crate::ir::{EmitterSpec, EventDecl, EventKind, Expr, SpecifierNode};
use crate::target::{
    DeliveryFilter, Field, FieldInit, FieldType, GeneratedType, Method, NameGen, Stmt, TypeKind,
};

/// Field name holding the predicate of a change event.
pub const PREDICATE_FIELD: &str = "specifier";

/// Name the predicate's `test` method binds the change event to.
pub const PREDICATE_EVENT_VAR: &str = "event";

/// A lowered event member.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredEvent {
    pub field: Field,
    pub nested: Option<GeneratedType>,
}

pub fn lower_event(
    scope: &MonitorScope<'_>,
    event: &EventDecl,
    names: &mut NameGen,
) -> Result<LoweredEvent, CompilerError> {
    match &event.emitter {
        EmitterSpec::Periodic { cron } => Ok(LoweredEvent {
            field: Field::new(&event.name, FieldType::Periodic).with_init(FieldInit::Cron {
                expression: cron.clone(),
            }),
            nested: None,
        }),
        EmitterSpec::Typed {
            event_kind: EventKind::Change,
            emitter,
            specifier,
        } => lower_change_event(scope, event, emitter, specifier.as_ref(), names),
        EmitterSpec::Typed {
            event_kind,
            emitter,
            specifier,
        } => {
            if specifier.is_some() {
                return Err(CompilerError::MisplacedSpecifier {
                    event: scope.member(&event.name),
                });
            }
            Ok(lower_probe_event(scope, event, *event_kind, emitter))
        }
    }
}

fn lower_probe_event(
    scope: &MonitorScope<'_>,
    event: &EventDecl,
    kind: EventKind,
    emitter: &Expr,
) -> LoweredEvent {
    let payload = kind.payload();
    let type_name = scope.nested_name(&event.name, "Event");
    let routing_key = scope.member(&event.name);
    let site = format!("{type_name}::new");

    let mut generated = GeneratedType::new(
        &type_name,
        scope.member(&event.name),
        TypeKind::ProbeEvent {
            payload,
            emitter: emitter.to_string(),
        },
    );
    generated.doc = Some(format!("`{payload}` raised by `{emitter}`."));
    // Separate boundaries: a failed consumer leaves the probe open.
    generated.constructor = vec![
        Stmt::Guarded {
            site: site.clone(),
            body: vec![Stmt::OpenProbe {
                routing_key: routing_key.clone(),
            }],
        },
        Stmt::Guarded {
            site,
            body: vec![Stmt::StartConsumer {
                exchange: PROBE_EXCHANGE.to_string(),
                routing_key: routing_key.clone(),
                queue: routing_key,
                filter: DeliveryFilter::Payload { payload },
            }],
        },
    ];

    LoweredEvent {
        field: Field::new(
            &event.name,
            FieldType::Event {
                type_name: type_name.clone(),
            },
        )
        .with_init(FieldInit::Construct { type_name }),
        nested: Some(generated),
    }
}

fn lower_change_event(
    scope: &MonitorScope<'_>,
    event: &EventDecl,
    emitter: &Expr,
    specifier: Option<&SpecifierNode>,
    names: &mut NameGen,
) -> Result<LoweredEvent, CompilerError> {
    let route = derive_change_route(&scope.qualified_name, &event.name, emitter, scope.namespaces)
        .ok_or_else(|| CompilerError::EmptyEmitter {
            monitor: scope.qualified_name.clone(),
            event: event.name.clone(),
        })?;

    let type_name = scope.nested_name(&event.name, "Event");
    let mut generated = GeneratedType::new(
        &type_name,
        scope.member(&event.name),
        TypeKind::ChangeEvent {
            namespace: route.routing_key.clone(),
            path: route.variable_path.clone(),
        },
    );
    generated.doc = Some(format!("Change of `{emitter}`."));

    let predicate = match specifier {
        Some(node) => {
            let predicate_type = scope.nested_name(&event.name, "Specifier");
            let compiled = compile_specifier(node, PREDICATE_EVENT_VAR, names)?;

            let mut nested = GeneratedType::new(
                &predicate_type,
                scope.member(&format!("{}.{PREDICATE_FIELD}", event.name)),
                TypeKind::Predicate,
            );
            nested.fields = compiled.fields;
            nested.methods = vec![
                Method::new(
                    "test",
                    vec![Stmt::ReturnPredicate {
                        expr: compiled.expr,
                    }],
                )
                .param(PREDICATE_EVENT_VAR, "ChangeEvent")
                .returns("bool")
                .overriding()
                .propagating(),
                Method::new("eq", vec![Stmt::ReturnConst { value: false }])
                    .param("other", "Self")
                    .returns("bool")
                    .overriding(),
            ];

            generated.fields.push(
                Field::new(
                    PREDICATE_FIELD,
                    FieldType::Predicate {
                        type_name: predicate_type.clone(),
                    },
                )
                .with_init(FieldInit::Construct {
                    type_name: predicate_type,
                }),
            );
            generated.nested.push(nested);
            Some(PREDICATE_FIELD.to_string())
        }
        None => None,
    };

    generated.constructor = vec![Stmt::Guarded {
        site: format!("{type_name}::new"),
        body: vec![Stmt::StartConsumer {
            exchange: route.exchange,
            routing_key: route.routing_key,
            queue: route.queue,
            filter: DeliveryFilter::VariablePath {
                path: route.variable_path,
                predicate,
            },
        }],
    }];

    Ok(LoweredEvent {
        field: Field::new(
            &event.name,
            FieldType::Event {
                type_name: type_name.clone(),
            },
        )
        .with_init(FieldInit::Construct { type_name }),
        nested: Some(generated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RelationalOp;
    use crate::lower::NamespaceIndex;
    use vigil_runtime::event::EventType;

    fn scope(index: &NamespaceIndex) -> MonitorScope<'_> {
        MonitorScope {
            qualified_name: "demo.Perf".to_string(),
            type_name: "Perf".to_string(),
            namespaces: index,
        }
    }

    fn typed(name: &str, kind: EventKind, emitter: Expr, specifier: Option<SpecifierNode>) -> EventDecl {
        EventDecl {
            name: name.to_string(),
            emitter: EmitterSpec::Typed {
                event_kind: kind,
                emitter,
                specifier,
            },
            span: None,
        }
    }

    #[test]
    fn periodic_events_are_plain_fields() {
        let index = NamespaceIndex::default();
        let event = EventDecl {
            name: "tick".to_string(),
            emitter: EmitterSpec::Periodic {
                cron: "0 * * * * ?".to_string(),
            },
            span: None,
        };
        let lowered = lower_event(&scope(&index), &event, &mut NameGen::new()).unwrap();
        assert_eq!(lowered.field.ty, FieldType::Periodic);
        assert_eq!(
            lowered.field.init,
            Some(FieldInit::Cron {
                expression: "0 * * * * ?".to_string()
            })
        );
        assert!(lowered.nested.is_none());
    }

    #[test]
    fn probe_events_open_a_probe_then_consume() {
        let index = NamespaceIndex::default();
        let event = typed(
            "slow",
            EventKind::TimeLapse,
            Expr::Source {
                text: "Service::handle".to_string(),
            },
            None,
        );
        let lowered = lower_event(&scope(&index), &event, &mut NameGen::new()).unwrap();
        let nested = lowered.nested.unwrap();

        assert_eq!(nested.name, "PerfSlowEvent");
        assert_eq!(
            nested.kind,
            TypeKind::ProbeEvent {
                payload: EventType::TimeLapse,
                emitter: "Service::handle".to_string()
            }
        );
        assert_eq!(nested.constructor.len(), 2);
        let Stmt::Guarded { body, .. } = &nested.constructor[1] else {
            panic!("expected a guarded consumer start");
        };
        assert_eq!(
            body[0],
            Stmt::StartConsumer {
                exchange: PROBE_EXCHANGE.to_string(),
                routing_key: "demo.Perf.slow".to_string(),
                queue: "demo.Perf.slow".to_string(),
                filter: DeliveryFilter::Payload {
                    payload: EventType::TimeLapse
                },
            }
        );
    }

    #[test]
    fn change_events_carry_route_and_predicate() {
        let mut index = NamespaceIndex::default();
        index.insert("cpu", "demo.Cpu");
        let event = typed(
            "hot",
            EventKind::Change,
            Expr::chain(&["cpu", "load"]),
            Some(SpecifierNode::leaf(RelationalOp::Above, Expr::number("90"), false)),
        );
        let lowered = lower_event(&scope(&index), &event, &mut NameGen::new()).unwrap();
        let nested = lowered.nested.unwrap();

        assert_eq!(
            nested.kind,
            TypeKind::ChangeEvent {
                namespace: "cpu".to_string(),
                path: "load".to_string()
            }
        );
        assert!(nested.field(PREDICATE_FIELD).is_some());
        let predicate = nested.nested_type("PerfHotSpecifier").unwrap();
        assert_eq!(predicate.kind, TypeKind::Predicate);
        assert!(predicate.field("threshold_0").is_some());
        assert_eq!(
            predicate.method("eq").unwrap().body,
            vec![Stmt::ReturnConst { value: false }]
        );

        let Stmt::Guarded { body, .. } = &nested.constructor[0] else {
            panic!("expected a guarded consumer start");
        };
        assert_eq!(
            body[0],
            Stmt::StartConsumer {
                exchange: "demo.Cpu".to_string(),
                routing_key: "cpu".to_string(),
                queue: "demo.Perf.hot.cpu.load".to_string(),
                filter: DeliveryFilter::VariablePath {
                    path: "load".to_string(),
                    predicate: Some(PREDICATE_FIELD.to_string()),
                },
            }
        );
    }

    #[test]
    fn specifiers_only_apply_to_change_events() {
        let index = NamespaceIndex::default();
        let event = typed(
            "calls",
            EventKind::Invoke,
            Expr::chain(&["svc", "run"]),
            Some(SpecifierNode::leaf(RelationalOp::Above, Expr::number("1"), false)),
        );
        let err = lower_event(&scope(&index), &event, &mut NameGen::new()).unwrap_err();
        assert!(matches!(err, CompilerError::MisplacedSpecifier { .. }));
    }

    #[test]
    fn change_events_need_an_emitter() {
        let index = NamespaceIndex::default();
        let event = typed("none", EventKind::Change, Expr::chain::<&str>(&[]), None);
        let err = lower_event(&scope(&index), &event, &mut NameGen::new()).unwrap_err();
        assert!(matches!(err, CompilerError::EmptyEmitter { event, .. } if event == "none"));
    }
}
