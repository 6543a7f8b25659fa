//! Monitor code generation.
//!
//! One file per monitor: the monitor struct, then its nested event, handler
//! adapter and predicate types in member order. Everything renders against
//! `vigil_runtime::prelude`.

use vigil_runtime::event::EventType;

use super::body::Body;
use super::rust_types::{ident, to_pascal_case, to_screaming_snake_case, to_snake_case, value_expr};
use crate::diagnostic::CompilerError;
use crate::target::{Field, FieldInit, FieldType, GeneratedType, Method, TypeKind};

/// Generates the Rust module of one monitor.
pub fn generate_monitor(monitor: &GeneratedType) -> Result<String, CompilerError> {
    if monitor.kind != TypeKind::Monitor {
        return Err(CompilerError::CodegenFailed {
            message: format!("'{}' is not a monitor", monitor.qualified_name),
        });
    }

    let mut output = String::new();

    output.push_str(&format!(
        "//! Generated by vigil from monitor `{}`. Do not edit.\n",
        monitor.qualified_name
    ));
    output.push_str("#![allow(dead_code, unused_imports, unused_variables, clippy::all)]\n\n");
    output.push_str("use std::sync::{Arc, OnceLock, RwLock, Weak};\n\n");
    output.push_str("use vigil_runtime::prelude::*;\n");

    let statics: Vec<&str> = monitor
        .fields
        .iter()
        .filter_map(|f| match &f.ty {
            FieldType::Proxy { namespace } if f.is_static => Some(namespace.as_str()),
            _ => None,
        })
        .collect();
    for namespace in &statics {
        output.push_str(&format!(
            "use super::super::namespaces::{}::{};\n",
            to_snake_case(namespace),
            to_pascal_case(namespace)
        ));
    }
    output.push('\n');
    for namespace in &statics {
        output.push_str(&format!(
            "static {}: OnceLock<Arc<{}>> = OnceLock::new();\n",
            to_screaming_snake_case(namespace),
            to_pascal_case(namespace)
        ));
    }
    if !statics.is_empty() {
        output.push('\n');
    }

    // Struct
    if let Some(doc) = &monitor.doc {
        output.push_str(&format!("/// {}\n", doc));
    }
    output.push_str(&format!("pub struct {} {{\n", monitor.name));
    output.push_str("    core: MonitorCore,\n");
    output.push_str("    context: RuntimeContext,\n");
    for field in monitor.fields.iter().filter(|f| !f.is_static) {
        output.push_str(&format!(
            "    pub {}: {},\n",
            ident(&field.name),
            field_type(field)
        ));
    }
    output.push_str("}\n\n");

    // Constructor, accessors, methods
    output.push_str(&format!("impl {} {{\n", monitor.name));
    output.push_str("    pub fn new(context: &RuntimeContext) -> Arc<Self> {\n");
    output.push_str("        let monitor = Arc::new_cyclic(|this: &Weak<Self>| Self {\n");
    output.push_str(&format!(
        "            core: MonitorCore::new({:?}),\n",
        monitor.qualified_name
    ));
    output.push_str("            context: context.clone(),\n");
    for field in monitor.fields.iter().filter(|f| !f.is_static) {
        output.push_str(&format!(
            "            {}: {},\n",
            ident(&field.name),
            field_init(monitor, field)?
        ));
    }
    output.push_str("        });\n");
    let mut body = Body::new("monitor", "context", 2);
    body.stmts(&monitor.constructor)?;
    output.push_str(&body.finish());
    output.push_str("        monitor\n");
    output.push_str("    }\n");

    for namespace in &statics {
        output.push_str(&format!(
            "\n    /// Proxy of namespace `{namespace}`, bound by `initialize`.\n"
        ));
        output.push_str(&format!(
            "    pub fn {}(&self) -> Result<Arc<{}>> {{\n",
            ident(namespace),
            to_pascal_case(namespace)
        ));
        output.push_str(&format!(
            "        {}.get().cloned().ok_or_else(|| Error::Disconnected({:?}.to_string()))\n",
            to_screaming_snake_case(namespace),
            namespace
        ));
        output.push_str("    }\n");
    }

    for method in monitor.methods.iter().filter(|m| !m.overrides) {
        output.push('\n');
        output.push_str(&generate_method(method, "pub ")?);
    }
    output.push_str("}\n\n");

    // Pausable / Monitor
    output.push_str(&format!("impl Pausable for {} {{\n", monitor.name));
    for name in ["pause", "resume"] {
        let method = monitor.method(name).ok_or_else(|| CompilerError::CodegenFailed {
            message: format!("monitor '{}' has no {name} method", monitor.qualified_name),
        })?;
        output.push_str(&format!("    fn {name}(&self) {{\n"));
        output.push_str("        let _transition = self.core.transition();\n");
        let mut body = Body::new("self", "self.context", 2);
        body.stmts(&method.body)?;
        output.push_str(&body.finish());
        output.push_str("    }\n\n");
    }
    output.push_str("    fn is_paused(&self) -> bool {\n");
    output.push_str("        self.core.is_paused()\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");

    output.push_str(&format!("impl Monitor for {} {{\n", monitor.name));
    output.push_str("    fn name(&self) -> &str {\n");
    output.push_str("        self.core.name()\n");
    output.push_str("    }\n\n");
    output.push_str("    fn events(&self) -> Vec<Arc<dyn MonitorEvent>> {\n");
    output.push_str("        vec![\n");
    for field in &monitor.fields {
        if matches!(field.ty, FieldType::Periodic | FieldType::Event { .. }) {
            output.push_str(&format!(
                "            self.{}.clone() as Arc<dyn MonitorEvent>,\n",
                ident(&field.name)
            ));
        }
    }
    output.push_str("        ]\n");
    output.push_str("    }\n");
    output.push_str("}\n");

    for nested in &monitor.nested {
        output.push('\n');
        output.push_str(&generate_nested(monitor, nested)?);
    }

    Ok(output)
}

pub(crate) fn field_type(field: &Field) -> String {
    match &field.ty {
        FieldType::Value { .. } if field.constant => "Value".to_string(),
        FieldType::Value { .. } => "RwLock<Value>".to_string(),
        FieldType::Periodic => "Arc<PeriodicEvent>".to_string(),
        FieldType::Event { type_name }
        | FieldType::Handler { type_name }
        | FieldType::ChildProxy { type_name }
        | FieldType::Predicate { type_name } => format!("Arc<{type_name}>"),
        FieldType::Proxy { namespace } => format!("Arc<{}>", to_pascal_case(namespace)),
        FieldType::Threshold => "Decimal".to_string(),
    }
}

pub(crate) fn field_init(owner: &GeneratedType, field: &Field) -> Result<String, CompilerError> {
    let missing = || CompilerError::CodegenFailed {
        message: format!("field '{}' of '{}' has no initializer", field.name, owner.name),
    };
    let init = field.init.as_ref().ok_or_else(missing)?;

    Ok(match init {
        FieldInit::Expr { expr } if field.constant => value_expr(expr),
        FieldInit::Expr { expr } => format!("RwLock::new({})", value_expr(expr)),
        FieldInit::Cron { expression } => format!(
            "Arc::new(PeriodicEvent::new({:?}, {:?}, context.scheduler.clone()))",
            field.name, expression
        ),
        FieldInit::Decimal { value } => format!(
            "Decimal::from_i128_with_scale({}, {})",
            value.mantissa(),
            value.scale()
        ),
        FieldInit::Construct { type_name } => {
            let nested = owner.nested_type(type_name).ok_or_else(missing)?;
            match &nested.kind {
                TypeKind::ProbeEvent { .. } | TypeKind::ChangeEvent { .. } => {
                    format!("{type_name}::new(context)")
                }
                TypeKind::IntervalJob { .. } => format!("{type_name}::new(this.clone())"),
                TypeKind::ObserverAdapter { .. } => {
                    format!("{type_name}::new(this.clone(), context.policy.clone())")
                }
                TypeKind::Predicate => format!("{type_name}::new()"),
                TypeKind::NamespaceProxy { .. } => format!("{type_name}::new(root)"),
                TypeKind::Monitor | TypeKind::NamespaceStorage => return Err(missing()),
            }
        }
    })
}

/// Renders an inherent method. Propagating methods return `Result`.
pub(crate) fn generate_method(method: &Method, visibility: &str) -> Result<String, CompilerError> {
    let mut output = String::new();
    let params: String = method
        .params
        .iter()
        .map(|p| format!(", {}: {}", ident(&p.name), param_type(&p.ty)))
        .collect();
    let returns = match (&method.returns, method.propagates) {
        (Some(ty), true) => format!(" -> Result<{}>", return_type(ty)),
        (None, true) => " -> Result<()>".to_string(),
        (Some(ty), false) => format!(" -> {}", return_type(ty)),
        (None, false) => String::new(),
    };

    output.push_str(&format!(
        "    {visibility}fn {}(&self{params}){returns} {{\n",
        ident(&method.name)
    ));
    let mut body = Body::new("self", "self.context", 2);
    body.stmts(&method.body)?;
    output.push_str(&body.finish());
    let has_tail = method.body.last().is_some_and(Body::is_tail);
    if method.propagates && !has_tail {
        output.push_str("        Ok(())\n");
    }
    output.push_str("    }\n");
    Ok(output)
}

fn param_type(ty: &str) -> String {
    match ty {
        "Value" => "Value".to_string(),
        "Self" => "&Self".to_string(),
        other => format!("&{other}"),
    }
}

fn return_type(ty: &str) -> String {
    match ty {
        "Value" | "bool" => ty.to_string(),
        other => format!("&Arc<{other}>"),
    }
}

fn generate_nested(monitor: &GeneratedType, nested: &GeneratedType) -> Result<String, CompilerError> {
    match &nested.kind {
        TypeKind::ProbeEvent { payload, emitter } => {
            generate_probe_event(nested, *payload, emitter)
        }
        TypeKind::ChangeEvent { namespace, path } => generate_change_event(nested, namespace, path),
        TypeKind::IntervalJob { handler } => Ok(generate_job(monitor, nested, handler)),
        TypeKind::ObserverAdapter { payload, handler } => {
            Ok(generate_observer(monitor, nested, *payload, handler))
        }
        TypeKind::Predicate => generate_predicate(nested),
        _ => Err(CompilerError::CodegenFailed {
            message: format!("unexpected nested type '{}'", nested.name),
        }),
    }
}

fn member_name(nested: &GeneratedType) -> &str {
    nested
        .qualified_name
        .rsplit('.')
        .next()
        .unwrap_or(&nested.qualified_name)
}

fn push_doc(output: &mut String, nested: &GeneratedType) {
    if let Some(doc) = &nested.doc {
        for line in doc.lines() {
            output.push_str(&format!("/// {}\n", line));
        }
    }
}

fn event_constructor(
    output: &mut String,
    nested: &GeneratedType,
    prelude: &str,
    fields: &[String],
) -> Result<(), CompilerError> {
    output.push_str(&format!("impl {} {{\n", nested.name));
    output.push_str("    pub fn new(context: &RuntimeContext) -> Arc<Self> {\n");
    output.push_str(prelude);
    output.push_str("        let event = Arc::new(Self {\n");
    for field in fields {
        output.push_str(&format!("            {field},\n"));
    }
    output.push_str("        });\n");
    let mut body = Body::new("event", "context", 2);
    body.stmts(&nested.constructor)?;
    output.push_str(&body.finish());
    output.push_str("        event\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");
    Ok(())
}

fn generate_probe_event(
    nested: &GeneratedType,
    payload: EventType,
    emitter: &str,
) -> Result<String, CompilerError> {
    let mut output = String::new();
    push_doc(&mut output, nested);
    output.push_str(&format!("pub struct {} {{\n", nested.name));
    output.push_str("    source: ProbeEventSource,\n");
    output.push_str("}\n\n");

    let source = format!(
        "source: ProbeEventSource::new({:?}, EventType::{:?}, {:?})",
        member_name(nested),
        payload,
        emitter
    );
    event_constructor(&mut output, nested, "", &[source])?;
    output.push_str(&event_delegation(&nested.name, "ProbeEventSource"));
    Ok(output)
}

fn generate_change_event(
    nested: &GeneratedType,
    namespace: &str,
    path: &str,
) -> Result<String, CompilerError> {
    let mut output = String::new();
    push_doc(&mut output, nested);
    output.push_str(&format!("pub struct {} {{\n", nested.name));
    for field in &nested.fields {
        output.push_str(&format!("    {}: {},\n", ident(&field.name), field_type(field)));
    }
    output.push_str("    source: ChangeEventSource,\n");
    output.push_str("}\n\n");

    let mut prelude = String::new();
    let mut fields = Vec::new();
    let mut predicate = "None".to_string();
    for field in &nested.fields {
        let name = ident(&field.name);
        prelude.push_str(&format!("        let {name} = {};\n", field_init(nested, field)?));
        if matches!(field.ty, FieldType::Predicate { .. }) {
            predicate = format!("Some({name}.clone() as Arc<dyn Predicate>)");
        }
        fields.push(name);
    }
    fields.insert(
        0,
        format!(
            "source: ChangeEventSource::new({:?}, {:?}, {:?}, {predicate})",
            member_name(nested),
            namespace,
            path
        ),
    );

    event_constructor(&mut output, nested, &prelude, &fields)?;
    output.push_str(&event_delegation(&nested.name, "ChangeEventSource"));

    for inner in &nested.nested {
        output.push('\n');
        output.push_str(&generate_predicate(inner)?);
    }
    Ok(output)
}

fn event_delegation(type_name: &str, source: &str) -> String {
    format!(
        r#"impl std::ops::Deref for {type_name} {{
    type Target = {source};

    fn deref(&self) -> &{source} {{
        &self.source
    }}
}}

impl Pausable for {type_name} {{
    fn pause(&self) {{
        self.source.pause();
    }}

    fn resume(&self) {{
        self.source.resume();
    }}

    fn is_paused(&self) -> bool {{
        self.source.is_paused()
    }}
}}

impl MonitorEvent for {type_name} {{
    fn name(&self) -> &str {{
        self.source.name()
    }}

    fn event_type(&self) -> EventType {{
        self.source.event_type()
    }}

    fn emitter(&self) -> Emitter {{
        self.source.emitter()
    }}

    fn probe(&self) -> Option<Arc<dyn Probe>> {{
        self.source.probe()
    }}

    fn consumer(&self) -> Option<&EventConsumer> {{
        self.source.consumer()
    }}

    fn subject(&self) -> Option<&Subject> {{
        self.source.subject()
    }}
}}
"#
    )
}

fn generate_predicate(nested: &GeneratedType) -> Result<String, CompilerError> {
    let mut output = String::new();
    push_doc(&mut output, nested);
    output.push_str(&format!("pub struct {} {{\n", nested.name));
    for field in &nested.fields {
        output.push_str(&format!("    {}: {},\n", ident(&field.name), field_type(field)));
    }
    output.push_str("}\n\n");

    output.push_str(&format!("impl {} {{\n", nested.name));
    output.push_str("    pub fn new() -> Arc<Self> {\n");
    output.push_str("        Arc::new(Self {\n");
    for field in &nested.fields {
        output.push_str(&format!(
            "            {}: {},\n",
            ident(&field.name),
            field_init(nested, field)?
        ));
    }
    output.push_str("        })\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");

    if let Some(test) = nested.method("test") {
        let event = test.params.first().map(|p| p.name.as_str()).unwrap_or("event");
        output.push_str(&format!("impl Predicate for {} {{\n", nested.name));
        output.push_str(&format!(
            "    fn test(&self, {event}: &ChangeEvent) -> Result<bool> {{\n"
        ));
        let mut body = Body::new("self", "self.context", 2);
        body.event_var = event;
        body.stmts(&test.body)?;
        output.push_str(&body.finish());
        output.push_str("    }\n");
        output.push_str("}\n");
    }

    if let Some(eq) = nested.method("eq") {
        output.push('\n');
        output.push_str(&format!("impl PartialEq for {} {{\n", nested.name));
        output.push_str("    fn eq(&self, other: &Self) -> bool {\n");
        let mut body = Body::new("self", "self.context", 2);
        body.stmts(&eq.body)?;
        output.push_str(&body.finish());
        output.push_str("    }\n");
        output.push_str("}\n");
    }

    Ok(output)
}

fn generate_job(monitor: &GeneratedType, nested: &GeneratedType, handler: &str) -> String {
    let mut output = String::new();
    push_doc(&mut output, nested);
    output.push_str(&format!(
        r#"pub struct {job} {{
    monitor: Weak<{monitor}>,
}}

impl {job} {{
    pub fn new(monitor: Weak<{monitor}>) -> Arc<Self> {{
        Arc::new(Self {{ monitor }})
    }}
}}

impl Job for {job} {{
    fn execute(&self, context: &JobContext) -> Result<()> {{
        let expression = context.get_string(EXPRESSION_KEY)?;
        let event = IntervalEvent::new(expression);
        match self.monitor.upgrade() {{
            Some(monitor) => monitor.{handler}(&event),
            None => Ok(()),
        }}
    }}
}}
"#,
        job = nested.name,
        monitor = monitor.name,
        handler = ident(handler),
    ));
    output
}

fn generate_observer(
    monitor: &GeneratedType,
    nested: &GeneratedType,
    payload: EventType,
    handler: &str,
) -> String {
    let mut output = String::new();
    push_doc(&mut output, nested);
    output.push_str(&format!(
        r#"pub struct {observer} {{
    monitor: Weak<{monitor}>,
    policy: Arc<dyn FailurePolicy>,
}}

impl {observer} {{
    pub fn new(monitor: Weak<{monitor}>, policy: Arc<dyn FailurePolicy>) -> Arc<Self> {{
        Arc::new(Self {{ monitor, policy }})
    }}
}}

impl Observer for {observer} {{
    fn notify(&self, event: &Event) {{
        let Event::{variant}(payload) = event else {{
            return;
        }};
        let Some(monitor) = self.monitor.upgrade() else {{
            return;
        }};
        guarded(self.policy.as_ref(), {site:?}, || monitor.{handler}(payload));
    }}
}}
"#,
        observer = nested.name,
        monitor = monitor.name,
        variant = format!("{payload:?}"),
        site = nested.qualified_name,
        handler = ident(handler),
    ));
    output
}
