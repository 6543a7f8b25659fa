//! Statement rendering.

use super::rust_types::{ident, to_pascal_case, to_screaming_snake_case};
use crate::diagnostic::CompilerError;
use crate::target::{RunStateCheck, Stmt};

/// Renders statement lists of one method or constructor.
///
/// `receiver` is the expression naming the instance (`self` in methods,
/// `monitor` or `event` in constructors); `context` names the
/// `RuntimeContext` in scope.
pub struct Body<'a> {
    pub receiver: &'a str,
    pub context: &'a str,
    /// Variable the rendered predicate expression reads.
    pub event_var: &'a str,
    out: String,
    indent: usize,
}

impl<'a> Body<'a> {
    pub fn new(receiver: &'a str, context: &'a str, indent: usize) -> Self {
        Self {
            receiver,
            context,
            event_var: "event",
            out: String::new(),
            indent,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    pub fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn stmts(&mut self, stmts: &[Stmt]) -> Result<(), CompilerError> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    /// Whether `stmt` produces the method's return value.
    pub fn is_tail(stmt: &Stmt) -> bool {
        matches!(
            stmt,
            Stmt::GetVariable { .. }
                | Stmt::SetVariable { .. }
                | Stmt::ReturnField { .. }
                | Stmt::ReturnPredicate { .. }
                | Stmt::ReturnConst { .. }
        )
    }

    pub fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompilerError> {
        let recv = self.receiver;
        match stmt {
            Stmt::UserCode { source, .. } => {
                for line in source.lines() {
                    self.line(line.trim_end());
                }
            }
            Stmt::CallSelf { method } => self.line(&format!("{recv}.{}()?;", ident(method))),
            Stmt::CallSuper { method } => {
                let call = match method.as_str() {
                    "pause" => "set_paused",
                    "resume" => "set_running",
                    other => return Err(unsupported(&format!("base call `{other}`"))),
                };
                self.line(&format!("{recv}.core.{call}();"));
            }
            Stmt::CallField { field, method } => {
                self.line(&format!("{recv}.{}.{}();", ident(field), ident(method)));
            }
            Stmt::ReturnIf { state } => {
                let condition = match state {
                    RunStateCheck::Paused => format!("{recv}.core.is_paused()"),
                    RunStateCheck::Running => format!("!{recv}.core.is_paused()"),
                };
                self.line(&format!("if {condition} {{"));
                self.indent += 1;
                self.line("return;");
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Guarded { site, body } => {
                self.line(&format!(
                    "guarded({}.policy.as_ref(), {site:?}, || {{",
                    self.context
                ));
                self.indent += 1;
                self.stmts(body)?;
                self.line("Ok(())");
                self.indent -= 1;
                self.line("});");
            }
            Stmt::ConstructProxy { field, namespace } => {
                self.line(&format!(
                    "{}.get_or_init(|| {}::new(&{recv}.context));",
                    to_screaming_snake_case(field),
                    to_pascal_case(namespace)
                ));
            }
            Stmt::OpenProbe { routing_key } => {
                self.line(&format!(
                    "{recv}.source.open_probe({}.probes.as_ref(), {routing_key:?})?;",
                    self.context
                ));
            }
            Stmt::StartConsumer {
                exchange,
                routing_key,
                queue,
                ..
            } => {
                self.line(&format!("{recv}.source.start_consumer("));
                self.indent += 1;
                self.line(&format!("{}.bus.clone(),", self.context));
                self.line(&format!(
                    "ConsumerConfig::new({exchange:?}, {routing_key:?}).with_queue({queue:?}),"
                ));
                self.indent -= 1;
                self.line(")?;");
            }
            Stmt::GetVariable { qualified_name } => {
                self.line(&format!("{recv}.connection()?.get({qualified_name:?})"));
            }
            Stmt::SetVariable { qualified_name } => {
                self.line(&format!("{recv}.connection()?.set({qualified_name:?}, value)"));
            }
            Stmt::ReturnField { field } => self.line(&format!("&{recv}.{}", ident(field))),
            Stmt::ReturnPredicate { expr } => {
                self.line(&format!("Ok({})", expr.render(self.event_var)));
            }
            Stmt::ReturnConst { value } => self.line(&value.to_string()),
            Stmt::ConnectStore { .. }
            | Stmt::RegisterVariable { .. }
            | Stmt::DispatchTyped { .. }
            | Stmt::DispatchInterval { .. } => {
                return Err(unsupported("type-level statement in a method body"));
            }
        }
        Ok(())
    }
}

fn unsupported(what: &str) -> CompilerError {
    CompilerError::CodegenFailed {
        message: format!("cannot render {what}"),
    }
}
