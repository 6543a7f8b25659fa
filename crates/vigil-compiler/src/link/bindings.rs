//! User bodies supplied to the linker.
//!
//! Code blocks, handler bodies and non-literal initializers are opaque
//! target-language text in the source tree. When linking, the host supplies
//! them as closures keyed by the monitor's qualified name.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_runtime::event::Event;
use vigil_runtime::value::Value;
use vigil_runtime::Result;

use super::monitor::LinkedMonitor;

pub type CodeFn = Arc<dyn Fn(&LinkedMonitor) -> Result<()> + Send + Sync>;
pub type HandlerFn = Arc<dyn Fn(&LinkedMonitor, &Event) -> Result<()> + Send + Sync>;
pub type ValueFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Closures standing in for user code, by owner and position.
#[derive(Clone, Default)]
pub struct Bindings {
    code: HashMap<(String, usize), CodeFn>,
    handlers: HashMap<(String, String), HandlerFn>,
    values: HashMap<String, ValueFn>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the `index`-th code block of `monitor`.
    pub fn code(
        mut self,
        monitor: impl Into<String>,
        index: usize,
        body: impl Fn(&LinkedMonitor) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.code.insert((monitor.into(), index), Arc::new(body));
        self
    }

    /// Binds the body of handler `handler` of `monitor`.
    pub fn handler(
        mut self,
        monitor: impl Into<String>,
        handler: impl Into<String>,
        body: impl Fn(&LinkedMonitor, &Event) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.handlers
            .insert((monitor.into(), handler.into()), Arc::new(body));
        self
    }

    /// Binds a non-literal initializer by the variable's qualified name
    /// (`demo.Perf.limit`, `cpu.limits.max`).
    pub fn value(
        mut self,
        qualified_name: impl Into<String>,
        init: impl Fn() -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.values.insert(qualified_name.into(), Arc::new(init));
        self
    }

    pub fn code_for(&self, monitor: &str, index: usize) -> Option<CodeFn> {
        self.code.get(&(monitor.to_string(), index)).cloned()
    }

    pub fn handler_for(&self, monitor: &str, handler: &str) -> Option<HandlerFn> {
        self.handlers
            .get(&(monitor.to_string(), handler.to_string()))
            .cloned()
    }

    pub fn value_for(&self, qualified_name: &str) -> Option<ValueFn> {
        self.values.get(qualified_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookups_are_keyed_by_owner() {
        let bindings = Bindings::new()
            .code("demo.Perf", 0, |_| Ok(()))
            .value("cpu.load", || Ok(json!(3)));

        assert!(bindings.code_for("demo.Perf", 0).is_some());
        assert!(bindings.code_for("demo.Perf", 1).is_none());
        assert!(bindings.code_for("demo.Other", 0).is_none());
        assert!(bindings.handler_for("demo.Perf", "onTick").is_none());
        let value = bindings.value_for("cpu.load").unwrap();
        assert_eq!(value().unwrap(), json!(3));
    }
}
