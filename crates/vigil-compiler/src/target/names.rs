//! Deterministic fresh names.

use std::collections::HashMap;

/// Fresh-name counter scoped to one top-level declaration.
///
/// Each prefix counts from zero: `threshold_0`, `threshold_1`, `code_0`.
/// Lowering the same declaration twice yields the same names.
#[derive(Debug, Default)]
pub struct NameGen {
    counters: HashMap<String, usize>,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{prefix}_{counter}");
        *counter += 1;
        name
    }

    /// How many names were handed out for `prefix`.
    pub fn issued(&self, prefix: &str) -> usize {
        self.counters.get(prefix).copied().unwrap_or(0)
    }
}
