//! Change-event routing.
//!
//! The emitter of a CHANGE event is a property-access chain rooted at a
//! namespace (`cpu.limits.max`). The root segment selects the namespace, the
//! remaining segments form the watched variable path.

use serde::Serialize;

use super::NamespaceIndex;
use crate::ir::Expr;

/// Where a change event subscribes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoute {
    /// Canonical name of the root namespace proxy.
    pub exchange: String,
    /// Root namespace name.
    pub routing_key: String,
    pub queue: String,
    /// Dotted path relative to the root; empty when the root itself is watched.
    pub variable_path: String,
}

impl ChangeRoute {
    pub fn root(&self) -> &str {
        &self.routing_key
    }
}

/// Derives the route of change event `event` of monitor `monitor` (qualified
/// name) from its emitter chain. Returns `None` when the chain has no
/// segments.
pub fn derive_change_route(
    monitor: &str,
    event: &str,
    emitter: &Expr,
    namespaces: &NamespaceIndex,
) -> Option<ChangeRoute> {
    // Outermost to innermost; the innermost segment is the root.
    let mut segments: Vec<&str> = Vec::new();
    let mut root_class: Option<&str> = None;
    let mut current = Some(emitter);
    while let Some(expr) = current {
        current = match expr {
            Expr::FeatureCall {
                receiver,
                feature,
                declared_class,
            } => {
                segments.push(feature.trim());
                if receiver.is_none() {
                    root_class = declared_class.as_deref();
                }
                receiver.as_deref()
            }
            Expr::Source { text } => {
                segments.extend(text.rsplit('.').map(str::trim));
                None
            }
            Expr::Literal { .. } => None,
        };
    }
    segments.retain(|s| !s.is_empty());

    let root = segments.pop()?;
    segments.reverse();
    let variable_path = segments.join(".");

    let exchange = root_class
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .or_else(|| namespaces.canonical_name(root).map(str::to_string))
        .unwrap_or_else(|| root.to_string());

    let queue = if variable_path.is_empty() {
        format!("{monitor}.{event}.{root}")
    } else {
        format!("{monitor}.{event}.{root}.{variable_path}")
    };

    Some(ChangeRoute {
        exchange,
        routing_key: root.to_string(),
        queue,
        variable_path,
    })
}
