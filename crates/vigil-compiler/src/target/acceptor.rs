//! Hand-off of lowered types.

use super::GeneratedType;

/// Destination of an emitted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    /// Monitor and namespace types.
    Monitors,
    /// Supporting build artifacts (module index, routing manifest).
    Secondary,
}

/// Receives fully assembled generated types, one call per top-level declaration.
pub trait Acceptor {
    fn accept(&mut self, generated: GeneratedType, channel: OutputChannel);
}

/// Keeps every accepted type in order.
#[derive(Debug, Default)]
pub struct CollectingAcceptor {
    pub accepted: Vec<(GeneratedType, OutputChannel)>,
}

impl CollectingAcceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> impl Iterator<Item = &GeneratedType> {
        self.accepted.iter().map(|(t, _)| t)
    }

    pub fn get(&self, name: &str) -> Option<&GeneratedType> {
        self.types().find(|t| t.name == name)
    }

    pub fn into_types(self) -> Vec<GeneratedType> {
        self.accepted.into_iter().map(|(t, _)| t).collect()
    }
}

impl Acceptor for CollectingAcceptor {
    fn accept(&mut self, generated: GeneratedType, channel: OutputChannel) {
        self.accepted.push((generated, channel));
    }
}
