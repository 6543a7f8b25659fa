//! # Namespace Proxies
//!
//! A namespace tree is exposed to monitors as a tree of proxies. Only the root
//! proxy owns a [`RootConnection`] to the variable store; child proxies hold a
//! weak reference to it and delegate every read and write through it.
//!
//! Writes publish a `ChangeEvent` on the exchange named after the root proxy,
//! with the root namespace name as routing key and the variable path relative
//! to the root as payload. Change events of monitors bind to exactly that
//! triple.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::bus::MessageBus;
use crate::event::{ChangeEvent, Event};
use crate::store::VariableStore;
use crate::value::Value;
use crate::{Error, Result};

/// Live connection of a root namespace to the store and the bus.
pub struct RootConnection {
    namespace: String,
    exchange: String,
    store: Arc<dyn VariableStore>,
    bus: Arc<dyn MessageBus>,
}

impl RootConnection {
    pub fn new(
        namespace: impl Into<String>,
        exchange: impl Into<String>,
        store: Arc<dyn VariableStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            namespace: namespace.into(),
            exchange: exchange.into(),
            store,
            bus,
        })
    }

    /// Root namespace name; also the routing key of its change events.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Registers variables by qualified name. Already registered names keep
    /// their stored value.
    pub fn register_all(&self, entries: &[(String, Value, bool)]) -> Result<()> {
        for (name, value, writable) in entries {
            let created = self.store.register(name, value.clone(), *writable)?;
            tracing::trace!(variable = %name, created, "namespace variable registered");
        }
        Ok(())
    }

    pub fn get(&self, qualified_name: &str) -> Result<Value> {
        self.store.get(qualified_name)
    }

    /// Writes a variable and publishes the change. Returns the previous value.
    pub fn set(&self, qualified_name: &str, value: Value) -> Result<Value> {
        let previous = self.store.set(qualified_name, value.clone())?;
        let event = ChangeEvent::new(self.relative_path(qualified_name), previous.clone(), value);
        self.bus
            .publish(&self.exchange, &self.namespace, Event::Change(event))?;
        Ok(previous)
    }

    /// Path of a variable relative to the root namespace (`cpu.limits.max` → `limits.max`).
    pub fn relative_path<'a>(&self, qualified_name: &'a str) -> &'a str {
        qualified_name
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(qualified_name)
    }
}

/// Static shape of one namespace: its variables and child namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyShape {
    pub name: String,
    /// `(simple name, has setter)` in declaration order.
    pub variables: Vec<(String, bool)>,
    pub children: Vec<ProxyShape>,
}

#[derive(Debug, Clone)]
struct VariableAccess {
    qualified_name: String,
    writable: bool,
}

enum Connection {
    Owned(Option<Arc<RootConnection>>),
    Borrowed(Weak<RootConnection>),
}

/// One node of a namespace proxy tree.
pub struct NamespaceProxy {
    name: String,
    qualified_name: String,
    variables: BTreeMap<String, VariableAccess>,
    children: BTreeMap<String, Arc<NamespaceProxy>>,
    connection: Connection,
}

impl NamespaceProxy {
    /// Builds a proxy tree over `connection`. A root without a connection
    /// still answers structural queries; reads and writes fail with
    /// [`Error::Disconnected`].
    pub fn build(shape: &ProxyShape, connection: Option<Arc<RootConnection>>) -> Arc<Self> {
        let weak = connection.as_ref().map(Arc::downgrade).unwrap_or_default();
        let children = shape
            .children
            .iter()
            .map(|child| {
                let proxy = Self::child(child, &shape.name, &weak);
                (child.name.clone(), proxy)
            })
            .collect();

        Arc::new(Self {
            name: shape.name.clone(),
            qualified_name: shape.name.clone(),
            variables: variables_of(shape, &shape.name),
            children,
            connection: Connection::Owned(connection),
        })
    }

    fn child(shape: &ProxyShape, parent: &str, root: &Weak<RootConnection>) -> Arc<Self> {
        let qualified_name = format!("{parent}.{}", shape.name);
        let children = shape
            .children
            .iter()
            .map(|child| (child.name.clone(), Self::child(child, &qualified_name, root)))
            .collect();

        Arc::new(Self {
            name: shape.name.clone(),
            variables: variables_of(shape, &qualified_name),
            qualified_name,
            children,
            connection: Connection::Borrowed(root.clone()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_ok()
    }

    pub fn child_namespace(&self, name: &str) -> Option<Arc<NamespaceProxy>> {
        self.children.get(name).cloned()
    }

    /// Variable names of this node, sorted.
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    pub fn has_setter(&self, variable: &str) -> bool {
        self.variables.get(variable).is_some_and(|v| v.writable)
    }

    pub fn get(&self, variable: &str) -> Result<Value> {
        let access = self.access(variable)?;
        self.connection()?.get(&access.qualified_name)
    }

    /// Writes through the setter of `variable`. Returns the previous value.
    pub fn set(&self, variable: &str, value: Value) -> Result<Value> {
        let access = self.access(variable)?;
        if !access.writable {
            return Err(Error::ReadOnly(access.qualified_name.clone()));
        }
        self.connection()?.set(&access.qualified_name, value)
    }

    fn access(&self, variable: &str) -> Result<&VariableAccess> {
        self.variables.get(variable).ok_or_else(|| Error::UnknownMember {
            kind: "variable",
            name: format!("{}.{variable}", self.qualified_name),
        })
    }

    fn connection(&self) -> Result<Arc<RootConnection>> {
        let connection = match &self.connection {
            Connection::Owned(connection) => connection.clone(),
            Connection::Borrowed(weak) => weak.upgrade(),
        };
        connection.ok_or_else(|| Error::Disconnected(self.qualified_name.clone()))
    }
}

fn variables_of(shape: &ProxyShape, qualified: &str) -> BTreeMap<String, VariableAccess> {
    shape
        .variables
        .iter()
        .map(|(name, writable)| {
            (
                name.clone(),
                VariableAccess {
                    qualified_name: format!("{qualified}.{name}"),
                    writable: *writable,
                },
            )
        })
        .collect()
}
