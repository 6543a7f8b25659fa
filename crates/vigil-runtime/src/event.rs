//! # Event Payloads
//!
//! The payload types delivered to monitors. Every payload carries the
//! identifier of the transaction it belongs to (one intercepted call raises
//! several events sharing a transaction), its own identifier, and the time it
//! was raised.
//!
//! | payload          | raised by                         | `value()`            |
//! |------------------|-----------------------------------|----------------------|
//! | `IntervalEvent`  | the scheduler, per cron firing    | timestamp (ms)       |
//! | `InvokeEvent`    | a probe, before the call          | timestamp (ms)       |
//! | `ReturnEvent`    | a probe, after a successful call  | timestamp (ms)       |
//! | `ExceptionEvent` | a probe, after a failed call      | timestamp (ms)       |
//! | `TimeLapseEvent` | a probe, after the call           | elapsed nanoseconds  |
//! | `ChangeEvent`    | a namespace proxy, on write       | current value        |

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Runtime type tag of an event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Interval,
    Invoke,
    Return,
    Exception,
    TimeLapse,
    Change,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Interval,
        EventType::Invoke,
        EventType::Return,
        EventType::Exception,
        EventType::TimeLapse,
        EventType::Change,
    ];

    /// The payload type name as written in handler parameter declarations.
    pub fn type_name(self) -> &'static str {
        match self {
            EventType::Interval => "IntervalEvent",
            EventType::Invoke => "InvokeEvent",
            EventType::Return => "ReturnEvent",
            EventType::Exception => "ExceptionEvent",
            EventType::TimeLapse => "TimeLapseEvent",
            EventType::Change => "ChangeEvent",
        }
    }

    /// Resolves a declared payload type name, accepting qualified names.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let simple = name.rsplit(['.', ':']).next().unwrap_or(name);
        Self::ALL.into_iter().find(|t| t.type_name() == simple)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Identity shared by every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub transaction_id: Uuid,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl EventHeader {
    /// A fresh header inside the given transaction.
    pub fn new(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}

/// Method coordinates of an intercepted call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// The class providing the method.
    pub class: String,
    pub method: String,
    /// Formal parameter type names.
    pub parameters: Vec<String>,
    /// Actual arguments, when the probe captured them.
    #[serde(default)]
    pub arguments: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalEvent {
    pub header: EventHeader,
    /// The cron expression that fired.
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeEvent {
    pub header: EventHeader,
    pub call: MethodCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnEvent {
    pub header: EventHeader,
    pub call: MethodCall,
    pub returned: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionEvent {
    pub header: EventHeader,
    pub call: MethodCall,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLapseEvent {
    pub header: EventHeader,
    /// Monotonic start and end of the call, in nanoseconds.
    pub start: u64,
    pub end: u64,
}

/// A namespace variable changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub header: EventHeader,
    pub previous: Value,
    pub current: Value,
    /// Dotted path of the variable relative to its root namespace.
    pub variable: String,
}

/// Any payload the substrate can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    Interval(IntervalEvent),
    Invoke(InvokeEvent),
    Return(ReturnEvent),
    Exception(ExceptionEvent),
    TimeLapse(TimeLapseEvent),
    Change(ChangeEvent),
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Interval(_) => EventType::Interval,
            Event::Invoke(_) => EventType::Invoke,
            Event::Return(_) => EventType::Return,
            Event::Exception(_) => EventType::Exception,
            Event::TimeLapse(_) => EventType::TimeLapse,
            Event::Change(_) => EventType::Change,
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            Event::Interval(e) => &e.header,
            Event::Invoke(e) => &e.header,
            Event::Return(e) => &e.header,
            Event::Exception(e) => &e.header,
            Event::TimeLapse(e) => &e.header,
            Event::Change(e) => &e.header,
        }
    }

    /// The characteristic value of the payload (see the module table).
    pub fn value(&self) -> Value {
        match self {
            Event::TimeLapse(e) => Value::from(e.end.saturating_sub(e.start)),
            Event::Change(e) => e.current.clone(),
            other => Value::from(other.header().timestamp.timestamp_millis()),
        }
    }

    pub fn as_change(&self) -> Option<&ChangeEvent> {
        match self {
            Event::Change(e) => Some(e),
            _ => None,
        }
    }
}

impl IntervalEvent {
    /// A fresh interval event in its own transaction.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            header: EventHeader::new(Uuid::new_v4()),
            expression: expression.into(),
        }
    }
}

impl ChangeEvent {
    pub fn new(variable: impl Into<String>, previous: Value, current: Value) -> Self {
        Self {
            header: EventHeader::new(Uuid::new_v4()),
            previous,
            current,
            variable: variable.into(),
        }
    }
}

impl TimeLapseEvent {
    pub fn elapsed_nanos(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        write!(
            f,
            "{}\t{}\t{}",
            self.event_type(),
            header.transaction_id,
            header.id
        )?;
        match self {
            Event::Interval(e) => write!(f, "\t{}", e.expression)?,
            Event::Invoke(e) => write!(f, "\t{}\t{}", e.call.class, e.call.method)?,
            Event::Return(e) => write!(f, "\t{}\t{}\t{}", e.call.class, e.call.method, e.returned)?,
            Event::Exception(e) => {
                write!(f, "\t{}\t{}\t{}", e.call.class, e.call.method, e.message)?
            }
            Event::TimeLapse(_) => {}
            Event::Change(e) => write!(f, "\t{}\t{}", e.variable, e.previous)?,
        }
        write!(f, "\t{}", self.value())
    }
}
