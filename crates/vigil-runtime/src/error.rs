//! # Runtime Errors
//!
//! Every fallible operation of the runtime substrate returns [`Result`].
//! Construction-time failures are not propagated by generated code; they are
//! handed to a [`crate::failure::FailurePolicy`] instead.

use thiserror::Error;

/// Errors raised by the runtime substrate.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying SQLite store failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store schema is missing or has an unexpected version.
    #[error("schema error: {0}")]
    Schema(String),

    /// A qualified variable name is not registered in the store.
    #[error("variable '{0}' is not registered")]
    UnknownVariable(String),

    /// A proxy setter was requested for a variable without write access.
    #[error("variable '{0}' is read-only")]
    ReadOnly(String),

    /// A value is not numeric and cannot take part in a decimal comparison.
    #[error("value '{0}' is not numeric")]
    NotNumeric(String),

    /// Decimal arithmetic left the representable range.
    #[error("decimal overflow in {0}")]
    Overflow(String),

    /// A cron expression was rejected by the scheduler.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// A job entry was not found in the scheduler.
    #[error("job '{0}' is not scheduled")]
    UnknownJob(String),

    /// A job name is already taken.
    #[error("job '{0}' is already scheduled")]
    DuplicateJob(String),

    /// A job context is missing a required data entry.
    #[error("job data is missing '{0}'")]
    MissingJobData(String),

    /// A consumer could not bind or deliver.
    #[error("consumer '{queue}' failed: {message}")]
    Consumer { queue: String, message: String },

    /// A probe could not be opened or started.
    #[error("probe '{routing_key}' failed: {message}")]
    Probe { routing_key: String, message: String },

    /// The root namespace connection is gone or was never established.
    #[error("namespace '{0}' has no root connection")]
    Disconnected(String),

    /// A handler was subscribed to an event it cannot observe.
    #[error("handler '{handler}' cannot observe event '{event}'")]
    IncompatibleHandler { event: String, handler: String },

    /// A named member of a generated type does not exist.
    #[error("unknown {kind} '{name}'")]
    UnknownMember { kind: &'static str, name: String },

    /// A user body (handler or code block) has no binding.
    #[error("no binding for '{0}'")]
    Unbound(String),

    /// A user body reported a failure.
    #[error("{0}")]
    User(String),

    /// Internal invariant violation (poisoned lock, dead worker thread).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the runtime.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a user-body failure.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    /// Creates a consumer failure.
    pub fn consumer(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consumer {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Creates a probe failure.
    pub fn probe(routing_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            routing_key: routing_key.into(),
            message: message.into(),
        }
    }
}
