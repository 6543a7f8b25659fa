//! # Failure Policy
//!
//! Generated constructors never propagate construction-time failures (probe,
//! consumer or proxy instantiation, custom code blocks). They hand them to a
//! [`FailurePolicy`] and carry on with a partially wired object.
//!
//! [`LogAndContinue`] is the default and reports through `tracing`.
//! [`CapturingPolicy`] records failures so tests can assert on them.

use std::sync::{Arc, Mutex};

use crate::Error;

/// Strategy receiving failures that generated code swallows.
pub trait FailurePolicy: Send + Sync {
    /// Called once per swallowed failure. `site` names the generated member
    /// whose failure boundary caught the error (e.g. `Perf::new`).
    fn on_failure(&self, site: &str, error: &Error);
}

/// Logs the failure at error level and continues.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAndContinue;

impl FailurePolicy for LogAndContinue {
    fn on_failure(&self, site: &str, error: &Error) {
        tracing::error!(site = site, error = %error, "construction failure ignored");
    }
}

/// A failure recorded by [`CapturingPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub site: String,
    pub message: String,
}

/// Records every failure in memory (and still logs it).
#[derive(Debug, Default)]
pub struct CapturingPolicy {
    failures: Mutex<Vec<Failure>>,
}

impl CapturingPolicy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the failures recorded so far.
    pub fn failures(&self) -> Vec<Failure> {
        self.failures
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.failures().is_empty()
    }
}

impl FailurePolicy for CapturingPolicy {
    fn on_failure(&self, site: &str, error: &Error) {
        tracing::warn!(site = site, error = %error, "construction failure captured");
        if let Ok(mut guard) = self.failures.lock() {
            guard.push(Failure {
                site: site.to_string(),
                message: error.to_string(),
            });
        }
    }
}

/// Runs `f`, routing an error to `policy` instead of returning it.
///
/// Returns `Some` with the value on success.
pub fn guarded<T>(
    policy: &dyn FailurePolicy,
    site: &str,
    f: impl FnOnce() -> crate::Result<T>,
) -> Option<T> {
    match f() {
        Ok(value) => Some(value),
        Err(err) => {
            policy.on_failure(site, &err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_swallows_and_records() {
        let policy = CapturingPolicy::new();
        let out: Option<()> = guarded(policy.as_ref(), "Perf::new", || Err(Error::user("boom")));
        assert!(out.is_none());
        assert_eq!(
            policy.failures(),
            vec![Failure {
                site: "Perf::new".to_string(),
                message: "boom".to_string()
            }]
        );
    }

    #[test]
    fn guarded_passes_values_through() {
        let policy = CapturingPolicy::new();
        assert_eq!(guarded(policy.as_ref(), "x", || Ok(7)), Some(7));
        assert!(policy.is_empty());
    }
}
