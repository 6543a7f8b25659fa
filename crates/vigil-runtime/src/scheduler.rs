//! # Scheduler
//!
//! Periodic events are backed by scheduler jobs. A job is registered under a
//! unique name with a cron expression and a string-keyed data map; every
//! firing calls [`Job::execute`] with that data.
//!
//! The cron expression is opaque to lowering. It is validated here, when the
//! job is scheduled, so a malformed expression surfaces at activation time.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::{Error, Result};

/// Data key holding the cron expression of a periodic event.
pub const EXPRESSION_KEY: &str = "expression";

/// Handle of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// String data handed to a job on every firing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    data: BTreeMap<String, String>,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        self.data
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingJobData(key.to_string()))
    }
}

/// Work executed on every firing.
pub trait Job: Send + Sync {
    fn execute(&self, context: &JobContext) -> Result<()>;
}

/// Scheduling capability used by periodic events.
pub trait Scheduler: Send + Sync {
    /// Registers `job` under `name`. Fails on a malformed cron expression or a
    /// name that is already taken.
    fn schedule(
        &self,
        name: &str,
        cron: &str,
        job: Arc<dyn Job>,
        context: JobContext,
    ) -> Result<JobId>;

    fn pause(&self, id: &JobId) -> Result<()>;

    fn resume(&self, id: &JobId) -> Result<()>;

    fn unschedule(&self, id: &JobId) -> Result<()>;
}

/// A syntactically checked cron expression.
///
/// Accepts five to seven whitespace-separated fields (optional seconds and
/// year), each made of digits, names and the operators `* ? , - / L W #`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    fields: Vec<String>,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidCron {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
        if !(5..=7).contains(&fields.len()) {
            return Err(invalid(&format!(
                "expected 5 to 7 fields, found {}",
                fields.len()
            )));
        }

        for field in &fields {
            let valid = field.chars().all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '*' | '?' | ',' | '-' | '/' | '#')
            });
            if !valid {
                return Err(invalid(&format!("unexpected character in field '{field}'")));
            }
            if field.starts_with(['/', ',', '-']) || field.ends_with([',', '-', '/']) {
                return Err(invalid(&format!("dangling operator in field '{field}'")));
            }
        }

        Ok(Self {
            source: expression.trim().to_string(),
            fields,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

struct Entry {
    cron: CronExpression,
    job: Arc<dyn Job>,
    context: JobContext,
    paused: bool,
}

/// Scheduler that fires jobs only on request.
///
/// Used by tests and by hosts that drive time themselves.
#[derive(Default)]
pub struct ManualScheduler {
    jobs: RwLock<HashMap<JobId, Entry>>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fires one job unless it is paused. Returns whether it ran.
    pub fn fire(&self, id: &JobId) -> Result<bool> {
        let (job, context) = {
            let guard = self.read()?;
            let entry = guard
                .get(id)
                .ok_or_else(|| Error::UnknownJob(id.to_string()))?;
            if entry.paused {
                return Ok(false);
            }
            (Arc::clone(&entry.job), entry.context.clone())
        };
        job.execute(&context)?;
        Ok(true)
    }

    /// Fires every running job in name order. Returns how many ran.
    ///
    /// Job failures are logged and do not stop the remaining jobs.
    pub fn fire_all(&self) -> Result<usize> {
        let mut ids = self.job_ids()?;
        ids.sort();
        let mut fired = 0;
        for id in &ids {
            match self.fire(id) {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(job = %id, error = %err, "job failed"),
            }
        }
        Ok(fired)
    }

    pub fn job_ids(&self) -> Result<Vec<JobId>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    pub fn is_paused(&self, id: &JobId) -> Result<bool> {
        self.read()?
            .get(id)
            .map(|entry| entry.paused)
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }

    /// The cron expression a job was scheduled with.
    pub fn cron(&self, id: &JobId) -> Result<String> {
        self.read()?
            .get(id)
            .map(|entry| entry.cron.as_str().to_string())
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<JobId, Entry>>> {
        self.jobs
            .read()
            .map_err(|_| Error::Internal("scheduler poisoned".to_string()))
    }

    fn set_paused(&self, id: &JobId, paused: bool) -> Result<()> {
        let mut guard = self
            .jobs
            .write()
            .map_err(|_| Error::Internal("scheduler poisoned".to_string()))?;
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| Error::UnknownJob(id.to_string()))?;
        entry.paused = paused;
        Ok(())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(
        &self,
        name: &str,
        cron: &str,
        job: Arc<dyn Job>,
        context: JobContext,
    ) -> Result<JobId> {
        let cron = CronExpression::parse(cron)?;
        let id = JobId(name.to_string());
        let mut guard = self
            .jobs
            .write()
            .map_err(|_| Error::Internal("scheduler poisoned".to_string()))?;
        if guard.contains_key(&id) {
            return Err(Error::DuplicateJob(name.to_string()));
        }
        tracing::debug!(job = %id, cron = cron.as_str(), "job scheduled");
        guard.insert(
            id.clone(),
            Entry {
                cron,
                job,
                context,
                paused: false,
            },
        );
        Ok(id)
    }

    fn pause(&self, id: &JobId) -> Result<()> {
        self.set_paused(id, true)
    }

    fn resume(&self, id: &JobId) -> Result<()> {
        self.set_paused(id, false)
    }

    fn unschedule(&self, id: &JobId) -> Result<()> {
        let mut guard = self
            .jobs
            .write()
            .map_err(|_| Error::Internal("scheduler poisoned".to_string()))?;
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }
}
