//! Pipeline configuration
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, `DONOR_TALLY_*` environment variables, and finally whatever the
//! caller sets explicitly (the CLI flags).

use crate::error::{Result, TallyError};
use serde::{Deserialize, Serialize};

pub mod loader;

pub use crate::extract::FirstNamePolicy;
pub use loader::ConfigLoader;

pub const DEFAULT_WORKER_COUNT: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

pub const ENV_WORKERS: &str = "DONOR_TALLY_WORKERS";
pub const ENV_BATCH_SIZE: &str = "DONOR_TALLY_BATCH_SIZE";
pub const ENV_QUEUE_CAPACITY: &str = "DONOR_TALLY_QUEUE_CAPACITY";
pub const ENV_FIRST_NAME_POLICY: &str = "DONOR_TALLY_FIRST_NAME_POLICY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of parallel workers
    pub worker_count: usize,
    /// Records per batch handed to a worker
    pub batch_size: usize,
    /// Batches the distribution queue holds before the reader stalls.
    /// Defaults to twice the worker count.
    pub queue_capacity: Option<usize>,
    pub first_name_policy: FirstNamePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: None,
            first_name_policy: FirstNamePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(worker_count: usize, batch_size: usize) -> Self {
        Self {
            worker_count,
            batch_size,
            ..Self::default()
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_first_name_policy(mut self, policy: FirstNamePolicy) -> Self {
        self.first_name_policy = policy;
        self
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.worker_count.saturating_mul(2))
            .max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(TallyError::invalid_configuration(
                "worker_count",
                self.worker_count,
                "must be at least 1",
            ));
        }
        if self.batch_size == 0 {
            return Err(TallyError::invalid_configuration(
                "batch_size",
                self.batch_size,
                "must be at least 1",
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(TallyError::invalid_configuration(
                "queue_capacity",
                0,
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Apply `DONOR_TALLY_*` overrides from the process environment
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn merge_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.worker_count = parse_count(ENV_WORKERS, &workers)?;
        }

        if let Some(batch_size) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = parse_count(ENV_BATCH_SIZE, &batch_size)?;
        }

        if let Some(capacity) = lookup(ENV_QUEUE_CAPACITY) {
            self.queue_capacity = Some(parse_count(ENV_QUEUE_CAPACITY, &capacity)?);
        }

        if let Some(policy) = lookup(ENV_FIRST_NAME_POLICY) {
            self.first_name_policy = policy.parse().map_err(|reason| {
                TallyError::invalid_configuration(ENV_FIRST_NAME_POLICY, &policy, reason)
            })?;
        }

        Ok(())
    }
}

fn parse_count(field: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| {
            TallyError::invalid_configuration(field, value, e.to_string())
        })
}
