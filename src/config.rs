//! Processor configuration.
//!
//! Values come from the builder methods, from the environment
//! (`PACED_WORK_CONCURRENCY`, `PACED_WORK_MS`, `PACED_WORK_HIGH_WATER_MARK`)
//! or from a YAML document. Missing keys fall back to the defaults.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_WORK_MS: u64 = 0;
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacedConfig {
    /// Maximum number of work units in flight at once.
    pub concurrency: usize,
    /// Minimum wall-clock milliseconds a chunk occupies. 0 disables pacing.
    pub work_ms: u64,
    /// Output buffer capacity of the stream adapter. Not interpreted by the core.
    pub high_water_mark: usize,
}

impl Default for PacedConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            work_ms: DEFAULT_WORK_MS,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl PacedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_work_ms(mut self, ms: u64) -> Self {
        self.work_ms = ms;
        self
    }

    pub fn with_work_duration(mut self, d: Duration) -> Self {
        self.work_ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_high_water_mark(mut self, n: usize) -> Self {
        self.high_water_mark = n.max(1);
        self
    }

    /// Pacing floor as a `Duration`.
    pub fn work_duration(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(n) = env_parse::<usize>("PACED_WORK_CONCURRENCY")? {
            cfg.concurrency = n;
        }
        if let Some(ms) = env_parse::<u64>("PACED_WORK_MS")? {
            cfg.work_ms = ms;
        }
        if let Some(n) = env_parse::<usize>("PACED_WORK_HIGH_WATER_MARK")? {
            cfg.high_water_mark = n;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid YAML configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::configuration_with_context(
                "concurrency must be a positive integer",
                ErrorContext::new()
                    .with_field_path("concurrency")
                    .with_details("got 0"),
            ));
        }
        if self.high_water_mark == 0 {
            return Err(Error::configuration_with_context(
                "high_water_mark must be a positive integer",
                ErrorContext::new()
                    .with_field_path("high_water_mark")
                    .with_details("got 0"),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("cannot parse environment variable {}", key),
                ErrorContext::new()
                    .with_field_path(key)
                    .with_details(format!("got {:?}", raw))
                    .with_source("env"),
            )
        }),
        Err(_) => Ok(None),
    }
}
