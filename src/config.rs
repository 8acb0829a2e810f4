//! Client and worker configuration.
//!
//! Values are resolved in order: explicit parameter, environment variable,
//! built-in default. The credential and endpoint have no default; missing
//! either is a CONFIGURATION_ERROR.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{JobError, Result};

/// Base URL of the serverless job-queue API.
pub const DEFAULT_API_BASE: &str = "https://api.runpod.ai/v2";

/// Interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Observation budget for one job.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Model checkpoint directory inside the worker image.
pub const DEFAULT_MODEL_PATH: &str = "/app/ckpt";

/// Generator executable invoked by the worker.
pub const DEFAULT_GENERATOR_CMD: &str = "heartmula-generate";

/// HeartMuLa model size passed to the generator.
pub const DEFAULT_MODEL_VERSION: &str = "3B";

pub const ENV_API_KEY: &str = "RUNPOD_API_KEY";
pub const ENV_ENDPOINT_ID: &str = "RUNPOD_ENDPOINT_ID";
pub const ENV_API_BASE: &str = "RUNPOD_API_BASE";
pub const ENV_TIMEOUT_SECS: &str = "HEARTMULA_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_SECS: &str = "HEARTMULA_POLL_INTERVAL_SECS";
pub const ENV_MODEL_PATH: &str = "MODEL_PATH";
pub const ENV_GENERATOR_CMD: &str = "HEARTMULA_GENERATOR_CMD";
pub const ENV_MODEL_VERSION: &str = "HEARTMULA_MODEL_VERSION";

/// Settings for talking to one serverless endpoint.
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer credential for the job-queue API.
    pub api_key: String,

    /// Identifier of the deployed endpoint.
    pub endpoint_id: String,

    /// API base URL, without the endpoint id.
    pub api_base: String,

    /// Interval between status polls.
    pub poll_interval: Duration,

    /// Wall-clock budget for observing one job.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Resolves configuration from explicit values and the process environment.
    pub fn resolve(api_key: Option<String>, endpoint_id: Option<String>) -> Result<Self> {
        Self::resolve_with(api_key, endpoint_id, |name| std::env::var(name).ok())
    }

    /// Resolves configuration using `lookup` in place of the environment.
    ///
    /// Empty strings count as unset.
    pub fn resolve_with<F>(
        api_key: Option<String>,
        endpoint_id: Option<String>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup(ENV_API_KEY))
            .ok_or_else(|| JobError::missing_config("API key", ENV_API_KEY))?;

        let endpoint_id = endpoint_id
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup(ENV_ENDPOINT_ID))
            .ok_or_else(|| JobError::missing_config("Endpoint ID", ENV_ENDPOINT_ID))?;

        let mut config = Self {
            api_key,
            endpoint_id,
            api_base: lookup(ENV_API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        };

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                config.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = lookup(ENV_POLL_INTERVAL_SECS).and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                config.poll_interval = Duration::from_secs(secs);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Overrides the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the observation budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Returns `{api_base}/{endpoint_id}`.
    pub fn endpoint_url(&self) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), self.endpoint_id)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(JobError::configuration(format!(
                "{} must be an http(s) URL, got {}",
                ENV_API_BASE, self.api_base
            )));
        }
        if self.endpoint_id.contains('/') {
            return Err(JobError::configuration(format!(
                "Endpoint ID must not contain '/': {}",
                self.endpoint_id
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(JobError::configuration("poll interval must be > 0"));
        }
        if self.timeout.is_zero() {
            return Err(JobError::configuration("timeout must be > 0"));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint_id", &self.endpoint_id)
            .field("api_base", &self.api_base)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the worker process.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Directory holding the model checkpoints.
    pub model_path: PathBuf,

    /// Model size passed to the generator (e.g. "3B").
    pub model_version: String,

    /// Generator executable.
    pub generator_command: PathBuf,
}

impl WorkerConfig {
    /// Creates a WorkerConfig from environment variables.
    ///
    /// Reads `MODEL_PATH`, `HEARTMULA_GENERATOR_CMD` and
    /// `HEARTMULA_MODEL_VERSION`, falling back to defaults for unset variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a WorkerConfig using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_MODEL_PATH) {
            config.model_path = PathBuf::from(path);
        }
        if let Some(cmd) = lookup(ENV_GENERATOR_CMD) {
            config.generator_command = PathBuf::from(cmd);
        }
        if let Some(version) = lookup(ENV_MODEL_VERSION) {
            config.model_version = version;
        }

        config
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            generator_command: PathBuf::from(DEFAULT_GENERATOR_CMD),
        }
    }
}
