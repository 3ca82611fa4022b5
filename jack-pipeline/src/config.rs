//! Orchestrator configuration
//!
//! Defines the settings the orchestrator consumes: how to reach the build
//! server, how job names are prefixed, how long to wait for a triggered
//! build to appear, and how shared library docs are displayed.

use std::time::Duration;

/// Separator between the configured prefix and the job name
pub const JOB_PREFIX_DELIMITER: char = '-';

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Build server base URL (e.g., "http://localhost:8080")
    pub server_url: String,

    /// User name for API authentication
    pub username: Option<String>,

    /// API token for API authentication
    pub api_token: Option<String>,

    /// Prefix prepended to every ad hoc job name
    pub job_prefix: Option<String>,

    /// Open shared library docs in a browser instead of rendering them inline
    pub browser_shared_library_ref: bool,

    /// How long to wait for a triggered build to become visible
    ///
    /// Also the number of readiness queries, one per second by default.
    pub ready_timeout: Duration,

    /// Delay between readiness queries
    pub ready_poll_interval: Duration,

    /// Poll delay hint handed to the console stream
    pub log_poll_delay: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(server_url: String) -> Self {
        Self {
            server_url,
            username: None,
            api_token: None,
            job_prefix: None,
            browser_shared_library_ref: false,
            ready_timeout: Duration::from_secs(10),
            ready_poll_interval: Duration::from_millis(1000),
            log_poll_delay: Duration::from_millis(500),
        }
    }

    /// Sets the job prefix
    pub fn with_job_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.job_prefix = Some(prefix.into());
        self
    }

    /// Number of readiness queries before giving up
    ///
    /// One query per whole second of `ready_timeout`, at least one.
    pub fn ready_attempts(&self) -> u32 {
        u32::try_from(self.ready_timeout.as_secs())
            .unwrap_or(u32::MAX)
            .max(1)
    }

    /// Resolves the effective job name
    ///
    /// The prefix and delimiter are prepended unless the prefix is absent or
    /// blank.
    pub fn job_name(&self, job: &str) -> String {
        match self.job_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}{}{}", prefix, JOB_PREFIX_DELIMITER, job)
            }
            _ => job.to_string(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_url.is_empty() {
            anyhow::bail!("server_url cannot be empty");
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            anyhow::bail!("server_url must start with http:// or https://");
        }

        if self.api_token.is_some() && self.username.is_none() {
            anyhow::bail!("api_token requires a username");
        }

        if self.ready_timeout.as_secs() == 0 {
            anyhow::bail!("ready_timeout must be at least one second");
        }

        if self.ready_poll_interval.is_zero() {
            anyhow::bail!("ready_poll_interval must be greater than 0");
        }

        if self.log_poll_delay.is_zero() {
            anyhow::bail!("log_poll_delay must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}
