//! Configuration module
//!
//! Maps command-line flags (with environment fallbacks) onto the pipeline
//! configuration and builds the client and orchestrator from it.

use anyhow::{Context as _, Result};
use clap::Args;
use jack_client::JenkinsClient;
use jack_pipeline::{Config, PipelineOrchestrator};
use std::sync::Arc;
use std::time::Duration;

/// Server connection and orchestration settings
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Build server URL
    #[arg(long, env = "JACK_SERVER_URL", default_value = "http://localhost:8080", global = true)]
    server_url: String,

    /// User name for API authentication
    #[arg(long, env = "JACK_USERNAME", global = true)]
    username: Option<String>,

    /// API token for API authentication
    #[arg(long, env = "JACK_API_TOKEN", hide_env_values = true, global = true)]
    api_token: Option<String>,

    /// Prefix prepended to pipeline job names
    #[arg(long, env = "JACK_JOB_PREFIX", global = true)]
    job_prefix: Option<String>,

    /// Print shared library doc links instead of their HTML
    #[arg(long, env = "JACK_BROWSER_SHARED_LIB_REF", global = true)]
    browser_shared_lib_ref: bool,

    /// Seconds to wait for a triggered build to appear
    #[arg(long, env = "JACK_READY_TIMEOUT", default_value = "10", global = true)]
    ready_timeout: u64,

    /// Milliseconds between readiness checks
    #[arg(long, env = "JACK_READY_POLL_MS", default_value = "1000", global = true)]
    ready_poll_ms: u64,

    /// Milliseconds between console polls
    #[arg(long, env = "JACK_LOG_POLL_MS", default_value = "500", global = true)]
    log_poll_ms: u64,
}

impl ServerArgs {
    /// Builds and validates the pipeline configuration
    pub fn into_config(self) -> Result<Config> {
        let mut config = Config::new(self.server_url);
        config.username = self.username;
        config.api_token = self.api_token;
        config.job_prefix = self.job_prefix;
        config.browser_shared_library_ref = self.browser_shared_lib_ref;
        config.ready_timeout = Duration::from_secs(self.ready_timeout);
        config.ready_poll_interval = Duration::from_millis(self.ready_poll_ms);
        config.log_poll_delay = Duration::from_millis(self.log_poll_ms);

        config.validate()?;
        Ok(config)
    }
}

/// Everything a command handler needs
pub struct Context {
    pub client: Arc<JenkinsClient>,
    pub orchestrator: PipelineOrchestrator<JenkinsClient>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let mut client = JenkinsClient::new(&config.server_url)
            .with_context(|| format!("Invalid server URL: {}", config.server_url))?;

        if let (Some(user), Some(token)) = (&config.username, &config.api_token) {
            client = client.with_credentials(user.clone(), token.clone());
        }

        let client = Arc::new(client);
        let orchestrator = PipelineOrchestrator::new(Arc::clone(&client), config);
        Ok(Self {
            client,
            orchestrator,
        })
    }
}
