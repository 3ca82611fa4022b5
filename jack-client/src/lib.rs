//! Jack HTTP Client
//!
//! A type-safe client for the build server's REST API, and the
//! [`BuildServer`] trait the pipeline orchestrator is written against.
//!
//! The orchestrator never talks HTTP directly: every remote operation goes
//! through `BuildServer`, so tests can substitute an in-memory server.
//!
//! # Example
//!
//! ```no_run
//! use jack_client::{BuildServer, JenkinsClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = JenkinsClient::new("http://localhost:8080")?
//!         .with_credentials("admin", "api-token");
//!
//!     if let Some(job) = client.get_job("ci-demo").await? {
//!         println!("next build: #{}", job.next_build_number);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod builds;
mod jobs;
mod scripts;
mod server;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use server::{BuildServer, LogStream};

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

/// HTTP client for a Jenkins-compatible build server
///
/// Endpoints are organized into logical groups:
/// - Jobs (metadata, configuration, create/update)
/// - Builds (trigger, existence, stop, console streaming)
/// - Scripts and nodes (script console, computer list, raw pages)
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    /// Base URL of the server (e.g., "http://localhost:8080/jenkins")
    base_url: Url,
    /// Basic auth credentials (user, API token)
    credentials: Option<(String, String)>,
    /// HTTP client instance
    client: Client,
}

impl JenkinsClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use jack_client::JenkinsClient;
    ///
    /// let client = JenkinsClient::new("http://localhost:8080/").unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:8080");
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid server URL: {}", e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidRequest(format!(
                "Server URL cannot be used as a base: {}",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            credentials: None,
            client,
        })
    }

    /// Authenticate every request with a user name and API token
    pub fn with_credentials(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), token.into()));
        self
    }

    /// Get the base URL of the server, without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    // =============================================================================
    // URL Construction
    // =============================================================================

    /// Build an endpoint URL from path segments, each percent-encoded
    pub(crate) fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest("Server URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build an endpoint URL under a job
    ///
    /// Folder paths such as `team/ci-demo` become `job/team/job/ci-demo`.
    pub(crate) fn job_endpoint(&self, job: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = job_segments(job);
        if segments.is_empty() {
            return Err(ClientError::InvalidRequest("Job name is empty".to_string()));
        }
        segments.extend(rest.iter().map(|s| s.to_string()));
        self.endpoint(&segments)
    }

    /// Start a request, attaching credentials when configured
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, token)) => builder.basic_auth(user, Some(token)),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response and return the raw body
    async fn handle_text(&self, response: reqwest::Response) -> Result<String> {
        let response = Self::check_status(response).await?;
        Ok(response.text().await?)
    }

    /// Handle an API response that carries no useful content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

/// Split a possibly foldered job name into `job/<segment>` pairs
fn job_segments(job: &str) -> Vec<String> {
    job.split('/')
        .filter(|s| !s.is_empty())
        .flat_map(|s| ["job".to_string(), s.to_string()])
        .collect()
}
