//! The build server seam
//!
//! `BuildServer` lists every remote operation the orchestrator consumes.
//! `JenkinsClient` is the HTTP implementation; tests use in-memory fakes.

use async_trait::async_trait;
use jack_core::domain::job::JobMetadata;
use jack_core::domain::log::LogEvent;
use jack_core::domain::node::Node;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::JenkinsClient;
use crate::error::Result;

/// Receiving end of a build's console stream
///
/// Yields `Data`/`Error` events and finally `End`. A closed channel without
/// `End` means the producer went away and is treated as the end of the stream.
pub type LogStream = mpsc::Receiver<LogEvent>;

/// Remote operations against the build server
#[async_trait]
pub trait BuildServer: Send + Sync {
    /// Fetches job metadata by name
    ///
    /// Returns `Ok(None)` when the job does not exist.
    async fn get_job(&self, name: &str) -> Result<Option<JobMetadata>>;

    /// Fetches a job's configuration document
    async fn get_job_config(&self, name: &str) -> Result<String>;

    /// Creates a job from a configuration document
    async fn create_job(&self, name: &str, config: &str) -> Result<()>;

    /// Replaces an existing job's configuration document
    async fn update_job_config(&self, name: &str, config: &str) -> Result<()>;

    /// Asks the server to start a build
    ///
    /// Parameterized jobs must be triggered with a parameter map, even an
    /// empty one; an error means the server rejected the trigger.
    async fn trigger_build(
        &self,
        name: &str,
        parameters: Option<&HashMap<String, String>>,
    ) -> Result<()>;

    /// Checks whether a build number of a job is fetchable yet
    async fn build_exists(&self, name: &str, number: u64) -> Result<bool>;

    /// Opens the console stream of a build
    ///
    /// # Arguments
    /// * `delay` - How long the producer waits between polls of the console
    async fn open_log_stream(&self, name: &str, number: u64, delay: Duration) -> Result<LogStream>;

    /// Asks the server to stop a running build
    async fn stop_build(&self, name: &str, number: u64) -> Result<()>;

    /// Executes a script on the controller (`node = None`) or on a node
    async fn run_script(&self, script: &str, node: Option<&str>) -> Result<String>;

    /// Lists the agent nodes registered with the server
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Fetches an arbitrary page, relative to the server root
    async fn get_page(&self, path: &str) -> Result<String>;
}

#[async_trait]
impl BuildServer for JenkinsClient {
    async fn get_job(&self, name: &str) -> Result<Option<JobMetadata>> {
        JenkinsClient::get_job(self, name).await
    }

    async fn get_job_config(&self, name: &str) -> Result<String> {
        JenkinsClient::get_job_config(self, name).await
    }

    async fn create_job(&self, name: &str, config: &str) -> Result<()> {
        JenkinsClient::create_job(self, name, config).await
    }

    async fn update_job_config(&self, name: &str, config: &str) -> Result<()> {
        JenkinsClient::update_job_config(self, name, config).await
    }

    async fn trigger_build(
        &self,
        name: &str,
        parameters: Option<&HashMap<String, String>>,
    ) -> Result<()> {
        JenkinsClient::trigger_build(self, name, parameters).await
    }

    async fn build_exists(&self, name: &str, number: u64) -> Result<bool> {
        JenkinsClient::build_exists(self, name, number).await
    }

    async fn open_log_stream(&self, name: &str, number: u64, delay: Duration) -> Result<LogStream> {
        JenkinsClient::open_log_stream(self, name, number, delay)
    }

    async fn stop_build(&self, name: &str, number: u64) -> Result<()> {
        JenkinsClient::stop_build(self, name, number).await
    }

    async fn run_script(&self, script: &str, node: Option<&str>) -> Result<String> {
        JenkinsClient::run_script(self, script, node).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        JenkinsClient::list_nodes(self).await
    }

    async fn get_page(&self, path: &str) -> Result<String> {
        JenkinsClient::get_page(self, path).await
    }
}
