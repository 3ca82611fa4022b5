//! Build-related API endpoints

use crate::JenkinsClient;
use crate::error::Result;
use crate::server::LogStream;
use jack_core::domain::log::LogEvent;
use reqwest::{Method, Url};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events buffered between the console poller and its consumer
const LOG_STREAM_CAPACITY: usize = 64;

/// Consecutive failed polls after which the console stream gives up
const MAX_CONSECUTIVE_LOG_ERRORS: u32 = 3;

/// One poll of the progressive console endpoint
struct ConsoleChunk {
    text: String,
    next_offset: u64,
    more_data: bool,
}

impl JenkinsClient {
    // =============================================================================
    // Build Lifecycle
    // =============================================================================

    /// Trigger a build of a job
    ///
    /// # Arguments
    /// * `name` - The job name
    /// * `parameters` - Build parameters; `Some` (even if empty) is required
    ///   for parameterized jobs
    pub async fn trigger_build(
        &self,
        name: &str,
        parameters: Option<&HashMap<String, String>>,
    ) -> Result<()> {
        let request = match parameters {
            Some(params) => {
                let url = self.job_endpoint(name, &["buildWithParameters"])?;
                self.request(Method::POST, url).form(params)
            }
            None => {
                let url = self.job_endpoint(name, &["build"])?;
                self.request(Method::POST, url)
            }
        };

        let response = request.send().await?;
        self.handle_empty_response(response).await
    }

    /// Check whether a build exists
    ///
    /// # Returns
    /// `true` once the server exposes the build, `false` on 404
    pub async fn build_exists(&self, name: &str, number: u64) -> Result<bool> {
        let number = number.to_string();
        let url = self.job_endpoint(name, &[number.as_str(), "api", "json"])?;
        let response = self.request(Method::GET, url).send().await?;

        match self.handle_empty_response(response).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stop a running build
    pub async fn stop_build(&self, name: &str, number: u64) -> Result<()> {
        let number = number.to_string();
        let url = self.job_endpoint(name, &[number.as_str(), "stop"])?;
        let response = self.request(Method::POST, url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Console Streaming
    // =============================================================================

    /// Open a build's console stream
    ///
    /// Spawns a task that polls the progressive console endpoint every
    /// `delay`, forwarding new text as `LogEvent::Data`. The task sends
    /// `LogEvent::End` once the server reports no more data, or after
    /// repeated poll failures. Dropping the receiver stops the task.
    pub fn open_log_stream(&self, name: &str, number: u64, delay: Duration) -> Result<LogStream> {
        let number = number.to_string();
        let url = self.job_endpoint(name, &[number.as_str(), "logText", "progressiveText"])?;
        let (tx, rx) = mpsc::channel(LOG_STREAM_CAPACITY);

        let client = self.clone();
        tokio::spawn(async move {
            client.pump_console(url, delay, tx).await;
        });

        Ok(rx)
    }

    async fn pump_console(&self, url: Url, delay: Duration, tx: mpsc::Sender<LogEvent>) {
        let mut offset = 0u64;
        let mut failures = 0u32;

        loop {
            match self.fetch_console(&url, offset).await {
                Ok(chunk) => {
                    failures = 0;
                    offset = chunk.next_offset;

                    if !chunk.text.is_empty() && tx.send(LogEvent::Data(chunk.text)).await.is_err() {
                        debug!("Console consumer went away, stopping poller");
                        return;
                    }

                    if !chunk.more_data {
                        let _ = tx.send(LogEvent::End).await;
                        return;
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Console poll failed (attempt {}/{}): {}",
                        failures, MAX_CONSECUTIVE_LOG_ERRORS, e
                    );

                    if tx.send(LogEvent::Error(e.to_string())).await.is_err() {
                        return;
                    }

                    if failures >= MAX_CONSECUTIVE_LOG_ERRORS {
                        let _ = tx.send(LogEvent::End).await;
                        return;
                    }
                }
            }

            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_console(&self, url: &Url, offset: u64) -> Result<ConsoleChunk> {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("start", &offset.to_string());

        let response = Self::check_status(self.request(Method::GET, url).send().await?).await?;

        let headers = response.headers();
        let next_offset = headers
            .get("X-Text-Size")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let more_data = headers
            .get("X-More-Data")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let text = response.text().await?;
        let next_offset = next_offset.unwrap_or(offset + text.len() as u64);

        Ok(ConsoleChunk {
            text,
            next_offset,
            more_data,
        })
    }
}
