//! In-memory build server for tests
//!
//! Records every call in order and answers from scripted state. Jobs created
//! through it start at build #1 without parameters.

use async_trait::async_trait;
use jack_client::{BuildServer, ClientError, LogStream, Result};
use jack_core::domain::job::JobMetadata;
use jack_core::domain::log::LogEvent;
use jack_core::domain::node::Node;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// One recorded call against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetJob(String),
    GetJobConfig(String),
    CreateJob { name: String, config: String },
    UpdateJobConfig { name: String, config: String },
    TriggerBuild { name: String, parameters: Option<HashMap<String, String>> },
    BuildExists { name: String, number: u64 },
    OpenLogStream { name: String, number: u64 },
    StopBuild { name: String, number: u64 },
    RunScript { node: Option<String> },
    ListNodes,
    GetPage(String),
}

impl Call {
    /// Whether the call changes server state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateJob { .. }
                | Call::UpdateJobConfig { .. }
                | Call::TriggerBuild { .. }
                | Call::StopBuild { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct FakeJob {
    metadata: JobMetadata,
    config: String,
}

#[derive(Default)]
struct FakeState {
    jobs: HashMap<String, FakeJob>,
    calls: Vec<Call>,
    /// `build_exists` answers true from this attempt on; never if `None`
    ready_on_attempt: Option<u32>,
    exists_attempts: u32,
    /// `build_exists` errors on this many attempts before answering
    exists_failures: u32,
    log_events: Vec<LogEvent>,
    attached_stream: Option<mpsc::Receiver<LogEvent>>,
    nodes: Vec<Node>,
    script_delays: HashMap<String, Duration>,
    script_failures: HashSet<String>,
    stop_failures: HashSet<u64>,
    pages: HashMap<String, String>,
    fail_get_job: bool,
    fail_trigger: bool,
}

/// Scriptable in-memory [`BuildServer`]
#[derive(Clone, Default)]
pub struct FakeBuildServer {
    state: Arc<Mutex<FakeState>>,
}

const CONTROLLER_KEY: &str = "System";

impl FakeBuildServer {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state().ready_on_attempt = Some(1);
        fake
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_job(self, name: &str, metadata: JobMetadata, config: &str) -> Self {
        self.state().jobs.insert(
            name.to_string(),
            FakeJob {
                metadata,
                config: config.to_string(),
            },
        );
        self
    }

    /// Build becomes visible on the given attempt; `None` means never
    pub fn ready_on_attempt(self, attempt: Option<u32>) -> Self {
        self.state().ready_on_attempt = attempt;
        self
    }

    /// The first `attempts` readiness queries fail with a 503
    pub fn failing_build_exists(self, attempts: u32) -> Self {
        self.state().exists_failures = attempts;
        self
    }

    /// Makes every further readiness query succeed
    pub fn become_ready(&self) {
        self.state().ready_on_attempt = Some(0);
    }

    /// Events replayed by every opened stream, followed by `End`
    pub fn with_log(self, events: Vec<LogEvent>) -> Self {
        self.state().log_events = events;
        self
    }

    pub fn with_nodes(self, nodes: Vec<Node>) -> Self {
        self.state().nodes = nodes;
        self
    }

    /// Delays script execution on a node, or on the controller via `"System"`
    pub fn with_script_delay(self, target: &str, delay: Duration) -> Self {
        self.state().script_delays.insert(target.to_string(), delay);
        self
    }

    pub fn with_script_failure(self, target: &str) -> Self {
        self.state().script_failures.insert(target.to_string());
        self
    }

    pub fn with_stop_failure(self, number: u64) -> Self {
        self.state().stop_failures.insert(number);
        self
    }

    pub fn with_page(self, path: &str, body: &str) -> Self {
        self.state().pages.insert(path.to_string(), body.to_string());
        self
    }

    pub fn failing_get_job(self) -> Self {
        self.state().fail_get_job = true;
        self
    }

    pub fn failing_trigger(self) -> Self {
        self.state().fail_trigger = true;
        self
    }

    /// Hands the next opened stream to the test, which drives it by sending
    pub fn attach_stream(&self) -> mpsc::Sender<LogEvent> {
        let (tx, rx) = mpsc::channel(16);
        self.state().attached_stream = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn job_config(&self, name: &str) -> Option<String> {
        self.state().jobs.get(name).map(|job| job.config.clone())
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl BuildServer for FakeBuildServer {
    async fn get_job(&self, name: &str) -> Result<Option<JobMetadata>> {
        self.record(Call::GetJob(name.to_string()));
        let state = self.state();
        if state.fail_get_job {
            return Err(ClientError::api_error(500, "metadata unavailable"));
        }
        Ok(state.jobs.get(name).map(|job| job.metadata.clone()))
    }

    async fn get_job_config(&self, name: &str) -> Result<String> {
        self.record(Call::GetJobConfig(name.to_string()));
        self.state()
            .jobs
            .get(name)
            .map(|job| job.config.clone())
            .ok_or_else(|| ClientError::NotFound(name.to_string()))
    }

    async fn create_job(&self, name: &str, config: &str) -> Result<()> {
        self.record(Call::CreateJob {
            name: name.to_string(),
            config: config.to_string(),
        });
        self.state().jobs.insert(
            name.to_string(),
            FakeJob {
                metadata: JobMetadata {
                    next_build_number: 1,
                    has_parameters: false,
                },
                config: config.to_string(),
            },
        );
        Ok(())
    }

    async fn update_job_config(&self, name: &str, config: &str) -> Result<()> {
        self.record(Call::UpdateJobConfig {
            name: name.to_string(),
            config: config.to_string(),
        });
        match self.state().jobs.get_mut(name) {
            Some(job) => {
                job.config = config.to_string();
                Ok(())
            }
            None => Err(ClientError::NotFound(name.to_string())),
        }
    }

    async fn trigger_build(
        &self,
        name: &str,
        parameters: Option<&HashMap<String, String>>,
    ) -> Result<()> {
        self.record(Call::TriggerBuild {
            name: name.to_string(),
            parameters: parameters.cloned(),
        });
        if self.state().fail_trigger {
            return Err(ClientError::api_error(400, "trigger rejected"));
        }
        Ok(())
    }

    async fn build_exists(&self, name: &str, number: u64) -> Result<bool> {
        self.record(Call::BuildExists {
            name: name.to_string(),
            number,
        });
        let mut state = self.state();
        state.exists_attempts += 1;
        let attempts = state.exists_attempts;
        if attempts <= state.exists_failures {
            return Err(ClientError::api_error(503, "Jenkins is getting ready to work"));
        }
        Ok(state.ready_on_attempt.is_some_and(|attempt| attempts >= attempt))
    }

    async fn open_log_stream(&self, name: &str, number: u64, _delay: Duration) -> Result<LogStream> {
        self.record(Call::OpenLogStream {
            name: name.to_string(),
            number,
        });
        let mut state = self.state();
        if let Some(stream) = state.attached_stream.take() {
            return Ok(stream);
        }

        let events = state.log_events.clone();
        let (tx, rx) = mpsc::channel(events.len() + 1);
        for event in events.into_iter().chain(std::iter::once(LogEvent::End)) {
            // Capacity covers every event
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }

    async fn stop_build(&self, name: &str, number: u64) -> Result<()> {
        self.record(Call::StopBuild {
            name: name.to_string(),
            number,
        });
        if self.state().stop_failures.contains(&number) {
            return Err(ClientError::api_error(404, format!("{} #{} not found", name, number)));
        }
        Ok(())
    }

    async fn run_script(&self, script: &str, node: Option<&str>) -> Result<String> {
        self.record(Call::RunScript {
            node: node.map(str::to_string),
        });
        let key = node.unwrap_or(CONTROLLER_KEY).to_string();
        let (delay, fails) = {
            let state = self.state();
            (
                state.script_delays.get(&key).copied(),
                state.script_failures.contains(&key),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(ClientError::api_error(503, format!("{} is unreachable", key)));
        }
        Ok(format!("{} ran `{}`", key, script))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.record(Call::ListNodes);
        Ok(self.state().nodes.clone())
    }

    async fn get_page(&self, path: &str) -> Result<String> {
        self.record(Call::GetPage(path.to_string()));
        self.state()
            .pages
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, format!("{} not found", path)))
    }
}
