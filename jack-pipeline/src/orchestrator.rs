//! Pipeline orchestrator
//!
//! The entry points the UI layer calls. Each pipeline run goes strictly
//! synchronize → trigger → await ready → stream, with the [`BuildSlot`]
//! admitting one run at a time.

use jack_client::BuildServer;
use jack_core::domain::build::{BuildRef, PipelineBuild};
use jack_core::domain::node::{FanoutResult, FanoutTarget};
use jack_core::domain::shared_lib::SharedLibVar;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::AdvisoryCancel;
use crate::config::Config;
use crate::error::Result;
use crate::service::catalog::{self, SharedLibDisplay, SharedLibraryCatalog};
use crate::service::fanout::{self, ScriptFanoutExecutor, StopOutcome};
use crate::service::log_stream::{LogStreamConsumer, StreamSummary};
use crate::service::readiness::ReadinessPoller;
use crate::service::synchronizer::{FIRST_BUILD_NUMBER, JobSynchronizer};
use crate::sink::{OutputSink, Progress, ProgressSink};
use crate::slot::{BuildSlot, SlotState, Ticket};

const BUILD_CANCELED: &str = "User canceled pipeline build.";
const UPDATE_CANCELED: &str = "User canceled pipeline update.";
const SCRIPT_CANCELED: &str = "User canceled console script.";
const LOG_CANCELED: &str = "User canceled log stream.";

/// Drives ad hoc pipeline builds and script fan-out against one server
pub struct PipelineOrchestrator<S> {
    server: Arc<S>,
    config: Arc<Config>,
    slot: BuildSlot,
    synchronizer: JobSynchronizer<S>,
    poller: ReadinessPoller<S>,
    consumer: LogStreamConsumer<S>,
    fanout: ScriptFanoutExecutor<S>,
    catalog: SharedLibraryCatalog<S>,
}

impl<S: BuildServer + 'static> PipelineOrchestrator<S> {
    pub fn new(server: Arc<S>, config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            synchronizer: JobSynchronizer::new(Arc::clone(&server), Arc::clone(&config)),
            poller: ReadinessPoller::new(
                Arc::clone(&server),
                config.ready_attempts(),
                config.ready_poll_interval,
            ),
            consumer: LogStreamConsumer::new(Arc::clone(&server), config.log_poll_delay),
            fanout: ScriptFanoutExecutor::new(Arc::clone(&server)),
            catalog: SharedLibraryCatalog::new(Arc::clone(&server)),
            slot: BuildSlot::new(),
            server,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The build currently triggered, awaited or streaming
    pub fn active_build(&self) -> Option<PipelineBuild> {
        self.slot.active()
    }

    /// The build whose stream ended most recently
    pub fn last_completed(&self) -> Option<PipelineBuild> {
        self.slot.last_completed()
    }

    pub fn slot_state(&self) -> SlotState {
        self.slot.state()
    }

    // =============================================================================
    // Pipeline Builds
    // =============================================================================

    /// Creates or updates `job` with `script`, builds it and streams its console
    ///
    /// Rejected with `ConcurrentBuildRejected` before any network call while
    /// another build holds the slot. If synchronizing or triggering fails the
    /// slot is left empty; if the build never becomes ready it stays active so
    /// it can be resumed or aborted.
    ///
    /// # Returns
    /// The build, once its console stream has ended
    pub async fn synchronize_and_trigger(
        &self,
        script: &str,
        job: &str,
        sink: &dyn OutputSink,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PipelineBuild> {
        let ticket = self.reserve(job)?;
        let cancel = AdvisoryCancel::new(cancel, progress, BUILD_CANCELED);

        let build = match cancel.watch(self.synchronize_then_trigger(job, script, progress)).await {
            Ok(build) => build,
            Err(e) => {
                self.slot.release(ticket);
                return Err(e);
            }
        };

        self.slot.mark_triggered(ticket, build.clone());
        self.slot.mark_awaiting_ready(ticket);
        self.follow(ticket, build, sink, progress, &cancel).await
    }

    /// Creates or updates `job` with `script` without building it
    pub async fn update_pipeline(
        &self,
        script: &str,
        job: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PipelineBuild> {
        let ticket = self.reserve(job)?;
        let cancel = AdvisoryCancel::new(cancel, progress, UPDATE_CANCELED);

        let result = cancel.watch(self.synchronizer.synchronize(job, script)).await;
        self.slot.release(ticket);

        let build = result?;
        progress.report(Progress::JobSynced {
            job: build.job.clone(),
        });
        Ok(build)
    }

    /// Waits for the active build again after a readiness timeout, then streams it
    ///
    /// Fails with `NoActiveBuild` when the slot is empty.
    pub async fn resume(
        &self,
        sink: &dyn OutputSink,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PipelineBuild> {
        let (ticket, build) = self.slot.resume()?;
        info!("Resuming {}", build);

        let cancel = AdvisoryCancel::new(cancel, progress, BUILD_CANCELED);
        self.follow(ticket, build, sink, progress, &cancel).await
    }

    /// Stops the active build and clears the slot
    ///
    /// The slot is only cleared once the server accepted the stop. If the
    /// stop fails the build stays active and a new run is still rejected.
    ///
    /// # Returns
    /// The aborted build, or `None` if nothing was active
    pub async fn abort(&self) -> Result<Option<PipelineBuild>> {
        let Some((ticket, build)) = self.slot.active_entry() else {
            debug!("Abort requested with no active build");
            return Ok(None);
        };

        let number = build.next_build_number.unwrap_or(FIRST_BUILD_NUMBER);
        info!("Aborting {}", build);
        self.server
            .stop_build(&build.job, number)
            .await
            .inspect_err(|e| warn!("Failed to stop {}: {}", build, e))?;

        if !self.slot.clear(ticket) {
            debug!("{} left the slot while the stop was in flight", build);
        }
        Ok(Some(build))
    }

    /// Streams the console of any build, leaving the slot untouched
    pub async fn stream_build_log(
        &self,
        job: &str,
        number: u64,
        sink: &dyn OutputSink,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary> {
        let cancel = AdvisoryCancel::new(cancel, progress, LOG_CANCELED);
        self.consumer.stream_to(job, number, sink, &cancel).await
    }

    fn reserve(&self, job: &str) -> Result<Ticket> {
        self.slot.reserve(&self.config.job_name(job)).inspect_err(|e| warn!("{}", e))
    }

    async fn synchronize_then_trigger(
        &self,
        job: &str,
        script: &str,
        progress: &dyn ProgressSink,
    ) -> Result<PipelineBuild> {
        let build = self.synchronizer.synchronize(job, script).await?;
        progress.report(Progress::JobSynced {
            job: build.job.clone(),
        });

        // Parameterized jobs refuse a plain trigger; send an empty set
        let no_parameters = HashMap::new();
        let parameters = build.has_params.then_some(&no_parameters);
        self.server.trigger_build(&build.job, parameters).await?;

        let number = build.next_build_number.unwrap_or(FIRST_BUILD_NUMBER);
        info!("Triggered {} #{}", build.job, number);
        progress.report(Progress::BuildTriggered {
            job: build.job.clone(),
            number,
        });
        Ok(build)
    }

    /// Await-ready and stream steps shared by a fresh run and a resume
    async fn follow(
        &self,
        ticket: Ticket,
        build: PipelineBuild,
        sink: &dyn OutputSink,
        progress: &dyn ProgressSink,
        cancel: &AdvisoryCancel<'_>,
    ) -> Result<PipelineBuild> {
        let number = build.next_build_number.unwrap_or(FIRST_BUILD_NUMBER);

        if let Err(e) = cancel.watch(self.poller.await_ready(&build.job, number)).await {
            warn!("{}", e);
            self.slot.mark_triggered(ticket, build);
            return Err(e);
        }
        progress.report(Progress::BuildReady {
            job: build.job.clone(),
            number,
        });

        if !self.slot.mark_streaming(ticket) {
            info!("{} was aborted before it became ready, not streaming", build);
            return Ok(build);
        }
        progress.report(Progress::Streaming {
            job: build.job.clone(),
            number,
        });

        match self.consumer.stream_to(&build.job, number, sink, cancel).await {
            Ok(_) => {
                self.slot.complete(ticket, build.clone());
                Ok(build)
            }
            Err(e) => {
                warn!("Failed to open console of {}: {}", build, e);
                self.slot.mark_triggered(ticket, build);
                Err(e)
            }
        }
    }

    // =============================================================================
    // Script Fan-out
    // =============================================================================

    /// The controller followed by every node of the server
    pub async fn list_targets(&self) -> Result<Vec<FanoutTarget>> {
        let nodes = self.server.list_nodes().await?;
        Ok(fanout::all_targets(&nodes))
    }

    /// Nodes whose name matches `pattern`
    pub async fn select_targets(&self, pattern: &str) -> Result<Vec<FanoutTarget>> {
        let nodes = self.server.list_nodes().await?;
        fanout::select_targets(&nodes, pattern)
    }

    /// Runs `script` on every target; results follow the order of `targets`
    pub async fn run_script_across_targets(
        &self,
        script: &str,
        targets: &[FanoutTarget],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<FanoutResult> {
        let cancel = AdvisoryCancel::new(cancel, progress, SCRIPT_CANCELED);
        cancel
            .watch(self.fanout.run_across_targets(script, targets))
            .await
    }

    /// Stops several builds at once; outcomes follow the order of `builds`
    pub async fn stop_builds(&self, builds: &[BuildRef]) -> Vec<StopOutcome> {
        self.fanout.stop_builds(builds).await
    }

    // =============================================================================
    // Shared Library
    // =============================================================================

    /// Fetches the catalog, scoped to the last completed job if there is one
    pub async fn list_shared_library_entries(&self) -> Result<Vec<SharedLibVar>> {
        let last = self.last_completed();
        self.catalog.refresh(last.as_ref().map(|b| b.job.as_str())).await
    }

    /// Server-relative documentation link of `entry`
    pub fn shared_library_doc_url(&self, entry: &SharedLibVar) -> String {
        let last = self.last_completed();
        catalog::doc_path(last.as_ref().map(|b| b.job.as_str()), &entry.name)
    }

    /// How `entry` should be shown, per the browser toggle
    pub fn shared_library_display(&self, entry: &SharedLibVar) -> SharedLibDisplay {
        let last = self.last_completed();
        SharedLibDisplay::for_entry(
            entry,
            last.as_ref().map(|b| b.job.as_str()),
            self.config.browser_shared_library_ref,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::fakes::{Call, FakeBuildServer};
    use crate::service::config_patcher::JobConfigDocument;
    use crate::service::log_stream::STREAM_FOOTER;
    use crate::sink::{BARRIER_LINE, BufferedSink};
    use jack_core::domain::job::JobMetadata;
    use jack_core::domain::log::LogEvent;
    use jack_core::domain::node::Node;
    use std::time::Duration;

    fn test_config() -> Config {
        let mut config = Config::default().with_job_prefix("ci");
        config.ready_timeout = Duration::from_secs(3);
        config.ready_poll_interval = Duration::from_millis(1);
        config.log_poll_delay = Duration::from_millis(1);
        config
    }

    fn orchestrator(server: &FakeBuildServer) -> PipelineOrchestrator<FakeBuildServer> {
        PipelineOrchestrator::new(Arc::new(server.clone()), test_config())
    }

    async fn wait_for_streaming(orch: &PipelineOrchestrator<FakeBuildServer>) {
        for _ in 0..1000 {
            if matches!(orch.slot_state(), SlotState::Streaming { .. }) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("build never started streaming");
    }

    #[tokio::test]
    async fn test_new_job_end_to_end() {
        let server = FakeBuildServer::new().with_log(vec![LogEvent::Data("hi\n".to_string())]);
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        let build = orch
            .synchronize_and_trigger("echo hi", "demo", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(build.job, "ci-demo");
        assert_eq!(build.next_build_number, Some(1));

        let calls = server.calls();
        assert!(matches!(&calls[1], Call::CreateJob { name, .. } if name == "ci-demo"));
        assert!(calls.contains(&Call::TriggerBuild {
            name: "ci-demo".to_string(),
            parameters: None,
        }));
        assert!(calls.contains(&Call::BuildExists {
            name: "ci-demo".to_string(),
            number: 1,
        }));

        let config = JobConfigDocument::parse(&server.job_config("ci-demo").unwrap()).unwrap();
        assert_eq!(config.script().unwrap().as_deref(), Some("echo hi"));
        assert_eq!(config.quiet_period().unwrap(), Some(0));

        let lines = sink.lines();
        assert!(lines.contains(&"hi".to_string()));
        assert_eq!(lines[lines.len() - 2], STREAM_FOOTER);
        assert_eq!(lines[lines.len() - 1], BARRIER_LINE);

        assert_eq!(orch.slot_state(), SlotState::Idle);
        assert_eq!(orch.last_completed().map(|b| b.job), Some("ci-demo".to_string()));
        assert_eq!(
            sink.progress(),
            vec![
                Progress::JobSynced { job: "ci-demo".to_string() },
                Progress::BuildTriggered { job: "ci-demo".to_string(), number: 1 },
                Progress::BuildReady { job: "ci-demo".to_string(), number: 1 },
                Progress::Streaming { job: "ci-demo".to_string(), number: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_parameterized_job_triggers_with_empty_map() {
        let server = FakeBuildServer::new().with_job(
            "ci-params",
            JobMetadata {
                next_build_number: 12,
                has_parameters: true,
            },
            "<flow-definition><definition><script/></definition></flow-definition>",
        );
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        orch.synchronize_and_trigger("echo hi", "params", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(server.calls().contains(&Call::TriggerBuild {
            name: "ci-params".to_string(),
            parameters: Some(HashMap::new()),
        }));
        assert!(server.calls().contains(&Call::OpenLogStream {
            name: "ci-params".to_string(),
            number: 12,
        }));
    }

    #[tokio::test]
    async fn test_second_build_rejected_without_network_calls() {
        let server = FakeBuildServer::new();
        let stream = server.attach_stream();
        let orch = Arc::new(orchestrator(&server));

        let running = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                let sink = BufferedSink::new();
                orch.synchronize_and_trigger("echo a", "a", &sink, &sink, &CancellationToken::new())
                    .await
            })
        };
        wait_for_streaming(&orch).await;

        let calls_before = server.calls().len();
        let sink = BufferedSink::new();
        let err = orch
            .synchronize_and_trigger("echo b", "b", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Already building/streaming - ci-a: #1");

        let err = orch
            .update_pipeline("echo b", "b", &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(server.calls().len(), calls_before);

        stream.send(LogEvent::End).await.unwrap();
        let build = running.await.unwrap().unwrap();
        assert_eq!(build.job, "ci-a");
    }

    #[tokio::test]
    async fn test_abort_after_stream_end_is_noop() {
        let server = FakeBuildServer::new();
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        orch.synchronize_and_trigger("echo hi", "demo", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(orch.active_build().is_none());
        assert_eq!(orch.abort().await.unwrap(), None);
        assert!(!server.calls().iter().any(|c| matches!(c, Call::StopBuild { .. })));
    }

    #[tokio::test]
    async fn test_abort_while_streaming() {
        let server = FakeBuildServer::new();
        let stream = server.attach_stream();
        let orch = Arc::new(orchestrator(&server));

        let running = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                let sink = BufferedSink::new();
                orch.synchronize_and_trigger("echo a", "a", &sink, &sink, &CancellationToken::new())
                    .await
            })
        };
        wait_for_streaming(&orch).await;

        let aborted = orch.abort().await.unwrap().unwrap();
        assert_eq!(aborted.job, "ci-a");
        assert!(server.calls().contains(&Call::StopBuild {
            name: "ci-a".to_string(),
            number: 1,
        }));
        assert_eq!(orch.slot_state(), SlotState::Idle);

        stream.send(LogEvent::Data("Aborted by admin\n".to_string())).await.unwrap();
        stream.send(LogEvent::End).await.unwrap();
        running.await.unwrap().unwrap();

        assert_eq!(orch.slot_state(), SlotState::Idle);
        assert!(orch.last_completed().is_none());
    }

    #[tokio::test]
    async fn test_failed_abort_keeps_build_active() {
        let server = FakeBuildServer::new().with_stop_failure(1);
        let stream = server.attach_stream();
        let orch = Arc::new(orchestrator(&server));

        let running = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                let sink = BufferedSink::new();
                orch.synchronize_and_trigger("echo a", "a", &sink, &sink, &CancellationToken::new())
                    .await
            })
        };
        wait_for_streaming(&orch).await;

        assert!(orch.abort().await.is_err());
        assert_eq!(orch.active_build().map(|b| b.job), Some("ci-a".to_string()));

        let sink = BufferedSink::new();
        let err = orch
            .synchronize_and_trigger("echo b", "b", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_rejection());

        stream.send(LogEvent::End).await.unwrap();
        running.await.unwrap().unwrap();
        assert_eq!(orch.last_completed().map(|b| b.job), Some("ci-a".to_string()));
    }

    #[tokio::test]
    async fn test_trigger_failure_leaves_slot_empty() {
        let server = FakeBuildServer::new().failing_trigger();
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        let err = orch
            .synchronize_and_trigger("echo hi", "demo", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Transport(_)));
        assert_eq!(orch.slot_state(), SlotState::Idle);
    }

    #[tokio::test]
    async fn test_timeout_keeps_build_for_resume() {
        let server = FakeBuildServer::new().ready_on_attempt(None);
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        let err = orch
            .synchronize_and_trigger("echo hi", "demo", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BuildTimeout { number: 1, .. }));
        assert_eq!(orch.active_build().map(|b| b.job), Some("ci-demo".to_string()));

        let exists_calls = server
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::BuildExists { .. }))
            .count();
        assert_eq!(exists_calls, 3);

        server.become_ready();
        let build = orch
            .resume(&sink, &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(build.job, "ci-demo");
        assert_eq!(orch.slot_state(), SlotState::Idle);
        assert!(matches!(
            orch.resume(&sink, &sink, &CancellationToken::new()).await,
            Err(PipelineError::NoActiveBuild)
        ));
    }

    #[tokio::test]
    async fn test_cancellation_is_advisory() {
        let server = FakeBuildServer::new();
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();
        let token = CancellationToken::new();
        token.cancel();

        let build = orch
            .synchronize_and_trigger("echo hi", "demo", &sink, &sink, &token)
            .await
            .unwrap();

        assert_eq!(build.job, "ci-demo");
        assert_eq!(sink.warnings(), vec![BUILD_CANCELED]);
        assert_eq!(orch.last_completed().map(|b| b.job), Some("ci-demo".to_string()));
    }

    #[tokio::test]
    async fn test_stream_build_log_leaves_slot_alone() {
        let server = FakeBuildServer::new().with_log(vec![LogEvent::Data("old\n".to_string())]);
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        orch.stream_build_log("ci-demo", 3, &sink, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(sink.lines().contains(&"old".to_string()));
        assert_eq!(orch.slot_state(), SlotState::Idle);
        assert!(orch.last_completed().is_none());
    }

    #[tokio::test]
    async fn test_fanout_with_regex_selection() {
        let nodes = vec![
            Node {
                display_name: "linux-1".to_string(),
                offline: false,
            },
            Node {
                display_name: "win-1".to_string(),
                offline: true,
            },
        ];
        let server = FakeBuildServer::new()
            .with_nodes(nodes)
            .with_script_delay("System", Duration::from_millis(20));
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        let mut targets = orch.select_targets("linux").await.unwrap();
        targets.insert(0, FanoutTarget::Controller);

        let results = orch
            .run_script_across_targets("println 1", &targets, &sink, &CancellationToken::new())
            .await;
        let labels: Vec<&str> = results.iter().map(|r| r.target.label()).collect();
        assert_eq!(labels, vec!["System", "linux-1"]);

        let all = orch.list_targets().await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_shared_library_scoped_to_last_completed() {
        let page = r#"<dl class="steps variables root"><dt id="env"></dt><dd><div>Env</div></dd></dl>"#;
        let server = FakeBuildServer::new()
            .with_page("pipeline-syntax/globals", page)
            .with_page("job/ci-demo/pipeline-syntax/globals", page);
        let orch = orchestrator(&server);
        let sink = BufferedSink::new();

        let entries = orch.list_shared_library_entries().await.unwrap();
        assert_eq!(orch.shared_library_doc_url(&entries[0]), "pipeline-syntax/globals#env");

        orch.synchronize_and_trigger("echo hi", "demo", &sink, &sink, &CancellationToken::new())
            .await
            .unwrap();

        let entries = orch.list_shared_library_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            orch.shared_library_doc_url(&entries[0]),
            "job/ci-demo/pipeline-syntax/globals#env"
        );
        assert!(matches!(
            orch.shared_library_display(&entries[0]),
            SharedLibDisplay::Inline(_)
        ));
    }
}
