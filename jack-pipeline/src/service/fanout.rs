//! Script fan-out
//!
//! Runs one script on several targets at once. Every request is independent;
//! a failure becomes that target's output instead of failing the batch, and
//! results always come back in input order.

use jack_client::BuildServer;
use jack_core::domain::build::BuildRef;
use jack_core::domain::node::{FanoutResult, FanoutTarget, Node};
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sink::BARRIER_LINE;

/// Outcome of one stop request in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub build: BuildRef,
    /// Confirmation, or the error text
    pub message: String,
    pub success: bool,
}

/// Dispatches scripts and stop requests concurrently
pub struct ScriptFanoutExecutor<S> {
    server: Arc<S>,
}

impl<S: BuildServer + 'static> ScriptFanoutExecutor<S> {
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }

    /// Runs `script` on every target concurrently
    ///
    /// # Returns
    /// One result per target, in the order of `targets`
    pub async fn run_across_targets(&self, script: &str, targets: &[FanoutTarget]) -> Vec<FanoutResult> {
        info!("Executing script on {} target(s)", targets.len());

        let requests = targets
            .iter()
            .cloned()
            .map(|target| {
                let server = Arc::clone(&self.server);
                let script = script.to_string();
                async move {
                    let result = server.run_script(&script, target.node_name()).await;
                    match result {
                        Ok(output) => {
                            debug!("Script finished on {}", target);
                            FanoutResult {
                                target,
                                output,
                                success: true,
                            }
                        }
                        Err(e) => {
                            warn!("Script failed on {}: {}", target, e);
                            FanoutResult {
                                target,
                                output: e.to_string(),
                                success: false,
                            }
                        }
                    }
                }
            })
            .collect();

        gather_ordered(requests)
            .await
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| FanoutResult {
                    target: target.clone(),
                    output: "Script execution task did not complete".to_string(),
                    success: false,
                })
            })
            .collect()
    }

    /// Asks the server to stop every build concurrently
    pub async fn stop_builds(&self, builds: &[BuildRef]) -> Vec<StopOutcome> {
        info!("Stopping {} build(s)", builds.len());

        let requests = builds
            .iter()
            .cloned()
            .map(|build| {
                let server = Arc::clone(&self.server);
                async move {
                    let result = server.stop_build(&build.job, build.number).await;
                    match result {
                        Ok(()) => StopOutcome {
                            message: format!("Abort signal sent to {}", build),
                            build,
                            success: true,
                        },
                        Err(e) => {
                            warn!("Failed to stop {}: {}", build, e);
                            StopOutcome {
                                message: e.to_string(),
                                build,
                                success: false,
                            }
                        }
                    }
                }
            })
            .collect();

        gather_ordered(requests)
            .await
            .into_iter()
            .zip(builds)
            .map(|(slot, build)| {
                slot.unwrap_or_else(|| StopOutcome {
                    build: build.clone(),
                    message: "Stop task did not complete".to_string(),
                    success: false,
                })
            })
            .collect()
    }
}

/// Spawns every future and collects outputs by input position
///
/// A task that panicked leaves its slot empty.
async fn gather_ordered<T, F>(futures: Vec<F>) -> Vec<Option<T>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut join_set = JoinSet::new();
    let count = futures.len();
    for (idx, future) in futures.into_iter().enumerate() {
        join_set.spawn(async move { (idx, future.await) });
    }

    let mut ordered: Vec<Option<T>> = (0..count).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, value)) => ordered[idx] = Some(value),
            Err(e) => warn!("Fan-out task join error: {e}"),
        }
    }
    ordered
}

/// The controller followed by every node, in server order
pub fn all_targets(nodes: &[Node]) -> Vec<FanoutTarget> {
    std::iter::once(FanoutTarget::Controller)
        .chain(nodes.iter().map(FanoutTarget::from))
        .collect()
}

/// Nodes whose display name matches `pattern` anywhere, in node order
pub fn select_targets(nodes: &[Node], pattern: &str) -> Result<Vec<FanoutTarget>> {
    let regex = Regex::new(pattern)?;
    Ok(nodes
        .iter()
        .filter(|node| regex.is_match(&node.display_name))
        .map(FanoutTarget::from)
        .collect())
}

/// Formats results as labelled blocks between barrier lines
pub fn render_fanout(results: &[FanoutResult]) -> Vec<String> {
    let mut lines = Vec::with_capacity(results.len() * 5);
    for result in results {
        lines.push(BARRIER_LINE.to_string());
        lines.push(result.target.label().to_string());
        lines.push(String::new());
        lines.push(result.output.clone());
        lines.push(BARRIER_LINE.to_string());
    }
    lines
}
