//! Build readiness polling
//!
//! A triggered build is not observable on the server right away. The poller
//! asks for it a fixed number of times at a fixed interval.

use jack_client::BuildServer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// Polls for a build until it exists or the attempt budget is spent
pub struct ReadinessPoller<S> {
    server: Arc<S>,
    max_attempts: u32,
    interval: Duration,
}

impl<S: BuildServer> ReadinessPoller<S> {
    pub fn new(server: Arc<S>, max_attempts: u32, interval: Duration) -> Self {
        Self {
            server,
            max_attempts,
            interval,
        }
    }

    /// Total time budget, reported on timeout
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Waits for build `number` of `job` to become fetchable
    ///
    /// Any failed query counts as "not ready yet". Exactly `max_attempts`
    /// queries are made before failing with [`PipelineError::BuildTimeout`].
    pub async fn await_ready(&self, job: &str, number: u64) -> Result<()> {
        info!("Waiting for build to start: {} #{}", job, number);
        let mut remaining = self.max_attempts;

        while remaining > 0 {
            remaining -= 1;

            match self.server.build_exists(job, number).await {
                Ok(true) => {
                    info!("Build ready: {} #{}", job, number);
                    return Ok(());
                }
                Ok(false) => debug!("{} #{} not visible yet", job, number),
                Err(e) if e.is_client_error() && !e.is_not_found() => {
                    warn!("Readiness query for {} #{} rejected: {}", job, number, e)
                }
                Err(e) if e.is_server_error() => {
                    debug!("Server unavailable while polling {} #{}: {}", job, number, e)
                }
                Err(e) => debug!("Readiness query for {} #{} failed: {}", job, number, e),
            }

            if remaining > 0 {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(PipelineError::BuildTimeout {
            job: job.to_string(),
            number,
            timeout: self.timeout(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Call, FakeBuildServer};

    fn exists_queries(server: &FakeBuildServer) -> usize {
        server
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::BuildExists { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_never_ready_makes_exactly_n_queries() {
        let server = FakeBuildServer::new().ready_on_attempt(None);
        let poller = ReadinessPoller::new(Arc::new(server.clone()), 4, Duration::from_millis(1));

        let err = poller.await_ready("ci-demo", 7).await.unwrap_err();

        assert_eq!(exists_queries(&server), 4);
        match err {
            PipelineError::BuildTimeout { job, number, timeout } => {
                assert_eq!(job, "ci-demo");
                assert_eq!(number, 7);
                assert_eq!(timeout, Duration::from_millis(4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ready_on_attempt_k_stops_polling() {
        let server = FakeBuildServer::new().ready_on_attempt(Some(3));
        let poller = ReadinessPoller::new(Arc::new(server.clone()), 5, Duration::from_millis(1));

        poller.await_ready("ci-demo", 1).await.unwrap();
        assert_eq!(exists_queries(&server), 3);
    }

    #[tokio::test]
    async fn test_failed_queries_count_as_not_ready() {
        let server = FakeBuildServer::new()
            .failing_build_exists(2)
            .ready_on_attempt(Some(1));
        let poller = ReadinessPoller::new(Arc::new(server.clone()), 5, Duration::from_millis(1));

        poller.await_ready("ci-demo", 1).await.unwrap();
        assert_eq!(exists_queries(&server), 3);
    }

    #[tokio::test]
    async fn test_every_query_failing_times_out_after_n() {
        let server = FakeBuildServer::new().failing_build_exists(u32::MAX);
        let poller = ReadinessPoller::new(Arc::new(server.clone()), 4, Duration::from_millis(1));

        let err = poller.await_ready("ci-demo", 3).await.unwrap_err();

        assert!(matches!(err, PipelineError::BuildTimeout { number: 3, .. }));
        assert_eq!(exists_queries(&server), 4);
    }

    #[tokio::test]
    async fn test_ready_on_last_attempt() {
        let server = FakeBuildServer::new().ready_on_attempt(Some(2));
        let poller = ReadinessPoller::new(Arc::new(server.clone()), 2, Duration::from_millis(1));

        assert!(poller.await_ready("ci-demo", 1).await.is_ok());
        assert_eq!(exists_queries(&server), 2);
    }
}
