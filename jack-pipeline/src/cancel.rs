//! Advisory cancellation
//!
//! A cancelled run keeps going: in-flight requests are never dropped. The
//! first observed cancellation surfaces a warning through the progress sink
//! and is remembered so later steps do not warn again.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use crate::sink::ProgressSink;

pub(crate) struct AdvisoryCancel<'a> {
    token: &'a CancellationToken,
    progress: &'a dyn ProgressSink,
    message: &'static str,
    acknowledged: AtomicBool,
}

impl<'a> AdvisoryCancel<'a> {
    pub(crate) fn new(
        token: &'a CancellationToken,
        progress: &'a dyn ProgressSink,
        message: &'static str,
    ) -> Self {
        Self {
            token,
            progress,
            message,
            acknowledged: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Resolves once the token fires and the cancellation has not been
    /// acknowledged yet; pending forever otherwise
    pub(crate) async fn requested(&self) {
        if self.is_acknowledged() {
            std::future::pending::<()>().await;
        }
        self.token.cancelled().await;
    }

    /// Warns once; returns whether this call did the warning
    pub(crate) fn acknowledge(&self) -> bool {
        if self.acknowledged.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::warn!("{}", self.message);
        self.progress.warn(self.message);
        true
    }

    /// Drives `fut` to completion, warning if cancellation arrives meanwhile
    pub(crate) async fn watch<F: Future>(&self, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                output = &mut fut => return output,
                _ = self.requested(), if !self.is_acknowledged() => {
                    self.acknowledge();
                }
            }
        }
    }
}
