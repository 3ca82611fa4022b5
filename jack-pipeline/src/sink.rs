//! Output and progress seams
//!
//! The orchestrator never renders anything itself. Console lines go to an
//! [`OutputSink`] and milestone notifications to a [`ProgressSink`], both
//! supplied by the surrounding UI layer.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Separator line written around streamed and fan-out output
pub const BARRIER_LINE: &str =
    "--------------------------------------------------------------------------------";

/// Receives already-formatted output lines
pub trait OutputSink: Send + Sync {
    /// Appends one line of output
    fn append_line(&self, line: &str);

    /// Clears previously written output, if the sink supports it
    fn clear(&self) {}
}

/// Milestones of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The job was created or updated with the new script
    JobSynced { job: String },
    /// The server accepted the build request
    BuildTriggered { job: String, number: u64 },
    /// The build became visible on the server
    BuildReady { job: String, number: u64 },
    /// Console output is being streamed
    Streaming { job: String, number: u64 },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::JobSynced { job } => write!(f, "Created/updated Pipeline job {}", job),
            Progress::BuildTriggered { job, number } => write!(f, "Building \"{} #{}\"", job, number),
            Progress::BuildReady { job, number } => write!(f, "Build {} #{} is ready", job, number),
            Progress::Streaming { job, number } => {
                write!(f, "Streaming output of {} #{}...", job, number)
            }
        }
    }
}

/// Receives progress milestones and user-facing warnings
pub trait ProgressSink: Send + Sync {
    /// Reports a milestone
    fn report(&self, progress: Progress);

    /// Surfaces a warning, e.g. an acknowledged cancellation
    fn warn(&self, message: &str);
}

/// In-memory sink collecting output lines, progress and warnings
///
/// Cloning shares the underlying buffers, so one clone can be handed to the
/// orchestrator while another is drained.
#[derive(Debug, Clone, Default)]
pub struct BufferedSink {
    lines: Arc<Mutex<Vec<String>>>,
    progress: Arc<Mutex<Vec<Progress>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl BufferedSink {
    /// Creates an empty buffered sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all buffered lines and clears the buffer
    pub fn drain(&self) -> Vec<String> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.drain(..).collect()
    }

    /// Snapshot of buffered lines without draining
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of reported milestones
    pub fn progress(&self) -> Vec<Progress> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of surfaced warnings
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for BufferedSink {
    fn append_line(&self, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.push(line.to_string());
    }

    fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ProgressSink for BufferedSink {
    fn report(&self, progress: Progress) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress);
    }

    fn warn(&self, message: &str) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_is_eighty_dashes() {
        assert_eq!(BARRIER_LINE.len(), 80);
        assert!(BARRIER_LINE.chars().all(|c| c == '-'));
    }

    #[test]
    fn test_buffered_sink_drain() {
        let sink = BufferedSink::new();
        let shared = sink.clone();

        shared.append_line("first");
        shared.append_line("second");

        assert_eq!(sink.lines().len(), 2);
        assert_eq!(sink.drain(), vec!["first", "second"]);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_buffered_sink_clear() {
        let sink = BufferedSink::new();
        sink.append_line("stale");
        sink.clear();
        sink.append_line("fresh");
        assert_eq!(sink.lines(), vec!["fresh"]);
    }
}
