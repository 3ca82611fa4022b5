//! Console stream consumption
//!
//! Forwards a build's console to an [`OutputSink`] one line at a time, framed
//! by a header and footer. Chunks from the server may end mid-line, so the
//! unterminated tail is held back until the rest of the line arrives. A held
//! tail is written early when an error line comes in behind it or when it
//! grows past [`MAX_PENDING_TAIL`].

use jack_client::BuildServer;
use jack_core::domain::log::LogEvent;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cancel::AdvisoryCancel;
use crate::error::Result;
use crate::sink::{BARRIER_LINE, OutputSink};

pub const STREAM_HEADER: &str = "Streaming console output...";
pub const STREAM_FOOTER: &str = "Console stream ended.";
pub const ERROR_PREFIX: &str = "[ERROR]: ";

/// Bytes of unterminated output held back before it is written anyway
pub const MAX_PENDING_TAIL: usize = 4096;

/// Counters describing a finished stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines: usize,
    pub errors: usize,
    /// Events dropped because they raced a cancellation
    pub suppressed: usize,
}

/// Streams build consoles into a sink
pub struct LogStreamConsumer<S> {
    server: Arc<S>,
    poll_delay: Duration,
}

impl<S: BuildServer> LogStreamConsumer<S> {
    pub fn new(server: Arc<S>, poll_delay: Duration) -> Self {
        Self { server, poll_delay }
    }

    /// Streams the console of `job` #`number` until the server ends it
    ///
    /// Failing to open the stream is surfaced before anything is written.
    /// Once open, this only returns after `End` (or the producer going away).
    pub(crate) async fn stream_to(
        &self,
        job: &str,
        number: u64,
        sink: &dyn OutputSink,
        cancel: &AdvisoryCancel<'_>,
    ) -> Result<StreamSummary> {
        let mut stream = self.server.open_log_stream(job, number, self.poll_delay).await?;
        info!("Streaming console of {} #{}", job, number);

        sink.clear();
        sink.append_line(BARRIER_LINE);
        sink.append_line(STREAM_HEADER);
        sink.append_line(BARRIER_LINE);

        let mut summary = StreamSummary::default();
        let mut pending = String::new();
        let mut suppress_next = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.requested(), if !cancel.is_acknowledged() => {
                    cancel.acknowledge();
                    suppress_next = true;
                    continue;
                }
                event = stream.recv() => event.unwrap_or(LogEvent::End),
            };

            match event {
                LogEvent::End => break,
                _ if suppress_next => {
                    suppress_next = false;
                    summary.suppressed += 1;
                    debug!("Dropped console event racing cancellation");
                }
                LogEvent::Data(text) => {
                    pending.push_str(&text);
                    summary.lines += flush_complete_lines(&mut pending, sink);
                    if pending.len() > MAX_PENDING_TAIL {
                        summary.lines += flush_tail(&mut pending, sink);
                    }
                }
                LogEvent::Error(message) => {
                    summary.lines += flush_tail(&mut pending, sink);
                    summary.errors += 1;
                    sink.append_line(&format!("{}{}", ERROR_PREFIX, message));
                }
            }
        }

        summary.lines += flush_tail(&mut pending, sink);

        sink.append_line(BARRIER_LINE);
        sink.append_line(STREAM_FOOTER);
        sink.append_line(BARRIER_LINE);

        info!(
            "Console stream of {} #{} ended ({} lines, {} errors)",
            job, number, summary.lines, summary.errors
        );
        Ok(summary)
    }
}

/// Writes every newline-terminated line in `pending`, keeping the remainder
fn flush_complete_lines(pending: &mut String, sink: &dyn OutputSink) -> usize {
    let mut written = 0;
    while let Some(end) = pending.find('\n') {
        let line: String = pending.drain(..=end).collect();
        sink.append_line(line.trim_end_matches(['\n', '\r']));
        written += 1;
    }
    written
}

/// Writes whatever unterminated text is held back as a line of its own
fn flush_tail(pending: &mut String, sink: &dyn OutputSink) -> usize {
    if pending.is_empty() {
        return 0;
    }
    sink.append_line(pending.trim_end_matches('\r'));
    pending.clear();
    1
}
