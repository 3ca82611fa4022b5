//! Jack Pipeline
//!
//! Orchestrates ad hoc pipeline builds on a Jenkins-style build server.
//!
//! Architecture:
//! - Configuration: job prefix, readiness budget, doc display toggle
//! - Services: config patching, job sync, readiness polling, console
//!   streaming, script fan-out, shared library catalog
//! - Slot: the single-flight build guard and its state machine
//! - Orchestrator: the entry points a UI calls
//!
//! Output never goes to stdout directly; callers hand in an [`OutputSink`]
//! for console lines and a [`ProgressSink`] for milestones and warnings.
//!
//! # Example
//!
//! ```no_run
//! use jack_client::JenkinsClient;
//! use jack_pipeline::{BufferedSink, Config, PipelineOrchestrator};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default().with_job_prefix("ci");
//!     let client = Arc::new(JenkinsClient::new(&config.server_url)?);
//!     let orchestrator = PipelineOrchestrator::new(client, config);
//!
//!     let sink = BufferedSink::new();
//!     let build = orchestrator
//!         .synchronize_and_trigger("echo 'hi'", "demo", &sink, &sink, &CancellationToken::new())
//!         .await?;
//!
//!     println!("{} finished", build);
//!     Ok(())
//! }
//! ```

mod cancel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod service;
pub mod sink;
pub mod slot;

#[cfg(test)]
mod fakes;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use orchestrator::PipelineOrchestrator;
pub use sink::{BARRIER_LINE, BufferedSink, OutputSink, Progress, ProgressSink};
pub use slot::{BuildSlot, SlotState};
