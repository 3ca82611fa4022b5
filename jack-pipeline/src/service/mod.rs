//! Service layer
//!
//! Each service owns one step of a pipeline run and talks to the build
//! server only through the [`BuildServer`](jack_client::BuildServer) trait.
//! The orchestrator composes them and owns the build slot.

pub mod catalog;
pub mod config_patcher;
pub mod fanout;
pub mod log_stream;
pub mod readiness;
pub mod synchronizer;

pub use catalog::{SharedLibDisplay, SharedLibraryCatalog};
pub use config_patcher::{JobConfigDocument, PIPELINE_TEMPLATE, patch_config};
pub use fanout::{ScriptFanoutExecutor, StopOutcome, render_fanout, select_targets};
pub use log_stream::{LogStreamConsumer, StreamSummary};
pub use readiness::ReadinessPoller;
pub use synchronizer::JobSynchronizer;
