//! Core domain types
//!
//! These types are shared between the transport (which produces them from
//! server payloads) and the pipeline orchestrator (which acts on them).
//! Nothing here is persisted; the build server is the only durable store.

pub mod build;
pub mod job;
pub mod log;
pub mod node;
pub mod shared_lib;
