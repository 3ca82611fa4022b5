//! Job domain types

use serde::{Deserialize, Serialize};

/// Metadata the server reports for an existing job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Number the next build of this job will receive
    pub next_build_number: u64,
    /// Whether the job's properties include a parameters definition
    pub has_parameters: bool,
}
