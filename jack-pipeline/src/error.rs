//! Error types for pipeline orchestration

use jack_client::ClientError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the orchestrator
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The job configuration document could not be parsed or lacks the
    /// pipeline definition; nothing was sent to the server
    #[error("Failed to parse job configuration: {0}")]
    ConfigParse(String),

    /// Job metadata or configuration could not be retrieved
    #[error("Failed to fetch job {job}: {source}")]
    JobFetch {
        job: String,
        #[source]
        source: ClientError,
    },

    /// The build never became visible within the polling budget
    #[error(
        "Timed out waiting for build after {} seconds: {job} #{number}",
        .timeout.as_secs()
    )]
    BuildTimeout {
        job: String,
        number: u64,
        timeout: Duration,
    },

    /// Any other failure talking to the server
    #[error(transparent)]
    Transport(#[from] ClientError),

    /// A build is already in flight
    #[error("Already building/streaming - {job}: #{}", .number.map_or("?".to_string(), |n| n.to_string()))]
    ConcurrentBuildRejected { job: String, number: Option<u64> },

    /// An operation needed an active build and there is none
    #[error("No active build")]
    NoActiveBuild,

    /// A node selection pattern is not a valid regular expression
    #[error("Invalid node pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl PipelineError {
    /// Whether this is the single-flight guard's deliberate rejection
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ConcurrentBuildRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_job_number_and_seconds() {
        let err = PipelineError::BuildTimeout {
            job: "ci-demo".to_string(),
            number: 4,
            timeout: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for build after 10 seconds: ci-demo #4"
        );
    }

    #[test]
    fn test_rejection_message_names_build_in_progress() {
        let known = PipelineError::ConcurrentBuildRejected {
            job: "ci-demo".to_string(),
            number: Some(3),
        };
        assert_eq!(known.to_string(), "Already building/streaming - ci-demo: #3");
        assert!(known.is_rejection());

        let pending = PipelineError::ConcurrentBuildRejected {
            job: "ci-demo".to_string(),
            number: None,
        };
        assert_eq!(pending.to_string(), "Already building/streaming - ci-demo: #?");
    }
}
