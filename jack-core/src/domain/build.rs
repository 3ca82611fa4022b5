//! Build domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ad hoc build attempt
///
/// Constructed by the job synchronizer right before the create/update call.
/// `next_build_number` is `None` until the number has been learned from the
/// job's metadata on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineBuild {
    /// Effective (possibly prefixed) job name
    pub job: String,
    /// Script body supplied for this attempt
    pub source: String,
    /// Build number the server is expected to assign
    pub next_build_number: Option<u64>,
    /// Whether the job declares build parameters
    pub has_params: bool,
}

impl PipelineBuild {
    /// Creates a build with an unknown number and no parameters
    pub fn new(job: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            source: source.into(),
            next_build_number: None,
            has_params: false,
        }
    }

    /// Returns a reference to the concrete build, if the number is known
    pub fn build_ref(&self) -> Option<BuildRef> {
        self.next_build_number
            .map(|number| BuildRef::new(self.job.clone(), number))
    }
}

impl fmt::Display for PipelineBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.next_build_number {
            Some(number) => write!(f, "{}: #{}", self.job, number),
            None => write!(f, "{}: #?", self.job),
        }
    }
}

/// A concrete build of a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildRef {
    pub job: String,
    pub number: u64,
}

impl BuildRef {
    pub fn new(job: impl Into<String>, number: u64) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: #{}", self.job, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_build_has_unknown_number() {
        let build = PipelineBuild::new("ci-demo", "echo hi");
        assert_eq!(build.next_build_number, None);
        assert!(!build.has_params);
        assert!(build.build_ref().is_none());
        assert_eq!(build.to_string(), "ci-demo: #?");
    }

    #[test]
    fn test_build_ref_once_number_known() {
        let mut build = PipelineBuild::new("ci-demo", "echo hi");
        build.next_build_number = Some(7);
        assert_eq!(build.build_ref(), Some(BuildRef::new("ci-demo", 7)));
        assert_eq!(build.to_string(), "ci-demo: #7");
    }
}
