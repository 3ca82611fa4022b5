//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::JobMetadata;

/// Marker class of the property that declares build parameters
pub const PARAMETERS_PROPERTY_CLASS: &str = "ParametersDefinitionProperty";

/// `job/<name>/api/json` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    #[serde(default)]
    pub next_build_number: u64,
    #[serde(default)]
    pub property: Vec<JobProperty>,
}

/// Entry of a job's `property` array
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProperty {
    #[serde(rename = "_class", default)]
    pub class: String,
}

impl JobInfo {
    /// Whether any property is a parameters definition
    pub fn has_parameters(&self) -> bool {
        self.property
            .iter()
            .any(|p| p.class.contains(PARAMETERS_PROPERTY_CLASS))
    }
}

impl From<JobInfo> for JobMetadata {
    fn from(info: JobInfo) -> Self {
        Self {
            has_parameters: info.has_parameters(),
            next_build_number: info.next_build_number,
        }
    }
}
