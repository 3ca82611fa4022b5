//! Job-related API endpoints

use crate::JenkinsClient;
use crate::error::{ClientError, Result};
use jack_core::domain::job::JobMetadata;
use jack_core::dto::job::JobInfo;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

const XML_CONTENT_TYPE: &str = "application/xml";

impl JenkinsClient {
    // =============================================================================
    // Job Metadata
    // =============================================================================

    /// Get a job's metadata
    ///
    /// # Arguments
    /// * `name` - The full job name, folders separated by `/`
    ///
    /// # Returns
    /// The job metadata, or `None` if the server has no such job
    pub async fn get_job(&self, name: &str) -> Result<Option<JobMetadata>> {
        let url = self.job_endpoint(name, &["api", "json"])?;
        let response = self.request(Method::GET, url).send().await?;

        match self.handle_response::<JobInfo>(response).await {
            Ok(info) => Ok(Some(info.into())),
            Err(e) if e.is_not_found() => {
                debug!("Job {} does not exist", name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // =============================================================================
    // Job Configuration
    // =============================================================================

    /// Get a job's configuration document
    ///
    /// # Returns
    /// The raw `config.xml` body
    pub async fn get_job_config(&self, name: &str) -> Result<String> {
        let url = self.job_endpoint(name, &["config.xml"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_text(response).await
    }

    /// Create a job from a configuration document
    ///
    /// The job is created inside its folder when the name contains `/`.
    pub async fn create_job(&self, name: &str, config: &str) -> Result<()> {
        let (folder, leaf) = match name.trim_matches('/').rsplit_once('/') {
            Some((folder, leaf)) => (Some(folder), leaf),
            None => (None, name.trim_matches('/')),
        };

        if leaf.is_empty() {
            return Err(ClientError::InvalidRequest("Job name is empty".to_string()));
        }

        let mut url = match folder {
            Some(folder) => self.job_endpoint(folder, &["createItem"])?,
            None => self.endpoint(&["createItem"])?,
        };
        url.query_pairs_mut().append_pair("name", leaf);

        let response = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(config.to_string())
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Replace a job's configuration document
    pub async fn update_job_config(&self, name: &str, config: &str) -> Result<()> {
        let url = self.job_endpoint(name, &["config.xml"])?;
        let response = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(config.to_string())
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
