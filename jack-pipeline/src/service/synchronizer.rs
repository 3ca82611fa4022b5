//! Job synchronization
//!
//! Decides whether a job must be created or updated, patches its
//! configuration with the supplied script and issues exactly one create or
//! update call.

use jack_client::BuildServer;
use jack_core::domain::build::PipelineBuild;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::service::config_patcher::{PIPELINE_TEMPLATE, patch_config};

/// Number the server assigns to the first build of a job
pub const FIRST_BUILD_NUMBER: u64 = 1;

/// Creates or updates pipeline jobs
pub struct JobSynchronizer<S> {
    server: Arc<S>,
    config: Arc<Config>,
}

impl<S: BuildServer> JobSynchronizer<S> {
    pub fn new(server: Arc<S>, config: Arc<Config>) -> Self {
        Self { server, config }
    }

    /// Brings the (prefixed) job in line with `script`
    ///
    /// # Returns
    /// The build to trigger next, with its build number filled in. Fails with
    /// [`PipelineError::JobFetch`] if the job's metadata or configuration
    /// could not be read, in which case nothing was written.
    pub async fn synchronize(&self, job: &str, script: &str) -> Result<PipelineBuild> {
        let name = self.config.job_name(job);
        let mut build = PipelineBuild::new(name.clone(), script);

        let metadata = self
            .server
            .get_job(&name)
            .await
            .map_err(|source| PipelineError::JobFetch {
                job: name.clone(),
                source,
            })?;

        let base = match &metadata {
            Some(metadata) => {
                build.has_params = metadata.has_parameters;
                build.next_build_number = Some(metadata.next_build_number);

                self.server
                    .get_job_config(&name)
                    .await
                    .map_err(|source| PipelineError::JobFetch {
                        job: name.clone(),
                        source,
                    })?
            }
            None => PIPELINE_TEMPLATE.to_string(),
        };

        let patched = patch_config(&base, script)?;

        if metadata.is_some() {
            info!("{} already exists. Updating...", name);
            self.server.update_job_config(&name, &patched).await?;
        } else {
            info!("{} doesn't exist. Creating...", name);
            self.server.create_job(&name, &patched).await?;
            build.next_build_number = Some(self.created_job_build_number(&name).await);
        }

        info!("Successfully updated Pipeline: {}", name);
        Ok(build)
    }

    /// Learns the next build number of a job that was just created
    async fn created_job_build_number(&self, name: &str) -> u64 {
        match self.server.get_job(name).await {
            Ok(Some(metadata)) => metadata.next_build_number,
            Ok(None) => {
                debug!("{} not visible yet, assuming build #{}", name, FIRST_BUILD_NUMBER);
                FIRST_BUILD_NUMBER
            }
            Err(e) => {
                warn!(
                    "Failed to re-read {} after creation, assuming build #{}: {}",
                    name, FIRST_BUILD_NUMBER, e
                );
                FIRST_BUILD_NUMBER
            }
        }
    }
}
