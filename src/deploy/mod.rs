//! Pushing an uploaded certificate to delivery targets.
//!
//! A [`Deployer`] is the vendor-specific adapter (CDN, load balancer,
//! gateway). [`DeploymentDriver`] owns the generic part: choosing targets,
//! skipping those already serving the certificate, submitting one job and
//! polling it to a terminal state.

pub mod driver;
pub mod job;

pub use driver::{DeployOptions, DeployOutcome, DeploymentDriver, TargetSelection};
pub use job::{DeploymentJob, JobCounts, JobState, JobStatus};

use crate::utils::errors::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Deployer: Send + Sync {
    /// Every target that could serve the vendor certificate `cert_id`.
    async fn resolve_targets(&self, cert_id: &str) -> Result<Vec<String>>;

    /// Targets already bound to `cert_id`.
    async fn list_deployed_targets(&self, cert_id: &str) -> Result<Vec<String>>;

    /// Start a remote apply job and return its id.
    async fn submit(&self, cert_id: &str, targets: &[String]) -> Result<String>;

    async fn poll_status(&self, job_id: &str) -> Result<JobStatus>;
}
