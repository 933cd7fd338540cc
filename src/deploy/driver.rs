use crate::cancel::Context;
use crate::deploy::job::{DeploymentJob, JobState};
use crate::deploy::Deployer;
use crate::utils::errors::Result;
use crate::utils::logger::Logger;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Which targets a deployment should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// Exactly these target ids
    Explicit(Vec<String>),
    /// A wildcard domain such as `*.example.com`; every target the vendor
    /// reports as eligible for the certificate is selected
    Wildcard(String),
    /// Every target eligible for the certificate
    CertificateSan,
}

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub poll_interval: Duration,
    pub skip_deployed: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            skip_deployed: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeployOutcome {
    /// Every selected target already serves the certificate
    NothingToDeploy,
    Completed(DeploymentJob),
}

pub struct DeploymentDriver {
    deployer: Arc<dyn Deployer>,
    options: DeployOptions,
    logger: Logger,
}

impl DeploymentDriver {
    pub fn new(deployer: Arc<dyn Deployer>, options: DeployOptions) -> Self {
        Self {
            deployer,
            options,
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = Logger::or_discard(logger);
        self
    }

    /// Submit one job covering the selected targets and poll it to completion.
    ///
    /// Cancellation is checked before every poll and every sleep; it only
    /// stops the local loop, the remote job keeps running.
    pub async fn deploy(
        &self,
        ctx: &Context,
        cert_id: &str,
        selection: &TargetSelection,
    ) -> Result<DeployOutcome> {
        ctx.check()?;
        let targets = self.pending_targets(ctx, cert_id, selection).await?;
        if targets.is_empty() {
            self.logger.scope(|| {
                info!(cert_id, "no targets left to deploy, skipping submit");
            });
            return Ok(DeployOutcome::NothingToDeploy);
        }

        let job_id = ctx
            .run(self.deployer.submit(cert_id, &targets))
            .await
            .map_err(|e| e.during("deployer.Submit"))?;
        let mut job = DeploymentJob::submitted(job_id);
        self.logger.scope(|| {
            info!(cert_id, job_id = job.job_id(), targets = targets.len(), "deployment job submitted");
        });

        loop {
            let status = ctx
                .run(self.deployer.poll_status(job.job_id()))
                .await
                .map_err(|e| e.during("deployer.PollStatus"))?;
            let state = job.observe(status)?;
            if state.is_terminal() {
                break;
            }

            let counts = job.counts();
            self.logger.scope(|| {
                info!(
                    job_id = job.job_id(),
                    running = counts.running,
                    succeeded = counts.succeeded,
                    failed = counts.failed,
                    total = counts.total,
                    "waiting for deployment job completion"
                );
            });
            ctx.sleep(self.options.poll_interval).await?;
        }

        self.logger.scope(|| {
            info!(job_id = job.job_id(), state = %job.state(), counts = %job.counts(), "deployment job finished");
        });
        job.outcome()?;
        Ok(DeployOutcome::Completed(job))
    }

    async fn pending_targets(
        &self,
        ctx: &Context,
        cert_id: &str,
        selection: &TargetSelection,
    ) -> Result<Vec<String>> {
        let selected = match selection {
            TargetSelection::Explicit(ids) => ids.clone(),
            TargetSelection::Wildcard(pattern) => {
                let resolved = self.resolve(ctx, cert_id).await?;
                self.logger.scope(|| {
                    debug!(cert_id, %pattern, resolved = resolved.len(), "resolved wildcard domain to eligible targets");
                });
                resolved
            }
            TargetSelection::CertificateSan => self.resolve(ctx, cert_id).await?,
        };

        let mut seen = HashSet::new();
        let mut targets: Vec<String> = selected
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        if self.options.skip_deployed && !targets.is_empty() {
            let deployed: HashSet<String> = ctx
                .run(self.deployer.list_deployed_targets(cert_id))
                .await
                .map_err(|e| e.during("deployer.ListDeployedTargets"))?
                .into_iter()
                .collect();
            let before = targets.len();
            targets.retain(|t| !deployed.contains(t));
            self.logger.scope(|| {
                debug!(cert_id, skipped = before - targets.len(), "filtered already deployed targets");
            });
        }

        Ok(targets)
    }

    async fn resolve(&self, ctx: &Context, cert_id: &str) -> Result<Vec<String>> {
        ctx.run(self.deployer.resolve_targets(cert_id))
            .await
            .map_err(|e| e.during("deployer.ResolveTargets"))
    }
}

impl DeployOutcome {
    pub fn state(&self) -> Option<JobState> {
        match self {
            DeployOutcome::NothingToDeploy => None,
            DeployOutcome::Completed(job) => Some(job.state()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::job::{JobCounts, JobStatus};
    use crate::utils::errors::{CancelReason, CertimateError, ProtocolError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockDeployer {
        resolvable: Vec<String>,
        deployed: Vec<String>,
        statuses: Mutex<VecDeque<JobStatus>>,
        repeat_last: Option<JobStatus>,
        submits: Mutex<Vec<Vec<String>>>,
        polls: Mutex<u32>,
        poll_delay: Option<Duration>,
    }

    impl MockDeployer {
        fn with_statuses(statuses: &[(u64, u64, u64, u64)]) -> Self {
            Self {
                statuses: Mutex::new(
                    statuses
                        .iter()
                        .map(|&(running, succeeded, failed, total)| {
                            JobStatus::from_counts(JobCounts {
                                running,
                                succeeded,
                                failed,
                                total,
                            })
                        })
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn submits(&self) -> Vec<Vec<String>> {
            self.submits.lock().unwrap().clone()
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Deployer for MockDeployer {
        async fn resolve_targets(&self, _cert_id: &str) -> Result<Vec<String>> {
            Ok(self.resolvable.clone())
        }

        async fn list_deployed_targets(&self, _cert_id: &str) -> Result<Vec<String>> {
            Ok(self.deployed.clone())
        }

        async fn submit(&self, _cert_id: &str, targets: &[String]) -> Result<String> {
            let mut submits = self.submits.lock().unwrap();
            submits.push(targets.to_vec());
            Ok(format!("job-{}", submits.len()))
        }

        async fn poll_status(&self, _job_id: &str) -> Result<JobStatus> {
            *self.polls.lock().unwrap() += 1;
            if let Some(delay) = self.poll_delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.statuses.lock().unwrap().pop_front();
            match next.or(self.repeat_last) {
                Some(status) => Ok(status),
                None => Err(CertimateError::NotFound("no scripted status".into())),
            }
        }
    }

    fn driver(deployer: Arc<MockDeployer>) -> DeploymentDriver {
        DeploymentDriver::new(deployer, DeployOptions::default()).with_logger(None)
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_polling() {
        let deployer = Arc::new(MockDeployer::with_statuses(&[(2, 0, 0, 2), (0, 2, 0, 2)]));
        let outcome = driver(deployer.clone())
            .deploy(
                &Context::new(),
                "cert-1",
                &TargetSelection::Explicit(ids(&["a.example.com", "b.example.com"])),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state(), Some(JobState::Succeeded));
        assert_eq!(deployer.polls(), 2);
        assert_eq!(deployer.submits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmaterialized_job_then_partial_failure() {
        let deployer = Arc::new(MockDeployer::with_statuses(&[(0, 0, 0, 0), (0, 3, 2, 5)]));
        let err = driver(deployer.clone())
            .deploy(
                &Context::new(),
                "cert-1",
                &TargetSelection::Explicit(ids(&["a", "b", "c", "d", "e"])),
            )
            .await
            .unwrap_err();

        match err {
            CertimateError::DeploymentFailed { job_id, counts } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(counts.failed, 2);
                assert_eq!(counts.succeeded, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(deployer.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_target_list_never_submits() {
        let deployer = Arc::new(MockDeployer::default());
        let outcome = driver(deployer.clone())
            .deploy(&Context::new(), "cert-1", &TargetSelection::Explicit(vec![]))
            .await
            .unwrap();
        assert!(matches!(outcome, DeployOutcome::NothingToDeploy));
        assert!(deployer.submits().is_empty());
        assert_eq!(deployer.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_deployed_targets_are_skipped() {
        let deployer = Arc::new(MockDeployer {
            resolvable: ids(&["a.example.com", "b.example.com", "c.example.com"]),
            deployed: ids(&["a.example.com", "c.example.com"]),
            ..MockDeployer::with_statuses(&[(0, 1, 0, 1)])
        });
        driver(deployer.clone())
            .deploy(&Context::new(), "cert-1", &TargetSelection::CertificateSan)
            .await
            .unwrap();
        assert_eq!(deployer.submits(), vec![ids(&["b.example.com"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_targets_deployed_is_success_without_submit() {
        let deployer = Arc::new(MockDeployer {
            resolvable: ids(&["a.example.com"]),
            deployed: ids(&["a.example.com"]),
            ..Default::default()
        });
        let outcome = driver(deployer.clone())
            .deploy(&Context::new(), "cert-1", &TargetSelection::CertificateSan)
            .await
            .unwrap();
        assert!(matches!(outcome, DeployOutcome::NothingToDeploy));
        assert!(deployer.submits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wildcard_selection_uses_every_eligible_target() {
        let deployer = Arc::new(MockDeployer {
            resolvable: ids(&["example.com", "a.example.com", "b.example.com", "a.example.com"]),
            deployed: ids(&["b.example.com"]),
            ..MockDeployer::with_statuses(&[(0, 2, 0, 2)])
        });
        driver(deployer.clone())
            .deploy(
                &Context::new(),
                "cert-1",
                &TargetSelection::Wildcard("*.example.com".into()),
            )
            .await
            .unwrap();
        assert_eq!(
            deployer.submits(),
            vec![ids(&["example.com", "a.example.com"])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_total_is_protocol_error() {
        let deployer = Arc::new(MockDeployer {
            statuses: Mutex::new(VecDeque::from([JobStatus {
                running: Some(1),
                ..Default::default()
            }])),
            ..Default::default()
        });
        let err = driver(deployer)
            .deploy(&Context::new(), "cert-1", &TargetSelection::Explicit(ids(&["a"])))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::Protocol(ProtocolError::UnexpectedJobStatus(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_polling_loop() {
        let running = JobStatus::from_counts(JobCounts {
            running: 1,
            succeeded: 0,
            failed: 0,
            total: 1,
        });
        let deployer = Arc::new(MockDeployer {
            repeat_last: Some(running),
            ..Default::default()
        });
        let ctx = Context::new().with_timeout(Duration::from_secs(12));
        let err = driver(deployer.clone())
            .deploy(&ctx, "cert-1", &TargetSelection::Explicit(ids(&["a"])))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CertimateError::Cancelled(CancelReason::DeadlineExceeded)
        ));
        // Polls at t=0, 5 and 10; the sleep towards t=15 is interrupted.
        assert_eq!(deployer.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_names_operation() {
        let deployer = Arc::new(MockDeployer::default());
        let err = driver(deployer)
            .deploy(&Context::new(), "cert-1", &TargetSelection::Explicit(ids(&["a"])))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::VendorApi { ref operation, .. } if operation == "deployer.PollStatus"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_aborted_at_deadline() {
        let deployer = Arc::new(MockDeployer {
            poll_delay: Some(Duration::from_secs(3)),
            ..MockDeployer::with_statuses(&[(0, 1, 0, 1)])
        });
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        let started = tokio::time::Instant::now();
        let err = driver(deployer.clone())
            .deploy(&ctx, "cert-1", &TargetSelection::Explicit(ids(&["a"])))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CertimateError::Cancelled(CancelReason::DeadlineExceeded)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(deployer.submits().len(), 1);
    }
}
