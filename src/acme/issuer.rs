use crate::acme::challenge::{ChallengeSolver, ChallengeType, Dns01Options, Http01Options};
use crate::acme::client::{AcmeClient, AcmeClientError, IssuedBundle, ObtainOrder};
use crate::cancel::{run_blocking, Context};
use crate::cert::{CertificateMaterial, KeyAlgorithm};
use crate::registry::{CapabilityRegistry, ProviderOptions};
use crate::utils::errors::{CertimateError, ProtocolError, Result};
use crate::utils::logger::Logger;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ObtainCertificateRequest {
    pub domains: Vec<String>,
    pub key_type: KeyAlgorithm,
    pub validity_to: Option<DateTime<Utc>>,

    /// `dns-01` or `http-01`
    pub challenge_type: String,
    pub provider: String,
    pub provider_options: ProviderOptions,

    pub disable_follow_cname: bool,
    pub nameservers: Vec<String>,

    /// Seconds; `None` falls back to the issuer defaults
    pub dns_propagation_wait: Option<u64>,
    pub dns_propagation_timeout: Option<u64>,
    pub dns_ttl: Option<u32>,
    pub http_delay_wait: Option<u64>,

    pub acme_profile: Option<String>,

    pub ari_replaces_acct_url: Option<String>,
    pub ari_replaces_cert_id: Option<String>,
}

impl ObtainCertificateRequest {
    pub fn new(domains: Vec<String>, challenge_type: &str, provider: &str) -> Self {
        Self {
            domains,
            key_type: KeyAlgorithm::Ec256,
            validity_to: None,
            challenge_type: challenge_type.to_string(),
            provider: provider.to_string(),
            provider_options: ProviderOptions::default(),
            disable_follow_cname: false,
            nameservers: Vec::new(),
            dns_propagation_wait: None,
            dns_propagation_timeout: None,
            dns_ttl: None,
            http_delay_wait: None,
            acme_profile: None,
            ari_replaces_acct_url: None,
            ari_replaces_cert_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObtainCertificateResponse {
    pub material: CertificateMaterial,
    pub csr_pem: String,
    pub acme_acct_url: String,
    pub acme_cert_url: String,
    pub acme_cert_stable_url: String,
    /// The issued certificate was ordered as an ARI replacement
    pub ari_replaced: bool,
}

/// Defaults applied when a request leaves challenge tuning unset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerOptions {
    pub dns_propagation_wait: Option<Duration>,
    pub dns_propagation_timeout: Option<Duration>,
    pub dns_ttl: Option<u32>,
    pub http_delay: Duration,
}

pub struct AcmeIssuer {
    client: Arc<dyn AcmeClient>,
    registry: Arc<CapabilityRegistry>,
    options: IssuerOptions,
    logger: Logger,
}

impl AcmeIssuer {
    pub fn new(
        client: Arc<dyn AcmeClient>,
        registry: Arc<CapabilityRegistry>,
        options: IssuerOptions,
    ) -> Self {
        Self {
            client,
            registry,
            options,
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = Logger::or_discard(logger);
        self
    }

    /// Configure the challenge solver and order a certificate.
    ///
    /// The whole exchange with the CA runs as one blocking unit raced
    /// against `ctx`. If `ctx` wins, the order may still complete at the CA.
    pub async fn obtain_certificate(
        &self,
        ctx: &Context,
        request: &ObtainCertificateRequest,
    ) -> Result<ObtainCertificateResponse> {
        ctx.check()?;
        if request.domains.is_empty() {
            return Err(CertimateError::InvalidInput(
                "at least one domain is required".to_string(),
            ));
        }

        let solver = self.build_solver(request)?;
        let account_url = self.client.account_url().to_string();
        let order = ObtainOrder {
            domains: request.domains.clone(),
            key_type: request.key_type,
            bundle: true,
            profile: request.acme_profile.clone().filter(|p| !p.is_empty()),
            not_after: request.validity_to,
            replaces_cert_id: replaces_cert_id(request, &account_url),
        };

        self.logger.scope(|| {
            info!(
                domains = ?order.domains,
                challenge = %solver.challenge_type(),
                provider = %request.provider,
                ari = order.replaces_cert_id.is_some(),
                "obtaining certificate"
            );
        });

        let client = self.client.clone();
        let logger = self.logger.clone();
        let (bundle, ari_replaced) = run_blocking(ctx, move || {
            client
                .set_challenge_solver(solver)
                .map_err(|e| CertimateError::vendor("acme.SetChallengeSolver", e))?;
            obtain_with_ari_retry(client.as_ref(), order, &logger)
        })
        .await?;

        let material = CertificateMaterial::from_pem(&bundle.certificate_pem, &bundle.private_key_pem)?;
        self.logger.scope(|| {
            info!(serial = %material.serial_number(), not_after = %material.not_after(), "certificate obtained");
        });

        Ok(ObtainCertificateResponse {
            material,
            csr_pem: bundle.csr_pem.trim().to_string(),
            acme_acct_url: account_url,
            acme_cert_url: bundle.cert_url,
            acme_cert_stable_url: bundle.cert_stable_url,
            ari_replaced,
        })
    }

    /// Revoke through the CA. A single attempt, raced against `ctx`.
    pub async fn revoke_certificate(&self, ctx: &Context, certificate_pem: &str) -> Result<()> {
        let client = self.client.clone();
        let certificate_pem = certificate_pem.to_string();
        run_blocking(ctx, move || {
            client
                .revoke(&certificate_pem)
                .map_err(|e| CertimateError::vendor("acme.Revoke", e))
        })
        .await?;
        self.logger.scope(|| info!("certificate revoked"));
        Ok(())
    }

    fn build_solver(&self, request: &ObtainCertificateRequest) -> Result<ChallengeSolver> {
        let challenge_type: ChallengeType = request.challenge_type.parse()?;
        let solver = match challenge_type {
            ChallengeType::Dns01 => ChallengeSolver::Dns01 {
                provider: self
                    .registry
                    .dns01(&request.provider, &request.provider_options)?,
                options: Dns01Options {
                    propagation_wait: request
                        .dns_propagation_wait
                        .map(Duration::from_secs)
                        .or(self.options.dns_propagation_wait),
                    propagation_timeout: request
                        .dns_propagation_timeout
                        .map(Duration::from_secs)
                        .or(self.options.dns_propagation_timeout),
                    ttl: request.dns_ttl.or(self.options.dns_ttl),
                    nameservers: request.nameservers.clone(),
                    disable_follow_cname: request.disable_follow_cname,
                },
            },
            ChallengeType::Http01 => ChallengeSolver::Http01 {
                provider: self
                    .registry
                    .http01(&request.provider, &request.provider_options)?,
                options: Http01Options {
                    delay: request
                        .http_delay_wait
                        .map(Duration::from_secs)
                        .unwrap_or(self.options.http_delay),
                },
            },
        };
        Ok(solver)
    }
}

/// The ARI id is only meaningful to the account that issued the old certificate.
fn replaces_cert_id(request: &ObtainCertificateRequest, account_url: &str) -> Option<String> {
    match (&request.ari_replaces_acct_url, &request.ari_replaces_cert_id) {
        (Some(acct), Some(id)) if acct == account_url && !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

fn obtain_with_ari_retry(
    client: &dyn AcmeClient,
    mut order: ObtainOrder,
    logger: &Logger,
) -> Result<(IssuedBundle, bool)> {
    match client.obtain(&order) {
        Ok(bundle) => {
            let ari_replaced = order.replaces_cert_id.is_some();
            Ok((bundle, ari_replaced))
        }
        Err(AcmeClientError::AlreadyReplaced) => {
            logger.scope(|| {
                warn!("the certificate has already been replaced, obtaining again without ARI");
            });
            order.replaces_cert_id = None;
            match client.obtain(&order) {
                Ok(bundle) => Ok((bundle, false)),
                Err(AcmeClientError::AlreadyReplaced) => Err(ProtocolError::AriConflict.into()),
                Err(e) => Err(CertimateError::vendor("acme.Obtain", e)),
            }
        }
        Err(e) => Err(CertimateError::vendor("acme.Obtain", e)),
    }
}
