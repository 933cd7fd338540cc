use crate::acme::challenge::ChallengeSolver;
use crate::cert::KeyAlgorithm;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// One certificate order as sent to the CA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObtainOrder {
    pub domains: Vec<String>,
    pub key_type: KeyAlgorithm,
    /// Return the full chain rather than the leaf alone
    pub bundle: bool,
    pub profile: Option<String>,
    pub not_after: Option<DateTime<Utc>>,
    /// ARI `replaces` certificate id
    pub replaces_cert_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuedBundle {
    pub csr_pem: String,
    pub certificate_pem: String,
    pub issuer_pem: String,
    pub private_key_pem: String,
    pub cert_url: String,
    pub cert_stable_url: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcmeClientError {
    /// The CA rejected the ARI `replaces` id because that certificate was
    /// already replaced.
    #[error("the certificate has already been replaced")]
    AlreadyReplaced,

    #[error("{0}")]
    Other(String),
}

/// Registered-account ACME client that drives the protocol itself.
///
/// Every method blocks until the CA answers; callers run them through
/// [`crate::cancel::run_blocking`].
pub trait AcmeClient: Send + Sync {
    fn account_url(&self) -> &str;

    fn set_challenge_solver(&self, solver: ChallengeSolver) -> Result<(), AcmeClientError>;

    fn obtain(&self, order: &ObtainOrder) -> Result<IssuedBundle, AcmeClientError>;

    fn revoke(&self, certificate_pem: &str) -> Result<(), AcmeClientError>;
}
