use crate::acme::ObtainCertificateResponse;
use crate::cert::{CertificateMaterial, KeyAlgorithm};
use crate::utils::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateSource {
    /// Issued through ACME
    Request,
    /// Provided by the user
    Upload,
}

/// A stored certificate together with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: String,
    pub source: CertificateSource,
    pub subject_alt_names: Vec<String>,
    pub serial_number: String,
    pub certificate: String,
    pub private_key: String,
    pub issuer_org: String,
    pub issuer_certificate: String,
    pub key_algorithm: KeyAlgorithm,
    pub validity_not_before: DateTime<Utc>,
    pub validity_not_after: DateTime<Utc>,
    pub acme_acct_url: String,
    pub acme_cert_url: String,
    pub acme_cert_stable_url: String,
    pub is_renewed: bool,
    pub is_revoked: bool,
    pub workflow_id: Option<String>,
    pub workflow_run_id: Option<String>,
    pub workflow_node_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CertificateRecord {
    /// A new, unsaved record; the repository assigns the id.
    pub fn from_material(source: CertificateSource, material: &CertificateMaterial) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            source,
            subject_alt_names: material.subject_alt_names().to_vec(),
            serial_number: material.serial_number().to_string(),
            certificate: material.full_chain_pem().to_string(),
            private_key: material.private_key_pem().to_string(),
            issuer_org: material.issuer_org().to_string(),
            issuer_certificate: material.issuer_pem().to_string(),
            key_algorithm: material.key_algorithm(),
            validity_not_before: material.not_before(),
            validity_not_after: material.not_after(),
            acme_acct_url: String::new(),
            acme_cert_url: String::new(),
            acme_cert_stable_url: String::new(),
            is_renewed: false,
            is_revoked: false,
            workflow_id: None,
            workflow_run_id: None,
            workflow_node_id: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn from_obtained(response: &ObtainCertificateResponse) -> Self {
        let mut record = Self::from_material(CertificateSource::Request, &response.material);
        record.acme_acct_url = response.acme_acct_url.clone();
        record.acme_cert_url = response.acme_cert_url.clone();
        record.acme_cert_stable_url = response.acme_cert_stable_url.clone();
        record.is_renewed = response.ari_replaced;
        record
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.validity_not_after
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Zero keeps expired certificates forever
    #[serde(default)]
    pub expired_certificates_max_days_retention: u32,
    #[serde(default)]
    pub workflow_runs_max_days_retention: u32,
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Soft-deleted records are reported as not found.
    async fn get_by_id(&self, id: &str) -> Result<CertificateRecord>;

    /// Live records with `now < not_after < now + within`, soonest first
    async fn list_expiring_soon(
        &self,
        now: DateTime<Utc>,
        within: Duration,
    ) -> Result<Vec<CertificateRecord>>;

    /// Insert or replace by id; an empty id gets a generated one.
    async fn save(&self, record: CertificateRecord) -> Result<CertificateRecord>;

    /// Remove records whose `not_after` is before `cutoff`; returns the count.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_persistence_settings(&self) -> Result<PersistenceSettings>;
}
