use crate::acme::ObtainCertificateResponse;
use crate::cert::CertificateParser;
use crate::storage::archive::{self, ArchiveFormat, CertificateArchive};
use crate::storage::repository::{CertificateRecord, CertificateRepository, SettingsRepository};
use crate::utils::errors::{CertimateError, Result};
use crate::utils::logger::Logger;
use crate::utils::pem;
use chrono::{Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{error, info};

/// Days ahead that count as "expiring soon"
pub const EXPIRING_SOON_DAYS: i64 = 20;

const PRIVATE_KEY_LABELS: [&str; 3] = ["PRIVATE KEY", "RSA PRIVATE KEY", "EC PRIVATE KEY"];

pub struct CertificateService {
    certificates: Arc<dyn CertificateRepository>,
    settings: Arc<dyn SettingsRepository>,
    logger: Logger,
}

impl CertificateService {
    pub fn new(
        certificates: Arc<dyn CertificateRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            certificates,
            settings,
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = Logger::or_discard(logger);
        self
    }

    /// Check that `certificate_pem` parses and has not expired.
    ///
    /// Returns the DNS names of the leaf joined by `;`.
    pub fn validate_certificate(certificate_pem: &str) -> Result<String> {
        let parsed = CertificateParser::parse_leaf_pem(certificate_pem)?;
        if parsed.summary.not_after < Utc::now() {
            return Err(CertimateError::InvalidInput(format!(
                "certificate has expired at {}",
                parsed
                    .summary
                    .not_after
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
            )));
        }
        Ok(parsed.summary.subject_alt_names.join(";"))
    }

    /// Accepts PKCS#8, PKCS#1 RSA and SEC1 EC keys.
    pub fn validate_private_key(private_key_pem: &str) -> Result<()> {
        let blocks = pem::parse_blocks(private_key_pem)?;
        let key = blocks
            .iter()
            .find(|b| PRIVATE_KEY_LABELS.contains(&b.label.as_str()))
            .ok_or_else(|| {
                CertimateError::InvalidInput("no private key PEM block found".to_string())
            })?;

        // Every supported encoding is a DER SEQUENCE
        if key.der.first() != Some(&0x30) {
            return Err(CertimateError::InvalidInput(format!(
                "malformed {} payload",
                key.label
            )));
        }
        Ok(())
    }

    pub async fn get_certificate(&self, id: &str) -> Result<CertificateRecord> {
        self.certificates.get_by_id(id).await
    }

    /// Bundle the stored chain and private key of `id` for download.
    pub async fn archive(&self, id: &str, format: ArchiveFormat) -> Result<CertificateArchive> {
        let record = self.certificates.get_by_id(id).await?;
        let packed = archive::pack(&record.certificate, &record.private_key, format)?;
        self.logger.scope(|| {
            info!(id, %format, size = packed.file_bytes.len(), "certificate archived");
        });
        Ok(packed)
    }

    /// Persist a freshly issued certificate.
    pub async fn save_obtained(&self, response: &ObtainCertificateResponse) -> Result<CertificateRecord> {
        let saved = self
            .certificates
            .save(CertificateRecord::from_obtained(response))
            .await?;
        self.logger.scope(|| {
            info!(id = %saved.id, serial = %saved.serial_number, "certificate saved");
        });
        Ok(saved)
    }

    pub async fn list_expiring_soon(&self) -> Result<Vec<CertificateRecord>> {
        self.certificates
            .list_expiring_soon(Utc::now(), Duration::days(EXPIRING_SOON_DAYS))
            .await
    }

    /// Delete certificates expired longer than the configured retention.
    ///
    /// A retention of zero keeps everything.
    pub async fn cleanup_expired_certificates(&self) -> Result<usize> {
        let settings = self.settings.get_persistence_settings().await.inspect_err(|e| {
            self.logger
                .scope(|| error!(error = %e, "failed to get persistence settings"));
        })?;

        let retention = settings.expired_certificates_max_days_retention;
        if retention == 0 {
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(i64::from(retention));
        let deleted = self
            .certificates
            .delete_expired_before(cutoff)
            .await
            .inspect_err(|e| {
                self.logger
                    .scope(|| error!(error = %e, "failed to delete expired certificates"));
            })?;
        if deleted > 0 {
            self.logger
                .scope(|| info!(deleted, retention, "cleaned up expired certificates"));
        }
        Ok(deleted)
    }
}
