use crate::storage::repository::{
    CertificateRecord, CertificateRepository, PersistenceSettings, SettingsRepository,
};
use crate::utils::errors::{CertimateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// Certificate index kept in memory, ordered by expiry
#[derive(Debug, Default)]
pub struct MemoryRepository {
    certificates: RwLock<Vec<CertificateRecord>>,
    settings: RwLock<PersistenceSettings>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: PersistenceSettings) -> Self {
        Self {
            certificates: RwLock::new(Vec::new()),
            settings: RwLock::new(settings),
        }
    }

    pub async fn set_persistence_settings(&self, settings: PersistenceSettings) {
        *self.settings.write().await = settings;
    }

    pub async fn len(&self) -> usize {
        self.certificates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.certificates.read().await.is_empty()
    }

    pub async fn find_by_serial(&self, serial: &str) -> Option<CertificateRecord> {
        self.certificates
            .read()
            .await
            .iter()
            .find(|c| !c.is_deleted() && c.serial_number.eq_ignore_ascii_case(serial))
            .cloned()
    }

    /// Hide a record without removing it
    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        let mut certificates = self.certificates.write().await;
        let record = certificates
            .iter_mut()
            .find(|c| c.id == id && !c.is_deleted())
            .ok_or_else(|| CertimateError::NotFound(format!("certificate '{id}'")))?;
        record.deleted_at = Some(Utc::now());
        Ok(())
    }

    fn sort_by_expiry(certificates: &mut [CertificateRecord]) {
        certificates.sort_by(|a, b| a.validity_not_after.cmp(&b.validity_not_after));
    }
}

#[async_trait]
impl CertificateRepository for MemoryRepository {
    async fn get_by_id(&self, id: &str) -> Result<CertificateRecord> {
        self.certificates
            .read()
            .await
            .iter()
            .find(|c| c.id == id && !c.is_deleted())
            .cloned()
            .ok_or_else(|| CertimateError::NotFound(format!("certificate '{id}'")))
    }

    async fn list_expiring_soon(
        &self,
        now: DateTime<Utc>,
        within: Duration,
    ) -> Result<Vec<CertificateRecord>> {
        let threshold = now + within;
        Ok(self
            .certificates
            .read()
            .await
            .iter()
            .filter(|c| !c.is_deleted())
            .filter(|c| c.validity_not_after > now && c.validity_not_after < threshold)
            .cloned()
            .collect())
    }

    async fn save(&self, mut record: CertificateRecord) -> Result<CertificateRecord> {
        if record.id.is_empty() {
            record.id = hex::encode(rand::random::<[u8; 8]>());
        }
        record.updated_at = Utc::now();

        let mut certificates = self.certificates.write().await;
        // Replace existing entry with same id if it exists
        certificates.retain(|c| c.id != record.id);
        certificates.push(record.clone());
        Self::sort_by_expiry(&mut certificates);
        Ok(record)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut certificates = self.certificates.write().await;
        let before_count = certificates.len();
        certificates.retain(|c| c.validity_not_after >= cutoff);
        Ok(before_count - certificates.len())
    }
}

#[async_trait]
impl SettingsRepository for MemoryRepository {
    async fn get_persistence_settings(&self) -> Result<PersistenceSettings> {
        Ok(*self.settings.read().await)
    }
}
