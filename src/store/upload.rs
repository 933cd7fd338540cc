use crate::cancel::Context;
use crate::cert::{CertificateMaterial, CertificateMatcher, PreFilter};
use crate::store::naming::{new_idempotency_token, synthesize_name};
use crate::store::{CertificateStore, CreateCertificate, VendorCertificateRecord};
use crate::utils::errors::Result;
use crate::utils::logger::Logger;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Overrides the store's own page size
    pub page_size: Option<u32>,
    pub name_prefix: String,
    /// Attempts for one logical create, all sharing one idempotency token
    pub create_attempts: u32,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            page_size: None,
            name_prefix: "certimate".to_string(),
            create_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The store already holds this certificate
    Found {
        vendor_cert_id: String,
        vendor_cert_name: String,
    },
    Created {
        vendor_cert_id: String,
        vendor_cert_name: String,
    },
}

impl UploadOutcome {
    pub fn vendor_cert_id(&self) -> &str {
        match self {
            UploadOutcome::Found { vendor_cert_id, .. }
            | UploadOutcome::Created { vendor_cert_id, .. } => vendor_cert_id,
        }
    }

    pub fn vendor_cert_name(&self) -> &str {
        match self {
            UploadOutcome::Found {
                vendor_cert_name, ..
            }
            | UploadOutcome::Created {
                vendor_cert_name, ..
            } => vendor_cert_name,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UploadOutcome::Created { .. })
    }
}

/// Uploads a certificate to a vendor store unless an identical one is
/// already there.
pub struct CertificateUploader {
    store: Arc<dyn CertificateStore>,
    options: UploadOptions,
    logger: Logger,
}

impl CertificateUploader {
    pub fn new(store: Arc<dyn CertificateStore>, options: UploadOptions) -> Self {
        Self {
            store,
            options,
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = Logger::or_discard(logger);
        self
    }

    pub async fn upload(&self, ctx: &Context, material: &CertificateMaterial) -> Result<UploadOutcome> {
        if let Some(existing) = self.find_existing(ctx, material).await? {
            self.logger.scope(|| {
                info!(
                    vendor_cert_id = %existing.vendor_cert_id,
                    vendor_cert_name = %existing.vendor_cert_name,
                    "certificate already uploaded, reusing it"
                );
            });
            return Ok(UploadOutcome::Found {
                vendor_cert_id: existing.vendor_cert_id,
                vendor_cert_name: existing.vendor_cert_name,
            });
        }

        self.create(ctx, material).await
    }

    async fn find_existing(
        &self,
        ctx: &Context,
        material: &CertificateMaterial,
    ) -> Result<Option<VendorCertificateRecord>> {
        let page_size = self.options.page_size.unwrap_or_else(|| self.store.page_size());
        let mut page = 1;

        loop {
            let listed = ctx
                .run(self.store.list(page, page_size))
                .await
                .map_err(|e| e.during("store.List"))?;
            let count = listed.records.len();
            self.logger.scope(|| debug!(page, count, "listed vendor certificates"));

            for record in listed.records {
                if self.is_same_certificate(ctx, material, &record).await? {
                    return Ok(Some(record));
                }
            }

            if !listed.has_more || count == 0 {
                return Ok(None);
            }
            page += 1;
        }
    }

    async fn is_same_certificate(
        &self,
        ctx: &Context,
        material: &CertificateMaterial,
        record: &VendorCertificateRecord,
    ) -> Result<bool> {
        if CertificateMatcher::pre_filter(material.summary(), record.summary.as_ref())
            == PreFilter::Different
        {
            return Ok(false);
        }

        let remote_pem = match &record.certificate_pem {
            Some(pem) => pem.clone(),
            None => {
                let detail = ctx
                    .run(self.store.get_detail(&record.vendor_cert_id))
                    .await
                    .map_err(|e| e.during("store.GetDetail"))?;
                match detail.certificate_pem {
                    Some(pem) => pem,
                    None => {
                        self.logger.scope(|| {
                            debug!(vendor_cert_id = %record.vendor_cert_id, "detail carries no certificate content");
                        });
                        return Ok(false);
                    }
                }
            }
        };

        // Stores often keep only the leaf, or reorder the chain tail
        Ok(CertificateMatcher::equal_leaf(material.full_chain_pem(), &remote_pem))
    }

    async fn create(&self, ctx: &Context, material: &CertificateMaterial) -> Result<UploadOutcome> {
        let name = self.store.sanitize_name(&synthesize_name(&self.options.name_prefix));
        let request = CreateCertificate {
            name,
            certificate_pem: material.full_chain_pem().to_string(),
            private_key_pem: material.private_key_pem().to_string(),
            idempotency_token: new_idempotency_token(),
        };
        let attempts = self.options.create_attempts.max(1);

        let mut attempt = 1;
        loop {
            match ctx.run(self.store.create(&request)).await {
                Ok(vendor_cert_id) => {
                    self.logger.scope(|| {
                        info!(%vendor_cert_id, vendor_cert_name = %request.name, "certificate uploaded");
                    });
                    return Ok(UploadOutcome::Created {
                        vendor_cert_id,
                        vendor_cert_name: request.name,
                    });
                }
                Err(e) if attempt < attempts && e.is_transient() => {
                    self.logger.scope(|| {
                        warn!(attempt, attempts, error = %e, "certificate create failed, retrying with the same token");
                    });
                    attempt += 1;
                }
                Err(e) => return Err(e.during("store.Create")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::material::testing::{leaf_pem, DUMMY_KEY};
    use crate::cert::CertificateSummary;
    use crate::store::StorePage;
    use crate::utils::errors::{CertimateError, CancelReason};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStore {
        records: Mutex<Vec<VendorCertificateRecord>>,
        list_includes_pem: bool,
        page_size: u32,
        failing_creates: Mutex<u32>,
        rejecting_creates: bool,
        failing_list_page: Option<u32>,
        failing_details: bool,
        list_delay: Option<std::time::Duration>,
        cancel_on_list: Option<Context>,
        list_calls: Mutex<u32>,
        detail_calls: Mutex<u32>,
        create_tokens: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn new(page_size: u32) -> Self {
            Self {
                page_size,
                ..Default::default()
            }
        }

        fn list_calls(&self) -> u32 {
            *self.list_calls.lock().unwrap()
        }

        fn detail_calls(&self) -> u32 {
            *self.detail_calls.lock().unwrap()
        }

        fn create_tokens(&self) -> Vec<String> {
            self.create_tokens.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CertificateStore for MockStore {
        fn page_size(&self) -> u32 {
            self.page_size
        }

        async fn list(&self, page: u32, page_size: u32) -> Result<StorePage> {
            *self.list_calls.lock().unwrap() += 1;
            if let Some(delay) = self.list_delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing_list_page == Some(page) {
                return Err(CertimateError::NotFound(format!("page {page}")));
            }
            if let Some(ctx) = &self.cancel_on_list {
                ctx.cancel();
            }
            let records = self.records.lock().unwrap();
            let start = ((page - 1) * page_size) as usize;
            let end = (start + page_size as usize).min(records.len());
            let slice = records.get(start..end).unwrap_or_default();
            Ok(StorePage {
                records: slice
                    .iter()
                    .cloned()
                    .map(|mut r| {
                        if !self.list_includes_pem {
                            r.certificate_pem = None;
                        }
                        r
                    })
                    .collect(),
                has_more: end < records.len(),
            })
        }

        async fn get_detail(&self, vendor_cert_id: &str) -> Result<VendorCertificateRecord> {
            *self.detail_calls.lock().unwrap() += 1;
            if self.failing_details {
                return Err(CertimateError::NotFound(vendor_cert_id.to_string()));
            }
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.vendor_cert_id == vendor_cert_id)
                .cloned()
                .ok_or_else(|| CertimateError::NotFound(vendor_cert_id.to_string()))
        }

        async fn create(&self, request: &CreateCertificate) -> Result<String> {
            self.create_tokens
                .lock()
                .unwrap()
                .push(request.idempotency_token.clone());
            if self.rejecting_creates {
                return Err(CertimateError::InvalidInput("certificate rejected".to_string()));
            }
            {
                let mut failing = self.failing_creates.lock().unwrap();
                if *failing > 0 {
                    *failing -= 1;
                    return Err(CertimateError::vendor("mock.Create", "503 Service Unavailable"));
                }
            }
            let material = CertificateMaterial::from_pem(&request.certificate_pem, &request.private_key_pem)?;
            let mut records = self.records.lock().unwrap();
            let id = format!("vendor-{}", records.len() + 1);
            records.push(VendorCertificateRecord {
                vendor_cert_id: id.clone(),
                vendor_cert_name: request.name.clone(),
                created_at: Some(Utc::now()),
                summary: Some(material.summary().clone()),
                certificate_pem: Some(request.certificate_pem.clone()),
            });
            Ok(id)
        }
    }

    fn issued(cn: &str) -> CertificateMaterial {
        CertificateMaterial::from_pem(&leaf_pem(cn, &[cn], 2030), DUMMY_KEY).unwrap()
    }

    fn unrelated_record(i: usize) -> VendorCertificateRecord {
        let name = format!("site{i}.test");
        VendorCertificateRecord {
            vendor_cert_id: format!("other-{i}"),
            vendor_cert_name: name.clone(),
            created_at: None,
            summary: Some(CertificateSummary {
                common_name: name.clone(),
                subject_alt_names: vec![name],
                not_before: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                not_after: Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap(),
            }),
            certificate_pem: None,
        }
    }

    fn stored(material: &CertificateMaterial, id: &str) -> VendorCertificateRecord {
        VendorCertificateRecord {
            vendor_cert_id: id.to_string(),
            vendor_cert_name: format!("{id}-name"),
            created_at: None,
            summary: Some(material.summary().clone()),
            certificate_pem: Some(material.full_chain_pem().to_string()),
        }
    }

    fn uploader(store: Arc<MockStore>, options: UploadOptions) -> CertificateUploader {
        CertificateUploader::new(store, options).with_logger(None)
    }

    #[tokio::test]
    async fn test_upload_twice_creates_once() {
        let store = Arc::new(MockStore::new(1000));
        let uploader = uploader(store.clone(), UploadOptions::default());
        let material = issued("example.com");

        let first = uploader.upload(&Context::new(), &material).await.unwrap();
        assert!(first.is_created());
        assert!(first.vendor_cert_name().starts_with("certimate-"));

        let second = uploader.upload(&Context::new(), &material).await.unwrap();
        assert_eq!(
            second,
            UploadOutcome::Found {
                vendor_cert_id: first.vendor_cert_id().to_string(),
                vendor_cert_name: first.vendor_cert_name().to_string(),
            }
        );
        assert_eq!(store.create_tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_prepopulated_store_never_creates() {
        let material = issued("example.com");
        let mut records: Vec<_> = (0..2500).map(unrelated_record).collect();
        records.push(stored(&material, "existing"));
        let store = Arc::new(MockStore {
            records: Mutex::new(records),
            ..MockStore::new(1000)
        });

        let outcome = uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &material)
            .await
            .unwrap();

        assert_eq!(outcome.vendor_cert_id(), "existing");
        assert!(!outcome.is_created());
        assert_eq!(store.list_calls(), 3);
        // Only the metadata match needed its content fetched
        assert_eq!(store.detail_calls(), 1);
        assert!(store.create_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_first_match_stops_enumeration() {
        let material = issued("example.com");
        let mut records = vec![stored(&material, "existing")];
        records.extend((0..10).map(unrelated_record));
        let store = Arc::new(MockStore {
            records: Mutex::new(records),
            list_includes_pem: true,
            ..MockStore::new(2)
        });

        uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &material)
            .await
            .unwrap();
        assert_eq!(store.list_calls(), 1);
        assert_eq!(store.detail_calls(), 0);
    }

    #[tokio::test]
    async fn test_metadata_mismatch_skips_detail_call() {
        let material = issued("example.com");
        let mut lookalike = stored(&material, "lookalike");
        if let Some(summary) = lookalike.summary.as_mut() {
            summary.subject_alt_names.push("www.example.com".to_string());
        }
        let store = Arc::new(MockStore {
            records: Mutex::new(vec![lookalike]),
            ..MockStore::new(1000)
        });

        let outcome = uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &material)
            .await
            .unwrap();
        assert!(outcome.is_created());
        assert_eq!(store.detail_calls(), 0);
    }

    #[tokio::test]
    async fn test_same_metadata_different_content_creates() {
        let material = issued("example.com");
        let twin = issued("example.com");
        let mut record = stored(&twin, "twin");
        // Same listing metadata, different certificate bytes
        record.summary = Some(material.summary().clone());
        let store = Arc::new(MockStore {
            records: Mutex::new(vec![record]),
            ..MockStore::new(1000)
        });

        let outcome = uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &material)
            .await
            .unwrap();
        assert!(outcome.is_created());
        assert_eq!(store.detail_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_between_pages() {
        let ctx = Context::new();
        let store = Arc::new(MockStore {
            records: Mutex::new((0..5).map(unrelated_record).collect()),
            cancel_on_list: Some(ctx.clone()),
            ..MockStore::new(2)
        });

        let err = uploader(store.clone(), UploadOptions::default())
            .upload(&ctx, &issued("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::Cancelled(CancelReason::Cancelled)
        ));
        assert_eq!(store.list_calls(), 1);
        assert!(store.create_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_create_retries_reuse_token() {
        let store = Arc::new(MockStore {
            failing_creates: Mutex::new(2),
            ..MockStore::new(1000)
        });
        let options = UploadOptions {
            create_attempts: 3,
            ..Default::default()
        };

        let outcome = uploader(store.clone(), options)
            .upload(&Context::new(), &issued("example.com"))
            .await
            .unwrap();
        assert!(outcome.is_created());

        let tokens = store.create_tokens();
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|t| t == &tokens[0]));
    }

    #[tokio::test]
    async fn test_create_failure_is_not_retried_by_default() {
        let store = Arc::new(MockStore {
            failing_creates: Mutex::new(1),
            ..MockStore::new(1000)
        });

        let err = uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &issued("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, CertimateError::VendorApi { .. }));
        assert_eq!(store.create_tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_separate_uploads_get_fresh_tokens() {
        let store = Arc::new(MockStore::new(1000));
        let uploader = uploader(store.clone(), UploadOptions::default());
        uploader
            .upload(&Context::new(), &issued("a.example.com"))
            .await
            .unwrap();
        uploader
            .upload(&Context::new(), &issued("b.example.com"))
            .await
            .unwrap();

        let tokens = store.create_tokens();
        assert_eq!(tokens.len(), 2);
        assert_ne!(tokens[0], tokens[1]);
    }

    #[tokio::test]
    async fn test_list_failure_aborts_upload() {
        let store = Arc::new(MockStore {
            records: Mutex::new((0..5).map(unrelated_record).collect()),
            failing_list_page: Some(2),
            ..MockStore::new(2)
        });

        let err = uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &issued("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::VendorApi { ref operation, .. } if operation == "store.List"
        ));
        assert_eq!(store.list_calls(), 2);
        assert!(store.create_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_detail_failure_aborts_upload() {
        let material = issued("example.com");
        let store = Arc::new(MockStore {
            records: Mutex::new(vec![stored(&material, "existing")]),
            failing_details: true,
            ..MockStore::new(1000)
        });

        let err = uploader(store.clone(), UploadOptions::default())
            .upload(&Context::new(), &material)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::VendorApi { ref operation, .. } if operation == "store.GetDetail"
        ));
        assert_eq!(store.detail_calls(), 1);
        assert!(store.create_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_is_not_retried() {
        let store = Arc::new(MockStore {
            rejecting_creates: true,
            ..MockStore::new(1000)
        });
        let options = UploadOptions {
            create_attempts: 3,
            ..Default::default()
        };

        let err = uploader(store.clone(), options)
            .upload(&Context::new(), &issued("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::VendorApi { ref operation, .. } if operation == "store.Create"
        ));
        assert_eq!(store.create_tokens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_list_aborted_at_deadline() {
        let store = Arc::new(MockStore {
            list_delay: Some(std::time::Duration::from_secs(3)),
            ..MockStore::new(1000)
        });
        let ctx = Context::new().with_timeout(std::time::Duration::from_millis(100));
        let started = tokio::time::Instant::now();

        let err = uploader(store.clone(), UploadOptions::default())
            .upload(&ctx, &issued("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CertimateError::Cancelled(CancelReason::DeadlineExceeded)
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(store.create_tokens().is_empty());
    }
}
