//! Vendor certificate stores and the upload-dedup protocol run against them.

pub mod naming;
pub mod upload;

pub use naming::{new_idempotency_token, synthesize_name};
pub use upload::{CertificateUploader, UploadOptions, UploadOutcome};

use crate::cert::CertificateSummary;
use crate::utils::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// A certificate as a vendor store reports it.
///
/// List APIs usually fill `summary` and leave `certificate_pem` empty;
/// `get_detail` is expected to return the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCertificateRecord {
    pub vendor_cert_id: String,
    pub vendor_cert_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub summary: Option<CertificateSummary>,
    pub certificate_pem: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StorePage {
    pub records: Vec<VendorCertificateRecord>,
    pub has_more: bool,
}

/// Arguments of one create call
#[derive(Debug, Clone)]
pub struct CreateCertificate {
    pub name: String,
    pub certificate_pem: String,
    pub private_key_pem: String,
    /// Stable across retried attempts of the same logical create
    pub idempotency_token: String,
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    fn page_size(&self) -> u32 {
        DEFAULT_PAGE_SIZE
    }

    /// Vendor naming rule applied to synthesized names
    fn sanitize_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// `page` is 1-based.
    async fn list(&self, page: u32, page_size: u32) -> Result<StorePage>;

    async fn get_detail(&self, vendor_cert_id: &str) -> Result<VendorCertificateRecord>;

    /// Returns the vendor id of the new certificate.
    async fn create(&self, request: &CreateCertificate) -> Result<String>;
}
