//! Deciding whether two certificate representations are the same certificate.
//!
//! [`CertificateMatcher::equal`] is authoritative: it compares decoded DER,
//! so two PEM strings that differ only in wrapping or whitespace still
//! match. [`CertificateMatcher::looks_like_same_metadata`] is the cheap
//! pre-filter used on vendor listings before spending a detail call.

use crate::cert::material::CertificateSummary;
use crate::utils::pem;

pub struct CertificateMatcher;

/// Outcome of the cheap pre-filter against one listed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreFilter {
    /// Metadata disagrees, skip without any further call
    Different,
    /// Metadata agrees (or is absent), content must decide
    NeedsContent,
}

impl CertificateMatcher {
    /// Byte-level comparison of the decoded certificate chains.
    ///
    /// Either side failing to decode counts as "different".
    pub fn equal(pem_a: &str, pem_b: &str) -> bool {
        match (pem::certificates_der(pem_a), pem::certificates_der(pem_b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Compare only the leaf certificates of two chains.
    ///
    /// Vendors frequently store the leaf alone, or reorder intermediates.
    pub fn equal_leaf(pem_a: &str, pem_b: &str) -> bool {
        match (pem::certificates_der(pem_a), pem::certificates_der(pem_b)) {
            (Ok(a), Ok(b)) => a.first() == b.first(),
            _ => false,
        }
    }

    /// Case-insensitive CN, then exact ordered SANs, then validity to the second
    pub fn looks_like_same_metadata(local: &CertificateSummary, remote: &CertificateSummary) -> bool {
        if !local.common_name.eq_ignore_ascii_case(&remote.common_name) {
            return false;
        }
        if local.subject_alt_names != remote.subject_alt_names {
            return false;
        }
        local.not_before.timestamp() == remote.not_before.timestamp()
            && local.not_after.timestamp() == remote.not_after.timestamp()
    }

    pub fn pre_filter(local: &CertificateSummary, remote: Option<&CertificateSummary>) -> PreFilter {
        match remote {
            Some(remote) if !Self::looks_like_same_metadata(local, remote) => PreFilter::Different,
            _ => PreFilter::NeedsContent,
        }
    }
}
