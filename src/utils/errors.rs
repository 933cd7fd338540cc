use crate::deploy::JobCounts;
use std::fmt;
use thiserror::Error;

/// Why a cancellable wait ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "operation cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Vendor or CA behaviour that breaks the documented contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unexpected deployment job status: {0}")]
    UnexpectedJobStatus(String),

    #[error("certificate already replaced even after dropping the ARI replaces id")]
    AriConflict,
}

#[derive(Error, Debug)]
pub enum CertimateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vendor API error: failed to execute '{operation}': {message}")]
    VendorApi { operation: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Deployment job {job_id} failed ({counts})")]
    DeploymentFailed { job_id: String, counts: JobCounts },

    #[error("Certificate parsing error: {0}")]
    CertParsing(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CertimateError {
    /// Wrap a failed remote call, keeping the operation name in the message.
    pub fn vendor(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        CertimateError::VendorApi {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Attribute an adapter failure to `operation` unless it is already classified.
    pub fn during(self, operation: &str) -> Self {
        match self {
            e @ (CertimateError::VendorApi { .. }
            | CertimateError::Cancelled(_)
            | CertimateError::Protocol(_)
            | CertimateError::Config(_)) => e,
            other => CertimateError::vendor(operation, other),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CertimateError::Cancelled(_))
    }

    /// Remote failures that may succeed when the same call is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CertimateError::VendorApi { .. } | CertimateError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CertimateError>;
