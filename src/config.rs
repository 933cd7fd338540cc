//! Engine configuration file.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! The location is `--config`, then `$CERTIMATE_CONFIG`, then
//! `~/.config/certimate-rs/config.yaml`.

use crate::acme::IssuerOptions;
use crate::deploy::DeployOptions;
use crate::storage::PersistenceSettings;
use crate::store::{UploadOptions, DEFAULT_PAGE_SIZE};
use crate::utils::errors::{CertimateError, Result};
use crate::utils::paths::{CertimatePaths, CONFIG_ENV};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub upload: UploadSection,
    pub deploy: DeploySection,
    pub acme: AcmeSection,
    pub persistence: PersistenceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSection {
    pub page_size: u32,
    pub name_prefix: String,
    pub create_attempts: u32,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            name_prefix: "certimate".to_string(),
            create_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploySection {
    pub poll_interval_secs: u64,
    pub skip_deployed: bool,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            skip_deployed: true,
        }
    }
}

/// Zero means "let the ACME client decide"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcmeSection {
    pub dns_propagation_wait_secs: u64,
    pub dns_propagation_timeout_secs: u64,
    pub dns_ttl: u32,
    pub http_delay_secs: u64,
}

impl EngineConfig {
    /// Resolve the config path: explicit, then environment, then default.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => CertimatePaths::default_config(),
        }
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            CertimateError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload.page_size == 0 {
            return Err(CertimateError::Config(
                "upload.page_size must be positive".to_string(),
            ));
        }
        if self.upload.create_attempts == 0 {
            return Err(CertimateError::Config(
                "upload.create_attempts must be at least 1".to_string(),
            ));
        }
        if self.upload.name_prefix.trim().is_empty() {
            return Err(CertimateError::Config(
                "upload.name_prefix must not be empty".to_string(),
            ));
        }
        if self.deploy.poll_interval_secs == 0 {
            return Err(CertimateError::Config(
                "deploy.poll_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            page_size: Some(self.upload.page_size),
            name_prefix: self.upload.name_prefix.clone(),
            create_attempts: self.upload.create_attempts,
        }
    }

    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            poll_interval: Duration::from_secs(self.deploy.poll_interval_secs),
            skip_deployed: self.deploy.skip_deployed,
        }
    }

    pub fn issuer_options(&self) -> IssuerOptions {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        IssuerOptions {
            dns_propagation_wait: secs(self.acme.dns_propagation_wait_secs),
            dns_propagation_timeout: secs(self.acme.dns_propagation_timeout_secs),
            dns_ttl: (self.acme.dns_ttl > 0).then_some(self.acme.dns_ttl),
            http_delay: Duration::from_secs(self.acme.http_delay_secs),
        }
    }
}
