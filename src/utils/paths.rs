use crate::utils::errors::{CertimateError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CertimatePaths;
const PROGRAM_NAME: &str = "certimate-rs";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CERTIMATE_CONFIG";

impl CertimatePaths {
    /// Get the config directory: ~/.config/certimate-rs/
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| CertimateError::Config("Cannot determine config directory".to_string()))
    }

    /// Get the default config file: ~/.config/certimate-rs/config.yaml
    pub fn default_config() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Ensure a directory exists with proper permissions
    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;

            // Config may hold vendor credentials (700)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(path)?.permissions();
                perms.set_mode(0o700);
                fs::set_permissions(path, perms)?;
            }
        }
        Ok(())
    }
}
