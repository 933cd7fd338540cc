//! Downloadable certificate bundles.

use crate::utils::errors::{CertimateError, Result};
use std::fmt;
use std::io::{Cursor, Write};
use std::str::FromStr;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CERTIFICATE_ENTRY: &str = "certbundle.pem";
pub const PRIVATE_KEY_ENTRY: &str = "privkey.pem";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    #[default]
    Pem,
}

impl FromStr for ArchiveFormat {
    type Err = CertimateError;

    /// An empty string selects PEM.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "PEM" => Ok(ArchiveFormat::Pem),
            "PFX" | "JKS" => Err(CertimateError::InvalidInput(format!(
                "unsupported archive format '{s}'"
            ))),
            _ => Err(CertimateError::InvalidInput(format!(
                "unknown archive format '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Pem => write!(f, "PEM"),
        }
    }
}

/// A packed bundle ready to be written out.
#[derive(Debug, Clone)]
pub struct CertificateArchive {
    /// Container extension, always `zip`
    pub file_format: &'static str,
    pub file_bytes: Vec<u8>,
}

/// Pack a certificate chain and its private key in `format`.
pub fn pack(
    certificate_pem: &str,
    private_key_pem: &str,
    format: ArchiveFormat,
) -> Result<CertificateArchive> {
    let entries = match format {
        ArchiveFormat::Pem => [
            (CERTIFICATE_ENTRY, certificate_pem),
            (PRIVATE_KEY_ENTRY, private_key_pem),
        ],
    };

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(name, options)?;
        writer.write_all(contents.as_bytes())?;
    }
    let cursor = writer.finish()?;

    Ok(CertificateArchive {
        file_format: "zip",
        file_bytes: cursor.into_inner(),
    })
}
