use crate::utils::errors::{CertimateError, Result};
use base64::{engine::general_purpose, Engine as _};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// One decoded `-----BEGIN <label>----- ... -----END <label>-----` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    pub label: String,
    pub der: Vec<u8>,
}

impl PemBlock {
    pub fn is_certificate(&self) -> bool {
        self.label == CERTIFICATE_LABEL
    }
}

/// Parse every PEM block in `pem_data`.
///
/// Line wrapping, CRLF endings, indentation and blank lines inside a block
/// are ignored; only the base64 payload matters.
pub fn parse_blocks(pem_data: &str) -> Result<Vec<PemBlock>> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in pem_data.lines() {
        let line = line.trim();
        if let Some(label) = strip_marker(line, "-----BEGIN ") {
            if current.is_some() {
                return Err(CertimateError::CertParsing(format!(
                    "Nested PEM block '{label}'"
                )));
            }
            current = Some((label.to_string(), String::new()));
        } else if let Some(label) = strip_marker(line, "-----END ") {
            let (open_label, body) = current.take().ok_or_else(|| {
                CertimateError::CertParsing(format!("Unexpected PEM end marker '{label}'"))
            })?;
            if open_label != label {
                return Err(CertimateError::CertParsing(format!(
                    "PEM block '{open_label}' closed by '{label}'"
                )));
            }
            let der = general_purpose::STANDARD
                .decode(body.as_bytes())
                .map_err(|e| CertimateError::CertParsing(format!("Base64 decode error: {e}")))?;
            blocks.push(PemBlock {
                label: open_label,
                der,
            });
        } else if let Some((_, body)) = current.as_mut() {
            // Skip RFC 1421 style headers such as "Proc-Type: 4,ENCRYPTED"
            if line.contains(':') {
                continue;
            }
            body.extend(line.chars().filter(|c| !c.is_whitespace()));
        }
    }

    if let Some((label, _)) = current {
        return Err(CertimateError::CertParsing(format!(
            "Unterminated PEM block '{label}'"
        )));
    }

    Ok(blocks)
}

fn strip_marker<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix("-----"))
}

/// DER bytes of each certificate in a PEM chain, leaf first
pub fn certificates_der(pem_data: &str) -> Result<Vec<Vec<u8>>> {
    let certs: Vec<Vec<u8>> = parse_blocks(pem_data)?
        .into_iter()
        .filter(PemBlock::is_certificate)
        .map(|block| block.der)
        .collect();

    if certs.is_empty() {
        return Err(CertimateError::CertParsing(
            "No certificate data found in PEM".to_string(),
        ));
    }
    Ok(certs)
}

/// Split a full chain into the leaf and the concatenated issuer certificates
pub fn split_chain(full_chain_pem: &str) -> Result<(String, String)> {
    let certs = certificates_der(full_chain_pem)?;
    let leaf = encode_pem(CERTIFICATE_LABEL, &certs[0]);
    let issuers = certs[1..]
        .iter()
        .map(|der| encode_pem(CERTIFICATE_LABEL, der))
        .collect::<Vec<_>>()
        .join("");
    Ok((leaf, issuers))
}

pub fn encode_pem(label: &str, der: &[u8]) -> String {
    let body = general_purpose::STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}
