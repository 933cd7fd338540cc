use crate::cert::material::{CertificateSummary, KeyAlgorithm};
use crate::cert::SerialNumber;
use crate::utils::errors::{CertimateError, Result};
use crate::utils::pem;
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";

/// Fields lifted out of one X.509 certificate
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub serial: SerialNumber,
    pub summary: CertificateSummary,
    pub issuer_org: String,
    pub key_algorithm: KeyAlgorithm,
    pub is_ca: bool,
}

pub struct CertificateParser;

impl CertificateParser {
    /// Parse the first certificate of a PEM chain
    pub fn parse_leaf_pem(pem_data: &str) -> Result<ParsedCertificate> {
        let certs = pem::certificates_der(pem_data)?;
        Self::parse_der(&certs[0])
    }

    pub fn parse_der(der: &[u8]) -> Result<ParsedCertificate> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CertimateError::CertParsing(format!("DER parsing error: {e}")))?;

        let serial = SerialNumber::from_bytes(cert.raw_serial());

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let issuer_org = cert
            .issuer()
            .iter_organization()
            .filter_map(|o| o.as_str().ok())
            .collect::<Vec<_>>()
            .join(";");

        let not_before = timestamp_to_utc(cert.validity().not_before.timestamp())?;
        let not_after = timestamp_to_utc(cert.validity().not_after.timestamp())?;

        let mut subject_alt_names = Vec::new();
        let mut is_ca = false;
        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectAlternativeName(san) => {
                    for name in &san.general_names {
                        if let GeneralName::DNSName(dns) = name {
                            subject_alt_names.push(dns.to_string());
                        }
                    }
                }
                ParsedExtension::BasicConstraints(bc) => is_ca = bc.ca,
                _ => {}
            }
        }

        Ok(ParsedCertificate {
            serial,
            summary: CertificateSummary {
                common_name,
                subject_alt_names,
                not_before,
                not_after,
            },
            issuer_org,
            key_algorithm: Self::key_algorithm(&cert),
            is_ca,
        })
    }

    fn key_algorithm(cert: &X509Certificate) -> KeyAlgorithm {
        let spki = cert.public_key();
        match spki.algorithm.algorithm.to_id_string().as_str() {
            OID_RSA_ENCRYPTION => {
                let bits = match spki.parsed() {
                    Ok(PublicKey::RSA(rsa)) => significant_bits(rsa.modulus),
                    _ => 0,
                };
                KeyAlgorithm::from_rsa_bits(bits)
            }
            OID_EC_PUBLIC_KEY => {
                // Uncompressed point: 0x04 || X || Y
                let point = &spki.subject_public_key.data;
                let bits = point.len().saturating_sub(1) / 2 * 8;
                KeyAlgorithm::from_ec_bits(bits)
            }
            OID_ED25519 => KeyAlgorithm::Ed25519,
            _ => KeyAlgorithm::Unknown,
        }
    }
}

fn significant_bits(big_endian: &[u8]) -> usize {
    let first = big_endian.iter().position(|b| *b != 0);
    match first {
        Some(i) => (big_endian.len() - i) * 8 - big_endian[i].leading_zeros() as usize,
        None => 0,
    }
}

fn timestamp_to_utc(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| CertimateError::CertParsing(format!("Validity timestamp out of range: {ts}")))
}
