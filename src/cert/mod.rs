pub mod material;
pub mod matcher;
pub mod parser;
pub mod serial;

pub use material::{CertificateMaterial, CertificateSummary, KeyAlgorithm, MaterialField};
pub use matcher::{CertificateMatcher, PreFilter};
pub use parser::{CertificateParser, ParsedCertificate};
pub use serial::SerialNumber;
