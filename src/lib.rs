pub mod acme;
pub mod auth;
pub mod cancel;
pub mod cert;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod notify;
pub mod registry;
pub mod storage;
pub mod store;
pub mod utils;

// Re-export specific items to avoid conflicts
pub use acme::{AcmeIssuer, ObtainCertificateRequest, ObtainCertificateResponse};
pub use cancel::{run_blocking, Context};
pub use cert::{CertificateMaterial, CertificateMatcher};
pub use config::EngineConfig;
pub use deploy::{DeploymentDriver, Deployer};
pub use notify::Notifier;
pub use registry::{CapabilityKind, CapabilityRegistry};
pub use store::{CertificateStore, CertificateUploader};
pub use utils::{errors, paths};
