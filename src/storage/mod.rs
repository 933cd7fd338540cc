//! Persistence of issued certificates.
//!
//! The engine only depends on the repository traits; [`memory`] is the
//! in-process implementation used by the CLI and tests.

pub mod archive;
pub mod memory;
pub mod repository;
pub mod service;

pub use archive::{ArchiveFormat, CertificateArchive};
pub use memory::MemoryRepository;
pub use repository::{
    CertificateRecord, CertificateRepository, CertificateSource, PersistenceSettings,
    SettingsRepository,
};
pub use service::CertificateService;
