//! Certificate issuance through an ACME CA.
//!
//! The protocol itself is delegated to an [`AcmeClient`]; this module
//! configures challenge solving, applies the ARI replacement rules and
//! keeps every blocking CA exchange cancellable.

pub mod challenge;
pub mod client;
pub mod issuer;

pub use challenge::{ChallengeSolver, ChallengeType, Dns01Options, Dns01Provider, Http01Options, Http01Provider};
pub use client::{AcmeClient, AcmeClientError, IssuedBundle, ObtainOrder};
pub use issuer::{AcmeIssuer, IssuerOptions, ObtainCertificateRequest, ObtainCertificateResponse};
