//! String-keyed construction of provider capabilities.
//!
//! Providers are registered once through [`RegistryBuilder`]; the built
//! [`CapabilityRegistry`] is immutable and can be shared freely across
//! tasks. A process-wide instance may be installed with [`install_global`].

pub mod options;

pub use options::{ConfigMap, ProviderOptions};

use crate::acme::challenge::{Dns01Provider, Http01Provider};
use crate::deploy::Deployer;
use crate::notify::{Notifier, WebhookNotifier};
use crate::store::CertificateStore;
use crate::utils::errors::{CertimateError, Result};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityKind {
    CertificateStore,
    Deployer,
    Notifier,
    Dns01,
    Http01,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 5] = [
        Self::CertificateStore,
        Self::Deployer,
        Self::Notifier,
        Self::Dns01,
        Self::Http01,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CertificateStore => "store",
            Self::Deployer => "deployer",
            Self::Notifier => "notifier",
            Self::Dns01 => "dns-01",
            Self::Http01 => "http-01",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = CertimateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CertimateError::InvalidInput(format!("unknown capability kind '{s}'")))
    }
}

/// A constructed provider instance
#[derive(Clone)]
pub enum Capability {
    CertificateStore(Arc<dyn CertificateStore>),
    Deployer(Arc<dyn Deployer>),
    Notifier(Arc<dyn Notifier>),
    Dns01(Arc<dyn Dns01Provider>),
    Http01(Arc<dyn Http01Provider>),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::CertificateStore(_) => CapabilityKind::CertificateStore,
            Capability::Deployer(_) => CapabilityKind::Deployer,
            Capability::Notifier(_) => CapabilityKind::Notifier,
            Capability::Dns01(_) => CapabilityKind::Dns01,
            Capability::Http01(_) => CapabilityKind::Http01,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.kind())
    }
}

pub type Constructor = Arc<dyn Fn(&ProviderOptions) -> Result<Capability> + Send + Sync>;

#[derive(Default)]
pub struct RegistryBuilder {
    constructors: BTreeMap<(CapabilityKind, String), Constructor>,
}

impl RegistryBuilder {
    pub fn register<F>(mut self, kind: CapabilityKind, provider: &str, constructor: F) -> Result<Self>
    where
        F: Fn(&ProviderOptions) -> Result<Capability> + Send + Sync + 'static,
    {
        let key = (kind, provider.to_string());
        if self.constructors.contains_key(&key) {
            return Err(CertimateError::Config(format!(
                "{kind} provider '{provider}' is already registered"
            )));
        }
        self.constructors.insert(key, Arc::new(constructor));
        Ok(self)
    }

    pub fn register_store<F>(self, provider: &str, constructor: F) -> Result<Self>
    where
        F: Fn(&ProviderOptions) -> Result<Arc<dyn CertificateStore>> + Send + Sync + 'static,
    {
        self.register(CapabilityKind::CertificateStore, provider, move |o| {
            constructor(o).map(Capability::CertificateStore)
        })
    }

    pub fn register_deployer<F>(self, provider: &str, constructor: F) -> Result<Self>
    where
        F: Fn(&ProviderOptions) -> Result<Arc<dyn Deployer>> + Send + Sync + 'static,
    {
        self.register(CapabilityKind::Deployer, provider, move |o| {
            constructor(o).map(Capability::Deployer)
        })
    }

    pub fn register_notifier<F>(self, provider: &str, constructor: F) -> Result<Self>
    where
        F: Fn(&ProviderOptions) -> Result<Arc<dyn Notifier>> + Send + Sync + 'static,
    {
        self.register(CapabilityKind::Notifier, provider, move |o| {
            constructor(o).map(Capability::Notifier)
        })
    }

    pub fn register_dns01<F>(self, provider: &str, constructor: F) -> Result<Self>
    where
        F: Fn(&ProviderOptions) -> Result<Arc<dyn Dns01Provider>> + Send + Sync + 'static,
    {
        self.register(CapabilityKind::Dns01, provider, move |o| {
            constructor(o).map(Capability::Dns01)
        })
    }

    pub fn register_http01<F>(self, provider: &str, constructor: F) -> Result<Self>
    where
        F: Fn(&ProviderOptions) -> Result<Arc<dyn Http01Provider>> + Send + Sync + 'static,
    {
        self.register(CapabilityKind::Http01, provider, move |o| {
            constructor(o).map(Capability::Http01)
        })
    }

    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            constructors: self.constructors,
        }
    }
}

pub struct CapabilityRegistry {
    constructors: BTreeMap<(CapabilityKind, String), Constructor>,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn contains(&self, kind: CapabilityKind, provider: &str) -> bool {
        self.constructors.contains_key(&(kind, provider.to_string()))
    }

    /// Registered `(kind, provider)` pairs in a stable order
    pub fn providers(&self) -> Vec<(CapabilityKind, String)> {
        self.constructors.keys().cloned().collect()
    }

    /// Build a fresh instance. Failures are configuration errors.
    pub fn construct(
        &self,
        kind: CapabilityKind,
        provider: &str,
        options: &ProviderOptions,
    ) -> Result<Capability> {
        let constructor = self
            .constructors
            .get(&(kind, provider.to_string()))
            .ok_or_else(|| {
                CertimateError::Config(format!("unsupported {kind} provider '{provider}'"))
            })?;

        let capability = constructor(options).map_err(|e| {
            let detail = match e {
                CertimateError::Config(msg) => msg,
                other => other.to_string(),
            };
            CertimateError::Config(format!(
                "failed to initialize {kind} provider '{provider}': {detail}"
            ))
        })?;

        if capability.kind() != kind {
            return Err(CertimateError::Config(format!(
                "{kind} provider '{provider}' constructed a {} capability",
                capability.kind()
            )));
        }
        Ok(capability)
    }

    pub fn certificate_store(
        &self,
        provider: &str,
        options: &ProviderOptions,
    ) -> Result<Arc<dyn CertificateStore>> {
        match self.construct(CapabilityKind::CertificateStore, provider, options)? {
            Capability::CertificateStore(store) => Ok(store),
            other => Err(kind_mismatch(provider, &other)),
        }
    }

    pub fn deployer(&self, provider: &str, options: &ProviderOptions) -> Result<Arc<dyn Deployer>> {
        match self.construct(CapabilityKind::Deployer, provider, options)? {
            Capability::Deployer(deployer) => Ok(deployer),
            other => Err(kind_mismatch(provider, &other)),
        }
    }

    pub fn notifier(&self, provider: &str, options: &ProviderOptions) -> Result<Arc<dyn Notifier>> {
        match self.construct(CapabilityKind::Notifier, provider, options)? {
            Capability::Notifier(notifier) => Ok(notifier),
            other => Err(kind_mismatch(provider, &other)),
        }
    }

    pub fn dns01(&self, provider: &str, options: &ProviderOptions) -> Result<Arc<dyn Dns01Provider>> {
        match self.construct(CapabilityKind::Dns01, provider, options)? {
            Capability::Dns01(solver) => Ok(solver),
            other => Err(kind_mismatch(provider, &other)),
        }
    }

    pub fn http01(&self, provider: &str, options: &ProviderOptions) -> Result<Arc<dyn Http01Provider>> {
        match self.construct(CapabilityKind::Http01, provider, options)? {
            Capability::Http01(solver) => Ok(solver),
            other => Err(kind_mismatch(provider, &other)),
        }
    }
}

fn kind_mismatch(provider: &str, capability: &Capability) -> CertimateError {
    CertimateError::Config(format!(
        "provider '{provider}' constructed a {} capability",
        capability.kind()
    ))
}

/// Registry with the adapters shipped in this crate.
pub fn default_registry() -> Result<CapabilityRegistry> {
    Ok(CapabilityRegistry::builder()
        .register_notifier("wecombot", |options| {
            Ok(Arc::new(WebhookNotifier::from_options(options)?) as Arc<dyn Notifier>)
        })?
        .build())
}

static GLOBAL: OnceCell<Arc<CapabilityRegistry>> = OnceCell::new();

/// Install the process-wide registry. Fails if one is already installed.
pub fn install_global(registry: CapabilityRegistry) -> Result<Arc<CapabilityRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL
        .set(registry.clone())
        .map_err(|_| CertimateError::Config("global registry is already installed".to_string()))?;
    Ok(registry)
}

pub fn global() -> Option<Arc<CapabilityRegistry>> {
    GLOBAL.get().cloned()
}
