//! Provider discovery and selection.
//!
//! [`ProviderRegistry`] is an explicit, constructible list of providers in
//! preference order. Registration validates each provider's feature set;
//! queries re-run the support checks every time, so a mechanism installed
//! while the process runs shows up on the next query.
//!
//! # Example
//!
//! ```
//! use oxcrypt_mount::ProviderRegistry;
//!
//! for provider in ProviderRegistry::global().available_providers() {
//!     println!("{} ({})", provider.display_name(), provider.supported_features());
//! }
//! ```

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{MountError, RegistryError};
use crate::feature::FeatureSet;
use crate::provider::{MountProvider, Provider};
use crate::providers;

/// Serializable information about a provider's availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider identifier (e.g., "bind", "subst")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Brief description of the provider
    pub description: String,
    /// Declared features
    pub features: FeatureSet,
    /// Whether the provider is usable on this system right now
    pub supported: bool,
}

/// An ordered set of mount providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in providers in preference order.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for provider in providers::builtin() {
            if let Err(e) = registry.register_arc(provider) {
                tracing::error!("Skipping built-in provider: {e}");
            }
        }
        registry
    }

    /// The process-wide registry of built-in providers.
    ///
    /// Discovery happens once; support checks still run on every query.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtin)
    }

    /// Register a provider after the already registered ones.
    ///
    /// Fails if the provider declares more than one mount-target kind or its
    /// id is taken.
    pub fn register(&mut self, provider: impl MountProvider + 'static) -> Result<Provider, RegistryError> {
        self.register_arc(Arc::new(provider))
    }

    /// Register a shared provider; see [`register`](Self::register).
    pub fn register_arc(&mut self, provider: Arc<dyn MountProvider>) -> Result<Provider, RegistryError> {
        let provider = Provider::from_arc(provider);
        provider
            .supported_features()
            .validate()
            .map_err(|source| RegistryError::InvalidFeatures {
                id: provider.id().to_string(),
                source,
            })?;
        if self.get(provider.id()).is_some() {
            return Err(RegistryError::DuplicateId(provider.id().to_string()));
        }
        tracing::debug!(provider = provider.id(), "Registered mount provider");
        self.providers.push(provider.clone());
        Ok(provider)
    }

    /// All registered providers, supported or not
    pub fn all(&self) -> &[Provider] {
        &self.providers
    }

    /// Providers whose support check passes, in registration order.
    ///
    /// Lazy: each provider is checked as the iterator reaches it, and every
    /// call starts over with fresh checks.
    pub fn available_providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.providers
            .iter()
            .filter(|p| {
                let supported = p.is_supported();
                tracing::trace!(provider = p.id(), supported, "Checked provider support");
                supported
            })
            .cloned()
    }

    /// Look up a registered provider by id, supported or not.
    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Select a supported provider by id.
    pub fn select(&self, id: &str) -> Result<Provider, MountError> {
        let provider = self
            .get(id)
            .ok_or_else(|| MountError::ProviderUnavailable(format!("unknown provider '{id}'")))?;
        if !provider.is_supported() {
            return Err(MountError::ProviderUnavailable(format!(
                "{} is not supported on this system",
                provider.display_name()
            )));
        }
        Ok(provider.clone())
    }

    /// The first supported provider in preference order.
    pub fn first_available(&self) -> Result<Provider, MountError> {
        self.available_providers()
            .next()
            .ok_or_else(|| MountError::ProviderUnavailable("no supported mount provider".to_string()))
    }

    /// Snapshot of every registered provider's availability.
    pub fn provider_info(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|p| ProviderInfo {
                id: p.id().to_string(),
                name: p.display_name().to_string(),
                description: p.description().to_string(),
                features: p.supported_features(),
                supported: p.is_supported(),
            })
            .collect()
    }
}
