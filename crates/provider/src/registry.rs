//! Process-wide provider registry.
//!
//! Built once at startup through [`RegistryBuilder`], then frozen:
//! lookups only. The temporarily-unavailable skip list lets operators
//! bench a misbehaving provider without redeploying its pipeline
//! configs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fitglue_core::ProviderType;
use tracing::info;

use crate::traits::{EnricherProvider, ProviderServices};

pub struct ProviderRegistry {
    by_name: HashMap<String, Arc<dyn EnricherProvider>>,
    by_type: HashMap<ProviderType, Arc<dyn EnricherProvider>>,
    unavailable: HashSet<ProviderType>,
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get_by_type(&self, provider_type: ProviderType) -> Option<Arc<dyn EnricherProvider>> {
        self.by_type.get(&provider_type).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn EnricherProvider>> {
        self.by_name.get(name).cloned()
    }

    /// Whether dispatch should skip this provider right now.
    pub fn is_unavailable(&self, provider_type: ProviderType) -> bool {
        self.unavailable.contains(&provider_type)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    providers: Vec<Arc<dyn EnricherProvider>>,
    unavailable: HashSet<ProviderType>,
    services: Option<ProviderServices>,
}

impl RegistryBuilder {
    pub fn register(mut self, provider: Arc<dyn EnricherProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Mark a provider type temporarily unavailable.
    pub fn unavailable(mut self, provider_type: ProviderType) -> Self {
        self.unavailable.insert(provider_type);
        self
    }

    /// Runtime services bound to every provider at build time.
    pub fn services(mut self, services: ProviderServices) -> Self {
        self.services = Some(services);
        self
    }

    /// Freeze into a registry. A later registration for the same name
    /// or type wins; the earlier one is dropped.
    pub fn build(self) -> ProviderRegistry {
        let mut by_name = HashMap::new();
        let mut by_type = HashMap::new();
        for provider in self.providers {
            if let Some(services) = &self.services {
                provider.bind_services(services);
            }
            by_name.insert(provider.name().to_string(), provider.clone());
            by_type.insert(provider.provider_type(), provider);
        }
        info!(
            providers = by_type.len(),
            unavailable = self.unavailable.len(),
            "provider registry frozen"
        );
        ProviderRegistry {
            by_name,
            by_type,
            unavailable: self.unavailable,
        }
    }
}
