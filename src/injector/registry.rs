//! Per-injector storage of providers and instances.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use mondi_core::Instance;

use crate::provider::Provider;

/// Providers registered directly on one injector.
///
/// Lookups of inherited providers walk the parent injectors, see
/// [`Injector::has`](crate::Injector::has).
#[derive(Debug, Default)]
pub(crate) struct Registry {
    providers: RwLock<BTreeMap<String, Provider>>,
}

impl Registry {
    /// Registers a provider, returning the one it replaced.
    pub(crate) fn insert(&self, name: String, provider: Provider) -> Option<Provider> {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, provider)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Provider> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Returns a snapshot of every registered provider.
    pub(crate) fn entries(&self) -> Vec<(String, Provider)> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, provider)| (name.clone(), provider.clone()))
            .collect()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// Instances resolved from the providers of one injector.
///
/// Entries are never evicted nor replaced.
#[derive(Debug, Default)]
pub(crate) struct InstanceCache {
    instances: RwLock<BTreeMap<String, Instance>>,
}

impl InstanceCache {
    pub(crate) fn get(&self, name: &str) -> Option<Instance> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Caches `instance` under `name` unless an instance is already cached, and returns the
    /// cached one.
    pub(crate) fn get_or_insert(&self, name: &str, instance: Instance) -> Instance {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_owned())
            .or_insert(instance)
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
