//! Providers: recipes producing named components.

use std::fmt;

use mondi_core::{Instance, Result};

use crate::injectable::Injectable;
use crate::injector::Injector;

/// The kind of a [`Provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Factory,
    Type,
    Value,
    Private,
}

impl ProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factory => "factory",
            Self::Type => "type",
            Self::Value => "value",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered recipe for producing the instance of a named component.
#[derive(Debug, Clone)]
pub enum Provider {
    /// The instance is the value returned by invoking the injectable.
    Factory(Injectable),
    /// The instance is constructed by instantiating the injectable.
    Type(Injectable),
    /// The instance is the value itself, without any injection.
    Value(Instance),
    /// The instance is owned by the encapsulated injector of a private module, and is resolved
    /// from it under `name`.
    Private { injector: Injector, name: String },
}

impl Provider {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Factory(_) => ProviderKind::Factory,
            Self::Type(_) => ProviderKind::Type,
            Self::Value(_) => ProviderKind::Value,
            Self::Private { .. } => ProviderKind::Private,
        }
    }

    /// Returns the scope tags of factory and type providers.
    pub fn scopes(&self) -> &[String] {
        match self {
            Self::Factory(injectable) | Self::Type(injectable) => injectable.scopes(),
            Self::Value(_) | Self::Private { .. } => &[],
        }
    }

    /// Returns the encapsulated injector owning the instance of a private provider.
    pub const fn private_injector(&self) -> Option<&Injector> {
        match self {
            Self::Private { injector, .. } => Some(injector),
            _ => None,
        }
    }

    /// Produces a new instance on behalf of `injector`.
    pub(crate) fn resolve(&self, injector: &Injector) -> Result<Instance> {
        match self {
            Self::Factory(injectable) => injector.invoke(injectable),
            Self::Type(injectable) => injector.instantiate(injectable),
            Self::Value(value) => Ok(value.clone()),
            Self::Private { injector, name } => injector.get(name),
        }
    }
}
