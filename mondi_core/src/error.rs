//! Error types.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// [`Error`] is an error that can be raised by functions and methods from this library.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No injector in the hierarchy has a provider for `name`.
    #[error("no provider for \"{name}\"{}", Chain(.chain))]
    NoProvider { name: String, chain: Vec<String> },

    /// A component was requested again while it was still being resolved.
    ///
    /// The chain ends with the repeated name.
    #[error("cannot resolve circular dependency{}", Chain(.chain))]
    CircularDependency { chain: Vec<String> },

    /// A callable could not be invoked with its declared dependencies.
    #[error("invalid callable: {reason}")]
    InvalidCallable { reason: String },

    /// A name requested to be instantiated anew in a child injector matched no provider.
    #[error("no provider for \"{name}\", cannot use provider from the parent")]
    UnknownScope { name: String },

    /// A resolved component is not of the type requested by its consumer.
    #[error("component \"{name}\" is not of type `{expected}`")]
    TypeMismatch { name: String, expected: &'static str },

    /// An initializer of a module failed.
    #[error("failed to initialize")]
    Initialization {
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Other(Arc<dyn StdError + Send + Sync + 'static>),
}

impl Error {
    pub fn no_provider(name: impl Into<String>, chain: Vec<String>) -> Self {
        Self::NoProvider {
            name: name.into(),
            chain,
        }
    }

    pub fn invalid_callable(reason: impl Into<String>) -> Self {
        Self::InvalidCallable {
            reason: reason.into(),
        }
    }

    pub fn unknown_scope(name: impl Into<String>) -> Self {
        Self::UnknownScope { name: name.into() }
    }

    pub fn type_mismatch<T>(name: impl Into<String>) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::TypeMismatch {
            name: name.into(),
            expected: type_name::<T>(),
        }
    }

    pub fn initialization(source: Self) -> Self {
        match source {
            Self::Initialization { .. } => source,
            source => Self::Initialization {
                source: Box::new(source),
            },
        }
    }

    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Other(Arc::from(err.into()))
    }

    pub const fn is_no_provider(&self) -> bool {
        matches!(self, Self::NoProvider { .. })
    }

    pub fn is_no_provider_for(&self, name: &str) -> bool {
        matches!(self, Self::NoProvider { name: missing, .. } if missing == name)
    }

    pub const fn is_circular_dependency(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    pub const fn is_invalid_callable(&self) -> bool {
        matches!(self, Self::InvalidCallable { .. })
    }

    pub const fn is_unknown_scope(&self) -> bool {
        matches!(self, Self::UnknownScope { .. })
    }

    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    pub const fn is_initialization(&self) -> bool {
        matches!(self, Self::Initialization { .. })
    }

    pub const fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }

    /// Returns the resolution chain carried by the error, if any.
    pub fn chain(&self) -> Option<&[String]> {
        match self {
            Self::NoProvider { chain, .. } | Self::CircularDependency { chain } => Some(chain),
            _ => None,
        }
    }
}

/// Renders a resolution chain as ` (resolving: a -> b -> c)`.
struct Chain<'a>(&'a [String]);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, " (resolving: {})", self.0.join(" -> "))
    }
}

/// [`Result`] is an alias to [`core::result::Result`] with [`Error`] as the
/// default error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
