//! Opaque component instances with erased type informations.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Looks up a named field of the erased value, if its concrete type implements [`Fields`].
type Navigator = fn(&(dyn Any + Send + Sync), &str) -> Option<Instance>;

/// [`Instance`] is a shared handle to a resolved component of an arbitrary type, as long as it
/// is [`Send`], [`Sync`] and `'static`.
///
/// Cloning an instance is cheap and never clones the underlying value: all clones point to the
/// same allocation, which is what makes singletons observable through [`Instance::ptr_eq`].
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    navigator: Option<Navigator>,
}

impl Instance {
    /// Creates a new `Instance` owning `value`.
    #[must_use]
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::from_arc(Arc::new(value))
    }

    /// Creates a new `Instance` sharing the allocation of `value`.
    #[must_use]
    pub fn from_arc<T>(value: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            value,
            navigator: None,
        }
    }

    /// Creates a new `Instance` whose fields can be addressed by dotted lookups.
    #[must_use]
    pub fn navigable<T>(value: T) -> Self
    where
        T: Fields + Any + Send + Sync,
    {
        Self {
            value: Arc::new(value),
            navigator: Some(navigate::<T>),
        }
    }

    /// Tries to downcast `self` into a shared pointer to `T`.
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        Arc::clone(&self.value).downcast().ok()
    }

    /// Returns a reference to the underlying value if it is of type `T`.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Any,
    {
        (*self.value).downcast_ref()
    }

    /// Returns `true` if the underlying value is of type `T`.
    pub fn is<T>(&self) -> bool
    where
        T: Any,
    {
        (*self.value).is::<T>()
    }

    /// Returns the [`TypeId`] of the underlying value.
    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    /// Returns the field `name` of the underlying value.
    ///
    /// Always `None` unless the instance was created with [`Instance::navigable`].
    pub fn field(&self, name: &str) -> Option<Self> {
        self.navigator.and_then(|navigate| navigate(&*self.value, name))
    }

    /// Returns `true` if [`field`](Self::field) may return anything.
    pub const fn is_navigable(&self) -> bool {
        self.navigator.is_some()
    }

    /// Returns `true` if both instances point to the same value.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&this.value), Arc::as_ptr(&other.value))
    }
}

fn navigate<T>(value: &(dyn Any + Send + Sync), name: &str) -> Option<Instance>
where
    T: Fields + Any,
{
    value.downcast_ref::<T>()?.field(name)
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("navigable", &self.is_navigable())
            .finish_non_exhaustive()
    }
}

/// A value whose named fields can be reached by dotted lookups such as `config.db.url`.
pub trait Fields {
    /// Returns the field `name`, if one exists.
    fn field(&self, name: &str) -> Option<Instance>;
}

impl Fields for BTreeMap<String, Instance> {
    fn field(&self, name: &str) -> Option<Instance> {
        self.get(name).cloned()
    }
}

impl<S> Fields for HashMap<String, Instance, S>
where
    S: std::hash::BuildHasher,
{
    fn field(&self, name: &str) -> Option<Instance> {
        self.get(name).cloned()
    }
}

/// A wrapper around a single component value.
///
/// As a parameter, the value is cloned out of the resolved instance. As a return value, the
/// value is moved into a new instance.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Component<T>(pub T);

/// A wrapper that produces an instance navigable by dotted lookups.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Navigable<T>(pub T);

/// A type that can be extracted from a resolved dependency.
pub trait FromInstance: Sized {
    /// Converts the instance resolved for the dependency `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the instance is not of the expected type.
    fn from_instance(name: &str, instance: Instance) -> Result<Self>;
}

impl FromInstance for Instance {
    fn from_instance(_name: &str, instance: Instance) -> Result<Self> {
        Ok(instance)
    }
}

impl<T> FromInstance for Arc<T>
where
    T: Any + Send + Sync,
{
    fn from_instance(name: &str, instance: Instance) -> Result<Self> {
        instance
            .downcast()
            .ok_or_else(|| Error::type_mismatch::<T>(name))
    }
}

impl<T> FromInstance for Component<T>
where
    T: Any + Clone,
{
    fn from_instance(name: &str, instance: Instance) -> Result<Self> {
        instance
            .downcast_ref::<T>()
            .cloned()
            .map(Component)
            .ok_or_else(|| Error::type_mismatch::<T>(name))
    }
}

/// A type that can be turned into a component instance.
pub trait IntoInstance {
    /// Converts `self` into an instance.
    ///
    /// # Errors
    ///
    /// Fallible values propagate their error.
    fn into_instance(self) -> Result<Instance>;
}

impl IntoInstance for Instance {
    fn into_instance(self) -> Result<Instance> {
        Ok(self)
    }
}

impl<T> IntoInstance for Arc<T>
where
    T: Any + Send + Sync,
{
    fn into_instance(self) -> Result<Instance> {
        Ok(Instance::from_arc(self))
    }
}

impl<T> IntoInstance for Component<T>
where
    T: Any + Send + Sync,
{
    fn into_instance(self) -> Result<Instance> {
        Ok(Instance::new(self.0))
    }
}

impl<T> IntoInstance for Navigable<T>
where
    T: Fields + Any + Send + Sync,
{
    fn into_instance(self) -> Result<Instance> {
        Ok(Instance::navigable(self.0))
    }
}

impl<T> IntoInstance for Result<T>
where
    T: IntoInstance,
{
    fn into_instance(self) -> Result<Instance> {
        self?.into_instance()
    }
}
