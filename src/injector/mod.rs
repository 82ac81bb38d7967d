//! [`Injector`]: resolves names to singleton instances.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, Weak};

use mondi_core::{Error, FromInstance, Instance, Result};

use crate::injectable::Injectable;
use crate::module::Module;
use crate::provider::{Provider, ProviderKind};

mod compose;
mod registry;
mod scope;
mod stack;

use compose::ModuleInit;
use registry::{InstanceCache, Registry};
use stack::ResolutionStack;

/// The name under which every injector resolves to itself.
pub const INJECTOR: &str = "injector";

/// Separates the segments of a path addressing a field of a component, e.g. `config.db.url`.
pub const PATH_SEPARATOR: char = '.';

/// Instances passed to [`Injector::invoke_with`] that take precedence over registered providers.
pub type Locals = BTreeMap<String, Instance>;

/// A registry of named providers that resolves each name to a singleton instance.
///
/// Each name is resolved at most once per injector, on first request, and the instance is
/// cached for the lifetime of the injector. Names without a provider are delegated to the
/// parent injector, which resolves and caches them on its own: an instance inherited from a
/// parent is shared by all of its children.
///
/// `Injector` is a cheap handle; clones refer to the same injector. It can be shared between
/// threads: the names in flight are tracked per thread, so concurrent resolutions never observe
/// each other as circular dependencies. Two threads missing the cache for the same name at the
/// same time may both run its provider, in which case the first instance cached is returned to
/// both.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use mondi::instance::Component;
/// use mondi::{Injectable, Injector, Module};
///
/// struct Engine {
///     power: u32,
/// }
///
/// struct Car {
///     engine: Arc<Engine>,
/// }
///
/// let module = Module::builder()
///     .with_value("power", 1184u32)
///     .with_factory(
///         "engine",
///         Injectable::new(["power"], |Component(power): Component<u32>| {
///             Arc::new(Engine { power })
///         }),
///     )
///     .with_type(
///         "car",
///         Injectable::new(["engine"], |engine: Arc<Engine>| Arc::new(Car { engine })),
///     )
///     .build();
///
/// let injector = Injector::new([module]);
/// injector.init()?;
///
/// let car = injector.resolve::<Arc<Car>>("car")?;
/// assert_eq!(car.engine.power, 1184);
///
/// // Singletons: the same instance is returned on every request.
/// assert!(Arc::ptr_eq(&car, &injector.resolve::<Arc<Car>>("car")?));
/// # Ok::<(), mondi::Error>(())
/// ```
#[derive(Clone)]
pub struct Injector {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    instances: InstanceCache,
    resolving: ResolutionStack,
    parent: Parent,
    initializers: Mutex<Vec<ModuleInit>>,
    initialized: AtomicBool,
}

enum Parent {
    Root,
    Strong(Injector),
    /// The encapsulated injector of a private module is owned by its parent's providers.
    Weak(Weak<Inner>),
}

/// A builder for [`Injector`].
#[derive(Debug, Default)]
pub struct InjectorBuilder {
    modules: Vec<Module>,
}

impl InjectorBuilder {
    /// Adds a module to the injector.
    #[must_use]
    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Finalizes the building process and returns the built injector.
    ///
    /// The initializers of the modules are not run until [`Injector::init`] is called.
    #[must_use]
    pub fn build(self) -> Injector {
        Injector::new(self.modules)
    }
}

impl Injector {
    /// Creates a root injector loading `modules` and their dependencies.
    pub fn new<I>(modules: I) -> Self
    where
        I: IntoIterator<Item = Module>,
    {
        Self::with_parent(modules.into_iter().collect(), Parent::Root)
    }

    /// Returns a new builder for `Injector`.
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    fn with_parent(modules: Vec<Module>, parent: Parent) -> Self {
        let injector = Self {
            inner: Arc::new(Inner {
                registry: Registry::default(),
                instances: InstanceCache::default(),
                resolving: ResolutionStack::default(),
                parent,
                initializers: Mutex::default(),
                initialized: AtomicBool::new(false),
            }),
        };
        injector.bootstrap(&modules);
        injector
    }

    /// Returns the parent injector, if any.
    pub fn parent(&self) -> Option<Self> {
        match &self.inner.parent {
            Parent::Root => None,
            Parent::Strong(parent) => Some(parent.clone()),
            Parent::Weak(parent) => parent.upgrade().map(|inner| Self { inner }),
        }
    }

    /// Returns `true` if both handles refer to the same injector.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Returns `true` if a provider for `name` is registered on this injector or an ancestor.
    pub fn has(&self, name: &str) -> bool {
        self.provider(name).is_some()
    }

    /// Returns the kind of the provider for `name`, looking up ancestors as well.
    pub fn provider_kind(&self, name: &str) -> Option<ProviderKind> {
        self.provider(name).map(|provider| provider.kind())
    }

    fn provider(&self, name: &str) -> Option<Provider> {
        self.inner
            .registry
            .get(name)
            .or_else(|| self.parent()?.provider(name))
    }

    /// Returns every provider visible from this injector, own providers shadowing inherited ones.
    fn visible_providers(&self) -> BTreeMap<String, Provider> {
        let mut visible = self
            .parent()
            .map(|parent| parent.visible_providers())
            .unwrap_or_default();
        visible.extend(self.inner.registry.entries());
        visible
    }

    /// Resolves `name` to its instance.
    ///
    /// A name containing [`PATH_SEPARATOR`] that is not registered on this injector itself is
    /// resolved by resolving its first segment and then walking the
    /// [`Fields`](crate::instance::Fields) of the instance along the remaining segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProvider`] if no injector in the hierarchy provides `name`,
    /// [`Error::CircularDependency`] if `name` depends on itself, or any error raised while
    /// producing the instance.
    pub fn get(&self, name: &str) -> Result<Instance> {
        self.lookup(name, true)?
            .ok_or_else(|| self.inner.resolving.no_provider(name))
    }

    /// Resolves `name` to its instance, returning `None` if nothing provides it.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is provided but could not be resolved.
    pub fn try_get(&self, name: &str) -> Result<Option<Instance>> {
        self.lookup(name, false)
    }

    /// Resolves `name` and converts its instance to `T`.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get). Additionally returns [`Error::TypeMismatch`] if the instance can
    /// not be converted.
    pub fn resolve<T>(&self, name: &str) -> Result<T>
    where
        T: FromInstance,
    {
        T::from_instance(name, self.get(name)?)
    }

    fn lookup(&self, name: &str, strict: bool) -> Result<Option<Instance>> {
        if name.contains(PATH_SEPARATOR) && !self.inner.registry.contains(name) {
            return self.lookup_path(name, strict);
        }

        if name == INJECTOR {
            return Ok(Some(self.to_instance()));
        }

        if let Some(instance) = self.inner.instances.get(name) {
            trace!(component = name, "cache hit");
            return Ok(Some(instance));
        }

        if let Some(provider) = self.inner.registry.get(name) {
            return self.resolve_own(name, &provider).map(Some);
        }

        match self.parent() {
            Some(parent) => parent
                .lookup(name, strict)
                .map_err(|err| {
                    let forwarded = matches!(self.inner.parent, Parent::Weak(_));
                    self.inner.resolving.prefix(err, forwarded)
                }),
            None if strict => Err(self.inner.resolving.no_provider(name)),
            None => Ok(None),
        }
    }

    fn lookup_path(&self, path: &str, strict: bool) -> Result<Option<Instance>> {
        let Some((head, rest)) = path.split_once(PATH_SEPARATOR) else {
            return self.lookup(path, strict);
        };
        let Some(mut pivot) = self.lookup(head, strict)? else {
            return Ok(None);
        };
        for segment in rest.split(PATH_SEPARATOR) {
            match pivot.field(segment) {
                Some(field) => pivot = field,
                None if strict => return Err(self.inner.resolving.no_provider(path)),
                None => return Ok(None),
            }
        }
        Ok(Some(pivot))
    }

    fn resolve_own(&self, name: &str, provider: &Provider) -> Result<Instance> {
        let resolving = &self.inner.resolving;
        resolving.enter(name)?;
        trace!(component = name, kind = %provider.kind(), "resolving");

        match provider.resolve(self) {
            Ok(instance) => {
                resolving.leave();
                Ok(self.inner.instances.get_or_insert(name, instance))
            }
            Err(err) => {
                resolving.clear();
                Err(err)
            }
        }
    }

    /// Invokes `injectable` with its dependencies resolved from this injector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCallable`] if the dependency names do not fit the callable, an
    /// error if a dependency can not be resolved, or the error returned by the callable.
    pub fn invoke(&self, injectable: &Injectable) -> Result<Instance> {
        self.invoke_with(injectable, None, None)
    }

    /// Invokes `injectable` with an execution context, resolving dependencies from `locals`
    /// first.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub fn invoke_with(
        &self,
        injectable: &Injectable,
        context: Option<&Instance>,
        locals: Option<&Locals>,
    ) -> Result<Instance> {
        injectable.validate()?;
        let args = self.resolve_arguments(injectable.dependencies(), locals)?;
        injectable.call(context, args)
    }

    /// Constructs a new instance from `constructor`, with its dependencies resolved from this
    /// injector.
    ///
    /// Unlike [`get`](Self::get), the result is never cached.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub fn instantiate(&self, constructor: &Injectable) -> Result<Instance> {
        self.instantiate_with(constructor, None)
    }

    /// Constructs a new instance from `constructor`, resolving dependencies from `locals` first.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub fn instantiate_with(
        &self,
        constructor: &Injectable,
        locals: Option<&Locals>,
    ) -> Result<Instance> {
        constructor.validate()?;
        let args = self.resolve_arguments(constructor.dependencies(), locals)?;
        constructor.call(None, args)
    }

    fn resolve_arguments(&self, names: &[String], locals: Option<&Locals>) -> Result<Vec<Instance>> {
        names
            .iter()
            .map(|name| match locals.and_then(|locals| locals.get(name)) {
                Some(local) => Ok(local.clone()),
                None => self.get(name),
            })
            .collect()
    }

    /// Returns this injector as a component instance.
    ///
    /// Every call shares the same allocation.
    fn to_instance(&self) -> Instance {
        Instance::from_arc(Arc::clone(&self.inner))
    }
}

impl FromInstance for Injector {
    fn from_instance(name: &str, instance: Instance) -> Result<Self> {
        instance
            .downcast::<Inner>()
            .map(|inner| Self { inner })
            .ok_or_else(|| Error::type_mismatch::<Self>(name))
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("providers", &self.inner.registry.names())
            .field("instances", &self.inner.instances.len())
            .field("has_parent", &!matches!(self.inner.parent, Parent::Root))
            .finish_non_exhaustive()
    }
}
