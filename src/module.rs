//! Declarative module descriptions and their load order.

use std::any::Any;
use std::sync::Arc;

use mondi_core::Instance;

use crate::injectable::Injectable;
use crate::provider::Provider;

/// An action run once per injector after all providers are registered.
#[derive(Debug, Clone)]
pub enum Initializer {
    /// Eagerly resolves the named component.
    Resolve(String),
    /// Invokes the injectable with its dependencies.
    Invoke(Injectable),
}

impl From<&str> for Initializer {
    fn from(name: &str) -> Self {
        Self::Resolve(name.to_owned())
    }
}

impl From<String> for Initializer {
    fn from(name: String) -> Self {
        Self::Resolve(name)
    }
}

impl From<Injectable> for Initializer {
    fn from(injectable: Injectable) -> Self {
        Self::Invoke(injectable)
    }
}

/// A declarative description of named providers.
///
/// Modules are cheap to clone and are compared by identity: two clones of the same module are
/// loaded once, while two modules built separately with equal contents are loaded twice.
///
/// A module that exports names is *private*: its providers live in an encapsulated injector and
/// only the exported names are visible from the injector loading it.
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
/// let engine = Module::builder()
///     .with_value("power", 1184u32)
///     .with_factory(
///         "engine",
///         Injectable::new(["power"], |Component(power): Component<u32>| {
///             Arc::new(Engine { power })
///         }),
///     )
///     .with_export("engine")
///     .build();
///
/// let injector = Injector::new([engine]);
/// assert_eq!(injector.resolve::<Arc<Engine>>("engine")?.power, 1184);
/// assert!(injector.get("power").unwrap_err().is_no_provider());
/// # Ok::<(), mondi::Error>(())
/// ```
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

#[derive(Default)]
struct ModuleInner {
    providers: Vec<(String, Provider)>,
    dependencies: Vec<Module>,
    initializers: Vec<Initializer>,
    exports: Option<Vec<String>>,
    private_modules: Vec<Module>,
}

/// A builder for [`Module`].
#[derive(Default)]
pub struct ModuleBuilder {
    inner: ModuleInner,
}

impl Module {
    /// Returns a new builder for `Module`.
    #[must_use]
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::default()
    }

    /// Returns the providers declared by the module, in declaration order.
    pub fn providers(&self) -> &[(String, Provider)] {
        &self.inner.providers
    }

    /// Returns the modules loaded before this one.
    pub fn dependencies(&self) -> &[Self] {
        &self.inner.dependencies
    }

    pub fn initializers(&self) -> &[Initializer] {
        &self.inner.initializers
    }

    /// Returns the exported names if the module is private.
    pub fn exports(&self) -> Option<&[String]> {
        self.inner.exports.as_deref()
    }

    /// Returns the modules composed inside the private scope of this module.
    pub fn private_modules(&self) -> &[Self] {
        &self.inner.private_modules
    }

    pub fn is_private(&self) -> bool {
        self.inner.exports.is_some()
    }

    /// Returns `true` if both handles refer to the same module.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Returns a module with the providers of `self` only.
    pub(crate) fn providers_only(&self) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                providers: self.inner.providers.clone(),
                ..ModuleInner::default()
            }),
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers().iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("Module")
            .field("providers", &names)
            .field("dependencies", &self.inner.dependencies.len())
            .field("exports", &self.inner.exports)
            .finish_non_exhaustive()
    }
}

impl ModuleBuilder {
    /// Registers a provider, replacing any provider previously declared under the same name.
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, provider: Provider) -> Self {
        let name = name.into();
        let providers = &mut self.inner.providers;
        match providers.iter_mut().find(|(declared, _)| *declared == name) {
            Some((_, slot)) => *slot = provider,
            None => providers.push((name, provider)),
        }
        self
    }

    /// Registers a value returned as-is.
    #[must_use]
    pub fn with_value<T>(self, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.with_instance(name, Instance::new(value))
    }

    /// Registers an already created instance returned as-is.
    #[must_use]
    pub fn with_instance(self, name: impl Into<String>, instance: Instance) -> Self {
        self.with_provider(name, Provider::Value(instance))
    }

    /// Registers a factory whose return value is the instance.
    #[must_use]
    pub fn with_factory(self, name: impl Into<String>, factory: Injectable) -> Self {
        self.with_provider(name, Provider::Factory(factory))
    }

    /// Registers a constructor instantiated with its dependencies.
    #[must_use]
    pub fn with_type(self, name: impl Into<String>, constructor: Injectable) -> Self {
        self.with_provider(name, Provider::Type(constructor))
    }

    /// Declares a module to be loaded before this one.
    #[must_use]
    pub fn with_dependency(mut self, module: &Module) -> Self {
        self.inner.dependencies.push(module.clone());
        self
    }

    /// Declares an initializer, either a component name to resolve eagerly or an
    /// [`Injectable`] to invoke.
    #[must_use]
    pub fn with_initializer(mut self, initializer: impl Into<Initializer>) -> Self {
        self.inner.initializers.push(initializer.into());
        self
    }

    /// Exports a name, making the module private.
    #[must_use]
    pub fn with_export(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let exports = self.inner.exports.get_or_insert_with(Vec::new);
        if !exports.contains(&name) {
            exports.push(name);
        }
        self
    }

    /// Exports several names, making the module private.
    #[must_use]
    pub fn with_exports<N>(self, names: N) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
    {
        names.into_iter().fold(self, Self::with_export)
    }

    /// Declares a module composed inside the private scope of this module.
    ///
    /// Providers of this module take precedence over the ones of its private modules.
    #[must_use]
    pub fn with_private_module(mut self, module: &Module) -> Self {
        self.inner.private_modules.push(module.clone());
        self
    }

    /// Finalizes the building process and returns the built module.
    #[must_use]
    pub fn build(self) -> Module {
        Module {
            inner: Arc::new(self.inner),
        }
    }
}

/// Flattens modules and their transitive dependencies into a load order.
///
/// Dependencies always come before the modules depending on them, and each module appears once,
/// at the position where it was first required.
pub fn resolve_dependencies<'a, I>(modules: I) -> Vec<Module>
where
    I: IntoIterator<Item = &'a Module>,
{
    let mut order = Vec::new();
    for module in modules {
        visit(module, &mut order);
    }
    order
}

fn visit(module: &Module, order: &mut Vec<Module>) {
    let loaded = |order: &[Module]| order.iter().any(|other| Module::ptr_eq(other, module));
    if loaded(order.as_slice()) {
        return;
    }
    for dependency in module.dependencies() {
        visit(dependency, order);
    }
    if !loaded(order.as_slice()) {
        order.push(module.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(order: &[Module], modules: &[&Module]) -> Vec<usize> {
        modules
            .iter()
            .map(|module| {
                order
                    .iter()
                    .position(|other| Module::ptr_eq(other, module))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let a = Module::builder().build();
        let b = Module::builder().with_dependency(&a).build();
        let c = Module::builder().with_dependency(&b).build();

        let order = resolve_dependencies([&c]);
        assert_eq!(order.len(), 3);
        assert_eq!(positions(&order, &[&a, &b, &c]), [0, 1, 2]);
    }

    #[test]
    fn test_diamond_is_loaded_once() {
        let base = Module::builder().build();
        let left = Module::builder().with_dependency(&base).build();
        let right = Module::builder().with_dependency(&base).build();
        let top = Module::builder()
            .with_dependency(&left)
            .with_dependency(&right)
            .build();

        let order = resolve_dependencies([&top, &base, &left]);
        assert_eq!(order.len(), 4);
        assert_eq!(positions(&order, &[&base, &left, &right, &top]), [0, 1, 2, 3]);
    }

    #[test]
    fn test_identity_not_equality() {
        let a = Module::builder().with_value("x", 1u8).build();
        let b = Module::builder().with_value("x", 1u8).build();
        assert_eq!(resolve_dependencies([&a, &b, &a.clone()]).len(), 2);
    }

    #[test]
    fn test_redeclared_provider_is_replaced_in_place() {
        let module = Module::builder()
            .with_value("a", 1u8)
            .with_value("b", 2u8)
            .with_value("a", 3u8)
            .build();
        let names: Vec<&str> = module.providers().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        let Provider::Value(a) = &module.providers()[0].1 else {
            panic!("expected value provider");
        };
        assert_eq!(a.downcast_ref::<u8>(), Some(&3));
    }

    #[test]
    fn test_exports_make_module_private() {
        let public = Module::builder().with_value("a", 1u8).build();
        assert!(!public.is_private());
        assert!(public.exports().is_none());

        let private = Module::builder()
            .with_exports(["a", "b", "a"])
            .with_initializer("a")
            .build();
        assert!(private.is_private());
        assert_eq!(private.exports().unwrap(), ["a", "b"]);

        let stripped = private.providers_only();
        assert!(!stripped.is_private());
        assert!(stripped.initializers().is_empty());
    }
}
