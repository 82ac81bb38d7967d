//! Child injectors and forced-new scopes.

use std::collections::BTreeSet;

use mondi_core::{Error, Result};

use super::{Injector, Parent};
use crate::module::Module;
use crate::provider::{Provider, ProviderKind};

impl Injector {
    /// Creates a child injector loading `modules`.
    ///
    /// Names the child does not provide itself are resolved by this injector.
    pub fn create_child<I>(&self, modules: I) -> Self
    where
        I: IntoIterator<Item = Module>,
    {
        Self::with_parent(modules.into_iter().collect(), Parent::Strong(self.clone()))
    }

    /// Creates a child injector loading `modules`, in which the components named in
    /// `force_new` are instantiated anew instead of being shared with this injector.
    ///
    /// A name in `force_new` also matches every factory and type provider tagged with it as a
    /// scope (see [`Injectable::with_scope`](crate::Injectable::with_scope)), even if the
    /// provider is registered under another name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownScope`] if a name in `force_new` matches no provider.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondi::instance::Component;
    /// use mondi::{Injectable, Injector, Instance, Module};
    ///
    /// let module = Module::builder()
    ///     .with_factory("request", Injectable::from_fn(|| Component(())))
    ///     .with_factory("pool", Injectable::from_fn(|| Component(())))
    ///     .build();
    /// let injector = Injector::new([module]);
    ///
    /// let child = injector.create_scoped_child([], ["request"])?;
    /// assert!(!Instance::ptr_eq(&child.get("request")?, &injector.get("request")?));
    /// assert!(Instance::ptr_eq(&child.get("pool")?, &injector.get("pool")?));
    ///
    /// assert!(injector.create_scoped_child([], ["unknown"]).unwrap_err().is_unknown_scope());
    /// # Ok::<(), mondi::Error>(())
    /// ```
    pub fn create_scoped_child<I, N>(&self, modules: I, force_new: N) -> Result<Self>
    where
        I: IntoIterator<Item = Module>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        let force_new: Vec<String> = force_new.into_iter().map(Into::into).collect();
        let modules: Vec<Module> = modules.into_iter().collect();
        if force_new.is_empty() {
            return Ok(self.create_child(modules));
        }
        self.scoped_child(modules, &force_new, true)
    }

    /// Creates a scoped child.
    ///
    /// Unless `strict`, only the providers registered on this injector are considered and names
    /// in `force_new` matching none of them are ignored. Encapsulated injectors are scoped this
    /// way, since the providers they inherit are scoped by the injector that exports them.
    fn scoped_child(
        &self,
        mut modules: Vec<Module>,
        force_new: &[String],
        strict: bool,
    ) -> Result<Self> {
        debug!(force_new = ?force_new, "creating scoped child");

        let mut scoped = Module::builder();
        let mut matched = BTreeSet::new();
        // Encapsulated injectors and their scoped children, shared by every name they own.
        let mut private_children: Vec<(Self, Self)> = Vec::new();

        let providers = if strict {
            self.visible_providers()
        } else {
            self.inner.registry.entries().into_iter().collect()
        };

        for (name, provider) in providers {
            if let Some(requested) = force_new.iter().find(|requested| **requested == name) {
                let copy = match &provider {
                    Provider::Private { injector, .. } if Self::ptr_eq(injector, self) => None,
                    Provider::Private {
                        injector: owner,
                        name: owned,
                    } => {
                        let cached = private_children
                            .iter()
                            .find(|(known, _)| Self::ptr_eq(known, owner))
                            .map(|(_, child)| child.clone());
                        let child = match cached {
                            Some(child) => child,
                            None => {
                                let child = owner.scoped_child(Vec::new(), force_new, false)?;
                                private_children.push((owner.clone(), child.clone()));
                                child
                            }
                        };
                        Some(Provider::Private {
                            injector: child,
                            name: owned.clone(),
                        })
                    }
                    provider => Some(provider.clone()),
                };
                if let Some(copy) = copy {
                    scoped = scoped.with_provider(name.clone(), copy);
                    matched.insert(requested.as_str());
                }
            }

            if matches!(provider.kind(), ProviderKind::Factory | ProviderKind::Type) {
                for scope in force_new {
                    if provider.scopes().contains(scope) {
                        trace!(component = %name, scope = %scope, "scope tag matched");
                        scoped = scoped.with_provider(name.clone(), provider.clone());
                        matched.insert(scope.as_str());
                    }
                }
            }
        }

        if strict {
            if let Some(unknown) = force_new
                .iter()
                .find(|requested| !matched.contains(requested.as_str()))
            {
                warn!(scope = %unknown, "unknown scope");
                return Err(Error::unknown_scope(unknown.as_str()));
            }
        }

        modules.insert(0, scoped.build());
        Ok(Self::with_parent(modules, Parent::Strong(self.clone())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mondi_core::{Component, Instance};

    use crate::injectable::Injectable;

    use super::*;

    struct Engine {
        power: u32,
    }

    struct Car {
        engine: Arc<Engine>,
    }

    fn module() -> Module {
        Module::builder()
            .with_value("power", 1184u32)
            .with_factory(
                "engine",
                Injectable::new(["power"], |Component(power): Component<u32>| {
                    Arc::new(Engine { power })
                }),
            )
            .with_type(
                "car",
                Injectable::new(["engine"], |engine: Arc<Engine>| Arc::new(Car { engine })),
            )
            .build()
    }

    fn same(a: &Injector, b: &Injector, name: &str) -> bool {
        Instance::ptr_eq(&a.get(name).unwrap(), &b.get(name).unwrap())
    }

    #[test]
    fn test_child_inherits_parent_singletons() {
        let parent = Injector::new([module()]);
        let child = parent.create_child([]);

        assert!(Injector::ptr_eq(&child.parent().unwrap(), &parent));
        assert!(same(&parent, &child, "car"));
        assert!(same(&parent, &child, "engine"));
    }

    #[test]
    fn test_child_overrides_parent() {
        let parent = Injector::new([module()]);
        let child = parent.create_child([Module::builder().with_value("power", 1u32).build()]);

        assert_eq!(child.resolve::<Component<u32>>("power").unwrap().0, 1);
        // "engine" is inherited, hence resolved by the parent with the parent's power.
        assert_eq!(child.resolve::<Arc<Engine>>("engine").unwrap().power, 1184);
    }

    #[test]
    fn test_force_new_instances() {
        let parent = Injector::new([module()]);
        let parent_car = parent.resolve::<Arc<Car>>("car").unwrap();

        let child = parent.create_scoped_child([], ["car"]).unwrap();
        let child_car = child.resolve::<Arc<Car>>("car").unwrap();

        assert!(!Arc::ptr_eq(&parent_car, &child_car));
        assert!(Arc::ptr_eq(&parent_car.engine, &child_car.engine));
        assert!(same(&parent, &child, "engine"));
        assert!(same(&parent, &child, "power"));

        // Singleton within the child.
        assert!(Arc::ptr_eq(
            &child_car,
            &child.resolve::<Arc<Car>>("car").unwrap()
        ));
    }

    #[test]
    fn test_force_new_dependencies_are_wired_locally() {
        let parent = Injector::new([module()]);
        let child = parent.create_scoped_child([], ["car", "engine"]).unwrap();

        let car = child.resolve::<Arc<Car>>("car").unwrap();
        let engine = child.resolve::<Arc<Engine>>("engine").unwrap();
        assert!(Arc::ptr_eq(&car.engine, &engine));
        assert!(!same(&parent, &child, "engine"));
    }

    #[test]
    fn test_force_new_with_modules() {
        let parent = Injector::new([module()]);
        let child = parent
            .create_scoped_child(
                [Module::builder().with_value("power", 7u32).build()],
                ["engine"],
            )
            .unwrap();
        assert_eq!(child.resolve::<Arc<Engine>>("engine").unwrap().power, 7);
    }

    #[test]
    fn test_unknown_scope() {
        let parent = Injector::new([module()]);
        let err = parent.create_scoped_child([], ["nonexistent"]).unwrap_err();
        assert!(matches!(err, Error::UnknownScope { ref name } if name == "nonexistent"));

        let err = parent
            .create_scoped_child([], ["car", "nonexistent"])
            .unwrap_err();
        assert!(err.is_unknown_scope());
    }

    #[test]
    fn test_empty_force_new_is_plain_child() {
        let parent = Injector::new([module()]);
        let child = parent
            .create_scoped_child([], Vec::<String>::new())
            .unwrap();
        assert!(same(&parent, &child, "car"));
    }

    #[test]
    fn test_scope_tags_propagate() {
        let module = Module::builder()
            .with_factory(
                "session",
                Injectable::from_fn(|| Component(())).with_scope("request"),
            )
            .with_factory(
                "cache",
                Injectable::from_fn(|| Component(())).with_scope("tenant"),
            )
            .with_value("tagless", 1u8)
            .build();
        let parent = Injector::new([module]);

        // No provider is named "request", only tagged with it.
        let child = parent.create_scoped_child([], ["request"]).unwrap();
        assert!(!same(&parent, &child, "session"));
        assert!(same(&parent, &child, "cache"));
        assert!(same(&parent, &child, "tagless"));
    }

    #[test]
    fn test_scope_tags_pull_in_unrequested_names() {
        let module = Module::builder()
            .with_factory("request", Injectable::from_fn(|| Component(())))
            .with_factory(
                "unrelated",
                Injectable::from_fn(|| Component(())).with_scope("request"),
            )
            .build();
        let parent = Injector::new([module]);

        let child = parent.create_scoped_child([], ["request"]).unwrap();
        assert!(!same(&parent, &child, "request"));
        assert!(!same(&parent, &child, "unrelated"));
    }

    #[test]
    fn test_grandchild_forces_root_provider() {
        let root = Injector::new([module()]);
        let child = root.create_child([]);
        let grandchild = child.create_scoped_child([], ["car"]).unwrap();

        assert!(!same(&root, &grandchild, "car"));
        assert!(same(&root, &grandchild, "engine"));
    }

    #[test]
    fn test_child_miss_chain_includes_child_names() {
        let parent = Injector::new([Module::builder()
            .with_type(
                "car",
                Injectable::new(["engine"], |engine: Arc<Engine>| Arc::new(Car { engine })),
            )
            .build()]);
        let child = parent.create_child([Module::builder()
            .with_factory("garage", Injectable::new(["car"], |_: Arc<Car>| Component(())))
            .build()]);

        let err = child.get("garage").unwrap_err();
        assert!(err.is_no_provider_for("engine"));
        assert_eq!(err.chain().unwrap(), ["garage", "car", "engine"]);
    }

    struct Service {
        secret: Instance,
    }

    fn private_module() -> Module {
        Module::builder()
            .with_value("secret", "private")
            .with_factory(
                "service",
                Injectable::new(["secret"], |secret: Instance| Arc::new(Service { secret })),
            )
            .with_export("service")
            .build()
    }

    #[test]
    fn test_private_module_hides_unexported() {
        let injector = Injector::new([private_module()]);
        assert!(injector.has("service"));
        assert!(!injector.has("secret"));
        assert_eq!(injector.provider_kind("service"), Some(ProviderKind::Private));

        let err = injector.get("secret").unwrap_err();
        assert!(err.is_no_provider_for("secret"));

        let service = injector.resolve::<Arc<Service>>("service").unwrap();
        assert_eq!(service.secret.downcast_ref::<&str>(), Some(&"private"));
    }

    #[test]
    fn test_private_module_wins_over_outer_names() {
        let outer = Module::builder().with_value("secret", "public").build();
        let injector = Injector::new([outer, private_module()]);

        assert_eq!(
            injector.get("secret").unwrap().downcast_ref::<&str>(),
            Some(&"public")
        );
        let service = injector.resolve::<Arc<Service>>("service").unwrap();
        assert_eq!(service.secret.downcast_ref::<&str>(), Some(&"private"));
        assert!(Arc::ptr_eq(
            &service,
            &injector.resolve::<Arc<Service>>("service").unwrap()
        ));
    }

    #[test]
    fn test_private_module_resolves_outer_names() {
        let private = Module::builder()
            .with_factory(
                "service",
                Injectable::new(["secret"], |secret: Instance| Arc::new(Service { secret })),
            )
            .with_export("service")
            .build();
        let outer = Module::builder().with_value("secret", "public").build();
        let injector = Injector::new([outer, private]);

        let service = injector.resolve::<Arc<Service>>("service").unwrap();
        assert!(Instance::ptr_eq(
            &service.secret,
            &injector.get("secret").unwrap()
        ));
    }

    #[test]
    fn test_private_miss_chain_names_export_once() {
        let private = Module::builder()
            .with_factory("svc", Injectable::new(["inner"], |_: Instance| Component(())))
            .with_factory("inner", Injectable::new(["x"], |_: Instance| Component(())))
            .with_export("svc")
            .build();
        let outer = Module::builder()
            .with_factory("app", Injectable::new(["svc"], |_: Instance| Component(())))
            .build();
        let injector = Injector::new([private, outer]);

        let err = injector.get("svc").unwrap_err();
        assert!(err.is_no_provider_for("x"));
        assert_eq!(err.chain().unwrap(), ["svc", "inner", "x"]);

        let err = injector.get("app").unwrap_err();
        assert_eq!(err.chain().unwrap(), ["app", "svc", "inner", "x"]);
    }

    struct Holder {
        a: Instance,
    }

    fn exporting_module() -> Module {
        Module::builder()
            .with_factory("a", Injectable::from_fn(|| Component(())))
            .with_factory(
                "b",
                Injectable::new(["a"], |a: Instance| Arc::new(Holder { a })),
            )
            .with_exports(["a", "b"])
            .build()
    }

    #[test]
    fn test_force_new_private_exports_share_scope() {
        let root = Injector::new([exporting_module()]);
        let root_b = root.resolve::<Arc<Holder>>("b").unwrap();

        let child = root.create_scoped_child([], ["a", "b"]).unwrap();
        let child_a = child.get("a").unwrap();
        let child_b = child.resolve::<Arc<Holder>>("b").unwrap();

        assert!(!Instance::ptr_eq(&child_a, &root.get("a").unwrap()));
        assert!(!Arc::ptr_eq(&child_b, &root_b));
        assert!(Instance::ptr_eq(&child_b.a, &child_a));
    }

    #[test]
    fn test_force_new_single_private_export() {
        let root = Injector::new([exporting_module()]);
        let child = root.create_scoped_child([], ["b"]).unwrap();

        let child_b = child.resolve::<Arc<Holder>>("b").unwrap();
        assert!(!Arc::ptr_eq(&child_b, &root.resolve::<Arc<Holder>>("b").unwrap()));
        assert!(Instance::ptr_eq(&child_b.a, &root.get("a").unwrap()));
        assert!(same(&root, &child, "a"));
    }

    #[test]
    fn test_force_new_sibling_private_modules() {
        let other = Module::builder()
            .with_factory("c", Injectable::from_fn(|| Component(())))
            .with_export("c")
            .build();
        let root = Injector::new([exporting_module(), other]);

        let child = root.create_scoped_child([], ["a", "c"]).unwrap();
        assert!(!same(&root, &child, "a"));
        assert!(!same(&root, &child, "c"));
        assert!(same(&root, &child, "b"));
    }
}
