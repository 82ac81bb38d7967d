//! Loading modules into an injector and running their initializers.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::PoisonError;

use mondi_core::{Error, Result};

use super::{Injector, Parent};
use crate::module::{Initializer, Module, resolve_dependencies};
use crate::provider::Provider;

/// The initializers of one loaded module.
#[derive(Debug)]
pub(super) struct ModuleInit {
    /// The encapsulated injector of a private module, initialized before the actions run
    /// against it. `None` runs the actions against the loading injector.
    private: Option<Injector>,
    actions: Vec<Initializer>,
}

impl ModuleInit {
    fn run(&self, injector: &Injector) -> Result<()> {
        let target = match &self.private {
            Some(private) => {
                private.init()?;
                private
            }
            None => injector,
        };

        for action in &self.actions {
            let result = match action {
                Initializer::Resolve(name) => {
                    debug!(component = %name, "eagerly resolving");
                    target.get(name)
                }
                Initializer::Invoke(injectable) => target.invoke(injectable),
            };
            result.map_err(Error::initialization)?;
        }

        Ok(())
    }
}

impl Injector {
    /// Loads `modules` and their dependencies in dependency order.
    pub(super) fn bootstrap(&self, modules: &[Module]) {
        let initializers: Vec<ModuleInit> = resolve_dependencies(modules)
            .iter()
            .map(|module| self.load_module(module))
            .collect();

        *self
            .inner
            .initializers
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = initializers;
    }

    fn load_module(&self, module: &Module) -> ModuleInit {
        let Some(exports) = module.exports() else {
            debug!(providers = module.providers().len(), "loading module");
            for (name, provider) in module.providers() {
                self.inner.registry.insert(name.clone(), provider.clone());
            }
            return ModuleInit {
                private: None,
                actions: module.initializers().to_vec(),
            };
        };

        debug!(
            providers = module.providers().len(),
            exports = ?exports,
            "loading private module"
        );

        // The module's own providers are loaded last so that they win over nested modules.
        let mut modules = module.private_modules().to_vec();
        modules.push(module.providers_only());
        let private = Self::with_parent(modules, Parent::Weak(Arc::downgrade(&self.inner)));

        for name in exports {
            self.inner.registry.insert(
                name.clone(),
                Provider::Private {
                    injector: private.clone(),
                    name: name.clone(),
                },
            );
        }

        ModuleInit {
            private: Some(private),
            actions: module.initializers().to_vec(),
        }
    }

    /// Runs the initializers of every loaded module, in load order.
    ///
    /// Only the first call runs the initializers, subsequent calls return immediately, even if
    /// the first one failed. Components without an initializer are still resolved lazily
    /// whether or not this method was called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] wrapping the error of the first failing initializer.
    pub fn init(&self) -> Result<()> {
        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let initializers = std::mem::take(
            &mut *self
                .inner
                .initializers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        debug!(modules = initializers.len(), "initializing");
        for initializer in &initializers {
            if let Err(err) = initializer.run(self) {
                error!(error = %err, "initialization failed");
                return Err(err);
            }
        }

        info!("injector initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mondi_core::Component;

    use crate::injectable::Injectable;

    use super::*;

    /// Returns an injectable recording `label` into `log` when invoked.
    fn record(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Injectable {
        let log = Arc::clone(log);
        let label = label.to_owned();
        Injectable::from_fn(move || {
            log.lock().unwrap().push(label.clone());
            Component(())
        })
    }

    #[test]
    fn test_last_loaded_wins() {
        let first = Module::builder().with_value("x", 1u8).build();
        let second = Module::builder()
            .with_dependency(&first)
            .with_value("x", 2u8)
            .build();

        for modules in [vec![second.clone()], vec![second.clone(), first.clone()]] {
            let injector = Injector::new(modules);
            assert_eq!(injector.get("x").unwrap().downcast_ref::<u8>(), Some(&2));
        }

        let injector = Injector::new([first.clone(), Module::builder().with_value("x", 3u8).build()]);
        assert_eq!(injector.get("x").unwrap().downcast_ref::<u8>(), Some(&3));
    }

    #[test]
    fn test_init_runs_in_dependency_order_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let base = Module::builder()
            .with_initializer(record(&log, "base"))
            .build();
        let app = Module::builder()
            .with_dependency(&base)
            .with_initializer(record(&log, "app"))
            .with_initializer(record(&log, "app-2"))
            .build();

        let injector = Injector::new([app]);
        assert!(log.lock().unwrap().is_empty());

        injector.init().unwrap();
        injector.init().unwrap();
        assert_eq!(*log.lock().unwrap(), ["base", "app", "app-2"]);
    }

    #[test]
    fn test_init_resolves_named_components() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let module = Module::builder()
            .with_factory("eager", record(&log, "eager"))
            .with_factory("lazy", record(&log, "lazy"))
            .with_initializer("eager")
            .build();

        let injector = Injector::new([module]);
        injector.init().unwrap();
        assert_eq!(*log.lock().unwrap(), ["eager"]);

        injector.get("lazy").unwrap();
        assert_eq!(*log.lock().unwrap(), ["eager", "lazy"]);
    }

    #[test]
    fn test_init_failure_is_wrapped() {
        let module = Module::builder().with_initializer("missing").build();
        let injector = Injector::new([module]);

        let err = injector.init().unwrap_err();
        let Error::Initialization { source } = &err else {
            panic!("expected initialization error, got {err:?}");
        };
        assert!(source.is_no_provider_for("missing"));

        // The latch is already set.
        assert!(injector.init().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_init_from_many_tasks_runs_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let module = Module::builder()
            .with_initializer(record(&log, "once"))
            .build();
        let injector = Injector::new([module]);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let injector = injector.clone();
                tokio::spawn(async move { injector.init() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(*log.lock().unwrap(), ["once"]);
    }

    #[test]
    fn test_private_module_initializes_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let nested = Module::builder()
            .with_initializer(record(&log, "nested"))
            .build();
        let private = Module::builder()
            .with_private_module(&nested)
            .with_value("secret", 42u8)
            .with_export("secret")
            .with_initializer(
                Injectable::new(["secret"], |Component(secret): Component<u8>| {
                    Component(secret)
                }),
            )
            .with_initializer(record(&log, "private"))
            .build();
        let outer = Module::builder()
            .with_initializer(record(&log, "outer"))
            .build();

        let injector = Injector::new([private, outer]);
        injector.init().unwrap();
        assert_eq!(*log.lock().unwrap(), ["nested", "private", "outer"]);
    }
}
