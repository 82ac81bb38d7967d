//! Dependency injection container resolving named components to singleton instances.
//!
//! Components are described by [`Module`]s, which register providers under names and declare
//! the names each provider depends on. An [`Injector`] loads modules, resolves a name on first
//! request by resolving its dependencies first, and caches the instance for its own lifetime.
//! Injectors form a hierarchy: a child created by [`Injector::create_child`] delegates the names
//! it does not provide to its parent, while [`Injector::create_scoped_child`] re-instantiates
//! selected components in the child instead.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use mondi::instance::Component;
//! use mondi::{Injectable, Injector, Module};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct Users {
//!     db: Arc<Database>,
//! }
//!
//! let storage = Module::builder()
//!     .with_value("url", String::from("postgres://localhost"))
//!     .with_factory(
//!         "db",
//!         Injectable::new(["url"], |url: Arc<String>| {
//!             Arc::new(Database { url: url.to_string() })
//!         }),
//!     )
//!     .build();
//!
//! let users = Module::builder()
//!     .with_dependency(&storage)
//!     .with_type(
//!         "users",
//!         Injectable::new(["db"], |db: Arc<Database>| Arc::new(Users { db })),
//!     )
//!     .build();
//!
//! let injector = Injector::new([users]);
//! injector.init()?;
//!
//! let users = injector.resolve::<Arc<Users>>("users")?;
//! assert_eq!(users.db.url, "postgres://localhost");
//!
//! let request = injector.create_scoped_child([], ["users"])?;
//! let scoped = request.resolve::<Arc<Users>>("users")?;
//! assert!(!Arc::ptr_eq(&users, &scoped));
//! assert!(Arc::ptr_eq(&users.db, &scoped.db));
//! # Ok::<(), mondi::Error>(())
//! ```
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
pub(crate) mod macros;

pub mod injectable;
pub mod injector;
pub mod module;
pub mod provider;

pub use mondi_core::{error, instance};

pub use mondi_core::{
    Component, Error, Fields, FromInstance, Instance, IntoInstance, Navigable, Result,
};

pub use injectable::{Args, Call, Callable, Construct, Injectable};
pub use injector::{INJECTOR, Injector, InjectorBuilder, Locals, PATH_SEPARATOR};
pub use module::{Initializer, Module, ModuleBuilder, resolve_dependencies};
pub use provider::{Provider, ProviderKind};
