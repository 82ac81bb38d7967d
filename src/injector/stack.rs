//! The chain of names being resolved by one injector.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use mondi_core::Error;

/// Names currently being resolved by an injector, outermost first.
///
/// Each thread resolving through the injector has its own chain, so that concurrent
/// resolutions of the same name are not mistaken for a cycle. A chain is emptied whenever an
/// error is raised, so that a failed resolution does not leak into the next one.
#[derive(Debug, Default)]
pub(crate) struct ResolutionStack {
    chains: Mutex<HashMap<ThreadId, Vec<String>>>,
}

impl ResolutionStack {
    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<String>>> {
        self.chains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes and returns the chain of the current thread.
    fn take(&self) -> Vec<String> {
        self.lock().remove(&thread::current().id()).unwrap_or_default()
    }

    /// Returns a copy of the chain of the current thread.
    fn current(&self) -> Vec<String> {
        self.lock()
            .get(&thread::current().id())
            .cloned()
            .unwrap_or_default()
    }

    /// Pushes `name`, failing if it is already being resolved by the current thread.
    pub(crate) fn enter(&self, name: &str) -> Result<(), Error> {
        let mut chains = self.lock();
        let id = thread::current().id();
        let names = chains.entry(id).or_default();
        let revisited = names.iter().any(|resolving| resolving == name);
        names.push(name.to_owned());
        if revisited {
            let chain = chains.remove(&id).unwrap_or_default();
            warn!(chain = ?chain, "circular dependency");
            return Err(Error::CircularDependency { chain });
        }
        Ok(())
    }

    pub(crate) fn leave(&self) {
        let mut chains = self.lock();
        let id = thread::current().id();
        if let Some(names) = chains.get_mut(&id) {
            names.pop();
            if names.is_empty() {
                chains.remove(&id);
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.take();
    }

    /// Creates the error for a strict lookup miss of `name`.
    pub(crate) fn no_provider(&self, name: &str) -> Error {
        let mut chain = self.take();
        chain.push(name.to_owned());
        Error::no_provider(name, chain)
    }

    /// Merges the names being resolved here into the chain of a lookup miss raised by the
    /// parent injector.
    ///
    /// The names are prepended, unless `forwarded`: the parent of an encapsulated injector is
    /// the injector forwarding exports to it, whose chain already holds the exported name. The
    /// names resolved here then replace that name in the chain.
    pub(crate) fn prefix(&self, err: Error, forwarded: bool) -> Error {
        let (name, mut chain) = match err {
            Error::NoProvider { name, chain } => (name, chain),
            err => return err,
        };
        let own = self.current();
        let export = own
            .first()
            .filter(|_| forwarded)
            .and_then(|first| chain.iter().position(|resolving| resolving == first));
        match export {
            Some(position) => {
                chain.splice(position..=position, own);
            }
            None => {
                chain.splice(0..0, own);
            }
        }
        Error::NoProvider { name, chain }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
