//! Releasing cached instances through their provider links.

use std::sync::Arc;

use super::Scope;
use crate::provider::Link;
use crate::internal::OnceValue;
use crate::{DiResult, Instance, Key, Lifetime, MultiError};

impl Scope {
    /// Releases every instance cached on this scope.
    ///
    /// Instances are visited newest first. Each one is removed from the cache
    /// and, when a provider link for its type exists here or on an ancestor,
    /// handed to that link's free hook. Constants without a link are simply
    /// dropped. Every instance is attempted; failures are collected into one
    /// [`MultiError`].
    ///
    /// ```rust
    /// use scoped_deps::{DiError, Provider, Scope};
    ///
    /// struct A;
    /// struct B;
    ///
    /// let scope = Scope::root();
    /// scope.provide(Provider::scoped(|_| Ok(A)).on_free(|_, _| Err(DiError::msg("a failed"))));
    /// scope.provide(Provider::scoped(|_| Ok(B)).on_free(|_, _| Ok(())));
    /// scope.get::<A>().unwrap();
    /// scope.get::<B>().unwrap();
    ///
    /// let err = scope.free().unwrap_err();
    /// assert_eq!(err.to_string(), "a failed");
    /// assert_eq!(scope.instance_count(), 0);
    /// ```
    pub fn free(&self) -> DiResult<()> {
        self.release_where(|_| true)
    }

    /// Releases only the instances whose provider link has a `Once` lifetime.
    ///
    /// Constants and values of other lifetimes stay cached.
    pub fn free_once(&self) -> DiResult<()> {
        self.release_where(|lifetime| matches!(lifetime, Some(Lifetime::Once)))
    }

    fn release_where<F>(&self, select: F) -> DiResult<()>
    where
        F: Fn(Option<Lifetime>) -> bool,
    {
        let _lock = self.inner.resolving.lock();
        let keys: Vec<Key> = self.inner.state.read().instances.keys().rev().copied().collect();

        let mut errors = MultiError::new();
        for key in keys {
            let link = self.find_link(&key);
            if !select(link.as_ref().map(|l| l.lifetime())) {
                continue;
            }
            if let Err(err) = self.release_key(&key, link) {
                errors.push(err);
            }
        }

        if !errors.is_empty() {
            tracing::warn!(scope = self.id(), failures = errors.len(), "teardown finished with errors");
        }
        errors.into_result()
    }

    /// Frees the `Once` values an operation held, newest first.
    pub(crate) fn release_ledger(ledger: Vec<OnceValue>) -> DiResult<()> {
        let mut errors = MultiError::new();
        for held in ledger.into_iter().rev() {
            let OnceValue { scope, key, instance, link } = held;
            let _lock = scope.inner.resolving.lock();
            let outcome = link.free(&scope, instance);
            if let Err(err) = scope.report_release(&key, Some(Lifetime::Once), outcome) {
                errors.push(err);
            }
        }
        errors.into_result()
    }

    fn release_key(&self, key: &Key, link: Option<Arc<dyn Link>>) -> DiResult<()> {
        // Removed before the hook runs so a hook resolving the same type
        // cannot observe the value being torn down.
        let instance: Instance = match self.inner.state.write().instances.shift_remove(key) {
            Some(instance) => instance,
            None => return Ok(()),
        };

        let lifetime = link.as_ref().map(|l| l.lifetime());
        let outcome = match link {
            Some(link) => link.free(self, instance),
            None => {
                drop(instance);
                Ok(())
            }
        };
        self.report_release(key, lifetime, outcome)
    }

    fn report_release(&self, key: &Key, lifetime: Option<Lifetime>, outcome: DiResult<()>) -> DiResult<()> {
        match &outcome {
            Ok(()) => tracing::debug!(scope = self.id(), key = key.name(), "freed"),
            Err(err) => tracing::debug!(scope = self.id(), key = key.name(), error = %err, "free failed"),
        }
        let observers = self.inner.observers.read().clone();
        if observers.has_observers() {
            observers.freed(key, lifetime, outcome.as_ref().map(|_| ()));
        }
        outcome
    }
}
