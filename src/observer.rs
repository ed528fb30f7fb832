//! Diagnostic observers for resolution and teardown events.
//!
//! Observers are attached to a scope and inherited by the scopes spawned
//! from it afterwards. Calls are synchronous on the resolving thread, so
//! implementations should stay cheap.

use std::sync::Arc;
use std::time::Duration;

use crate::{DiError, Key, Lifetime};

/// How a resolution was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An instance already cached in the scope chain
    Cached,
    /// Freshly created by a provider with the given lifetime
    Created(Lifetime),
    /// Built by the requested type's own self-construction capability
    SelfConstructed,
    /// Synthesized by a scope's dynamic callback
    Dynamic,
}

/// Observer trait for registry events.
///
/// Every method has an empty default so observers only implement the events
/// they care about.
///
/// # Examples
///
/// ```
/// use scoped_deps::{Key, Resolution, Scope, ScopeObserver};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<String>>);
///
/// impl ScopeObserver for Recorder {
///     fn resolved(&self, key: &Key, resolution: Resolution, _elapsed: Duration) {
///         self.0.lock().unwrap().push(format!("{} {:?}", key.name(), resolution));
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let scope = Scope::root();
/// scope.add_observer(recorder.clone());
/// scope.set(7u8);
/// scope.get::<u8>().unwrap();
/// assert_eq!(recorder.0.lock().unwrap().as_slice(), ["u8 Cached"]);
/// ```
pub trait ScopeObserver: Send + Sync {
    /// A resolution is starting.
    fn resolving(&self, _key: &Key) {}

    /// A resolution succeeded.
    fn resolved(&self, _key: &Key, _resolution: Resolution, _elapsed: Duration) {}

    /// A resolution failed (including `NoProvider`).
    fn failed(&self, _key: &Key, _error: &DiError) {}

    /// A cached instance was released. `lifetime` is `None` for values with
    /// no provider link (constants).
    fn freed(&self, _key: &Key, _lifetime: Option<Lifetime>, _outcome: Result<(), &DiError>) {}
}

/// Observer that forwards every event to `tracing`.
///
/// ```
/// use scoped_deps::{Scope, TracingObserver};
/// use std::sync::Arc;
///
/// let scope = Scope::root();
/// scope.add_observer(Arc::new(TracingObserver::new()));
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    target: &'static str,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self { target: "scoped_deps" }
    }

    /// Label attached to every event as the `observer` field.
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeObserver for TracingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(observer = self.target, key = key.name(), "resolving");
    }

    fn resolved(&self, key: &Key, resolution: Resolution, elapsed: Duration) {
        tracing::debug!(
            observer = self.target,
            key = key.name(),
            ?resolution,
            elapsed_us = elapsed.as_micros() as u64,
            "resolved"
        );
    }

    fn failed(&self, key: &Key, error: &DiError) {
        if error.is_no_provider() {
            tracing::trace!(observer = self.target, key = key.name(), "no provider");
        } else {
            tracing::warn!(observer = self.target, key = key.name(), %error, "resolution failed");
        }
    }

    fn freed(&self, key: &Key, lifetime: Option<Lifetime>, outcome: Result<(), &DiError>) {
        match outcome {
            Ok(()) => tracing::debug!(
                observer = self.target,
                key = key.name(),
                lifetime = lifetime.map(|l| l.as_str()).unwrap_or("constant"),
                "freed"
            ),
            Err(error) => tracing::warn!(
                observer = self.target,
                key = key.name(),
                %error,
                "free failed"
            ),
        }
    }
}

/// Collection of observers attached to one scope.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ScopeObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ScopeObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, resolution: Resolution, elapsed: Duration) {
        for observer in &self.observers {
            observer.resolved(key, resolution, elapsed);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.failed(key, error);
        }
    }

    #[inline]
    pub(crate) fn freed(&self, key: &Key, lifetime: Option<Lifetime>, outcome: Result<(), &DiError>) {
        for observer in &self.observers {
            observer.freed(key, lifetime, outcome);
        }
    }
}
