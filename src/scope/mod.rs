//! Scopes: the nodes of the lifetime hierarchy.
//!
//! A scope owns a cache of materialized instances and a table of provider
//! links, both keyed by [`Key`]. Lookups that miss locally are delegated to
//! the parent chain; where a freshly created value is cached depends on its
//! provider's [`Lifetime`], not on which scope asked.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, RwLock};

use crate::dynamic::{construct_dynamic, Dynamic, DynamicProvider};
use crate::internal::{held_once, hold_once, in_operation, OnceValue, Operation, StackGuard};
use crate::observer::{Observers, Resolution, ScopeObserver};
use crate::provider::{Link, ProviderLink};
use crate::{downcast, share, DiError, DiResult, Instance, Key, Lifetime, Provider, ScopeConfig, Shared};

mod teardown;

#[cfg(feature = "ahash")]
pub(crate) type KeyMap<V> = IndexMap<Key, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type KeyMap<V> = IndexMap<Key, V>;

/// Self-construction hook supplied by a typed request.
pub(crate) type SelfConstruct<'a> = &'a dyn Fn(&Scope) -> Option<DiResult<Instance>>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
pub(crate) struct ScopeState {
    /// Insertion ordered so teardown can run newest first
    pub(crate) instances: KeyMap<Instance>,
    pub(crate) providers: KeyMap<Arc<dyn Link>>,
}

pub(crate) struct ScopeInner {
    id: u64,
    parent: Option<Scope>,
    config: ScopeConfig,
    pub(crate) state: RwLock<ScopeState>,
    dynamic: RwLock<Option<DynamicProvider>>,
    pub(crate) observers: RwLock<Observers>,
    // Held for a whole `Get` so concurrent requests cannot both construct
    // the same value; reentrant so create callbacks may resolve on the
    // same scope.
    resolving: ReentrantMutex<()>,
}

/// A node in the scope tree.
///
/// `Scope` is a cheap handle: clones refer to the same node. A child keeps
/// its parent alive; parents never reference their children.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::{Provider, Scope};
///
/// #[derive(Clone, Default, Debug, PartialEq)]
/// struct Port(u16);
///
/// let root = Scope::root();
/// root.provide(Provider::forever(|_| Ok(Port(8080))));
///
/// let request = root.spawn();
/// assert_eq!(*request.get::<Port>().unwrap().read(), Port(8080));
///
/// // Forever values are cached where their provider lives
/// assert!(root.has_instance::<Port>());
/// assert!(!request.has_instance::<Port>());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Creates a scope with no parent.
    pub fn root() -> Self {
        Self::root_with_config(ScopeConfig::default())
    }

    pub fn root_with_config(config: ScopeConfig) -> Self {
        Self::with_parent(None, config, Observers::new())
    }

    /// Creates a child of the process-wide root scope.
    pub fn new() -> Self {
        crate::global().spawn()
    }

    /// Creates a child of this scope sharing its configuration and observers.
    pub fn spawn(&self) -> Self {
        self.spawn_with_config(self.inner.config.clone())
    }

    pub fn spawn_with_config(&self, config: ScopeConfig) -> Self {
        let observers = self.inner.observers.read().clone();
        Self::with_parent(Some(self.clone()), config, observers)
    }

    fn with_parent(parent: Option<Scope>, config: ScopeConfig, observers: Observers) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(scope = id, parent = ?parent.as_ref().map(|p| p.id()), "scope created");
        Self {
            inner: Arc::new(ScopeInner {
                id,
                parent,
                config,
                state: RwLock::new(ScopeState::default()),
                dynamic: RwLock::new(None),
                observers: RwLock::new(observers),
                resolving: ReentrantMutex::new(()),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Process-unique identifier, handy in logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.inner.config
    }

    /// True when both handles refer to the same node.
    pub fn same_scope(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ===== Registration =====

    /// Stores a constant on this scope, replacing any cached value of the
    /// same type. Returns the shared cell now held by the scope.
    pub fn set<V>(&self, value: V) -> Shared<V>
    where
        V: Send + Sync + 'static,
    {
        let shared = share(value);
        self.set_shared(shared.clone());
        shared
    }

    /// Stores an existing shared cell so later resolutions hand out that
    /// exact cell.
    pub fn set_shared<V>(&self, shared: Shared<V>)
    where
        V: Send + Sync + 'static,
    {
        self.inner.state.write().instances.insert(Key::of::<V>(), shared);
    }

    /// Erased form of [`set_shared`](Self::set_shared). Fails with
    /// `NotPointer` unless `instance` is the shared cell of `key`'s type.
    ///
    /// ```rust
    /// use scoped_deps::{share, DiError, Instance, Key, Scope};
    ///
    /// let scope = Scope::root();
    /// let ok: Instance = share(1u32);
    /// assert!(scope.set_instance(Key::of::<u32>(), ok).is_ok());
    ///
    /// let wrong: Instance = std::sync::Arc::new(1u32);
    /// assert!(matches!(
    ///     scope.set_instance(Key::of::<u32>(), wrong),
    ///     Err(DiError::NotPointer(_))
    /// ));
    /// ```
    pub fn set_instance(&self, key: Key, instance: Instance) -> DiResult<()> {
        if !key.accepts(&*instance) {
            return Err(DiError::NotPointer(key.name()));
        }
        self.inner.state.write().instances.insert(key, instance);
        Ok(())
    }

    /// Installs a provider for `V` on this scope, replacing any previous
    /// provider for `V` here. Already materialized instances are kept.
    pub fn provide<V>(&self, provider: Provider<V>)
    where
        V: Send + Sync + 'static,
    {
        let key = Key::of::<V>();
        tracing::trace!(scope = self.id(), key = key.name(), lifetime = %provider.lifetime(), "provider registered");
        let link: Arc<dyn Link> = Arc::new(ProviderLink::new(provider));
        self.inner.state.write().providers.insert(key, link);
    }

    /// Installs the scope-level dynamic callback consulted when nothing else
    /// resolves a type. Returning `Ok(None)` means "not mine".
    pub fn set_dynamic<F>(&self, callback: F)
    where
        F: Fn(&Key, &Scope) -> DiResult<Option<Instance>> + Send + Sync + 'static,
    {
        *self.inner.dynamic.write() = Some(Arc::new(callback));
    }

    pub fn clear_dynamic(&self) {
        *self.inner.dynamic.write() = None;
    }

    /// Attaches an observer to this scope and to scopes spawned from it later.
    pub fn add_observer(&self, observer: Arc<dyn ScopeObserver>) {
        self.inner.observers.write().add(observer);
    }

    // ===== Introspection =====

    /// True when an instance of `V` is cached on this scope itself.
    pub fn has_instance<V: Send + Sync + 'static>(&self) -> bool {
        self.inner.state.read().instances.contains_key(&Key::of::<V>())
    }

    /// True when this scope itself registers a provider for `V`.
    pub fn has_provider<V: Send + Sync + 'static>(&self) -> bool {
        self.inner.state.read().providers.contains_key(&Key::of::<V>())
    }

    /// True when `V` is cached or provided anywhere up the parent chain.
    /// Dynamic fallbacks are not consulted.
    pub fn contains<V: Send + Sync + 'static>(&self) -> bool {
        let key = Key::of::<V>();
        let mut scope = Some(self);
        while let Some(current) = scope {
            let state = current.inner.state.read();
            if state.instances.contains_key(&key) || state.providers.contains_key(&key) {
                return true;
            }
            scope = current.parent();
        }
        false
    }

    /// Number of instances cached on this scope.
    pub fn instance_count(&self) -> usize {
        self.inner.state.read().instances.len()
    }

    // ===== Resolution =====

    /// Returns the value mapped to `V`, creating it if a provider exists.
    ///
    /// The returned cell is the cached one, so repeated calls hand out the
    /// same `Arc` until the owning scope frees it.
    pub fn get<V>(&self) -> DiResult<Shared<V>>
    where
        V: Send + Sync + 'static,
    {
        let key = Key::of::<V>();
        let instance = self.resolve(&key)?;
        downcast::<V>(instance).ok_or(DiError::NoProvider(key.name()))
    }

    /// Like [`get`](Self::get), but a type implementing [`Dynamic`] can
    /// construct itself when nothing else resolves it.
    pub fn get_dynamic<V>(&self) -> DiResult<Shared<V>>
    where
        V: Dynamic,
    {
        let key = Key::of::<V>();
        let construct =
            |scope: &Scope| Some(construct_dynamic::<V>(scope).map(|value| share(value) as Instance));
        let instance = self.resolve_with(&key, Some(&construct))?;
        downcast::<V>(instance).ok_or(DiError::NoProvider(key.name()))
    }

    /// Erased resolution by key.
    pub fn resolve(&self, key: &Key) -> DiResult<Instance> {
        self.resolve_with(key, None)
    }

    pub(crate) fn resolve_with(&self, key: &Key, construct: Option<SelfConstruct<'_>>) -> DiResult<Instance> {
        let observers = self.inner.observers.read().clone();
        if !observers.has_observers() {
            return self.resolve_in_chain(key, construct).map(|(instance, _)| instance);
        }

        observers.resolving(key);
        let started = Instant::now();
        match self.resolve_in_chain(key, construct) {
            Ok((instance, resolution)) => {
                observers.resolved(key, resolution, started.elapsed());
                Ok(instance)
            }
            Err(err) => {
                observers.failed(key, &err);
                Err(err)
            }
        }
    }

    fn resolve_in_chain(
        &self,
        key: &Key,
        construct: Option<SelfConstruct<'_>>,
    ) -> DiResult<(Instance, Resolution)> {
        let _lock = self.inner.resolving.lock();
        let _frame = StackGuard::enter(self.inner.id, *key, &self.inner.config)?;

        let link = self.find_link_with_owner(key);
        let operating = in_operation();

        if operating {
            if let Some(instance) = held_once(self.inner.id, key) {
                tracing::trace!(scope = self.id(), key = key.name(), "once value reused");
                return Ok((instance, Resolution::Cached));
            }
        }

        // Inside an operation a Once type never comes from the shared cache:
        // that value belongs to no operation, or to someone else's.
        let once_linked = matches!(&link, Some((link, _)) if link.lifetime() == Lifetime::Once);
        if !(operating && once_linked) {
            if let Some(instance) = self.cached(key) {
                tracing::trace!(scope = self.id(), key = key.name(), "cache hit");
                return Ok((instance, Resolution::Cached));
            }
        }

        // Scope-lifetime values live where they are asked for, wherever the
        // provider is declared.
        if let Some((link, owned_here)) = link {
            if link.lifetime() == Lifetime::Scope || owned_here {
                let lifetime = link.lifetime();
                let instance = self.materialize(key, &link)?;
                return Ok((instance, Resolution::Created(lifetime)));
            }
        }

        if let Some(parent) = &self.inner.parent {
            match parent.resolve_in_chain(key, construct) {
                Err(err) if err.is_no_provider() => {}
                outcome => return outcome,
            }
        }

        self.fallback(key, construct)
    }

    fn fallback(&self, key: &Key, construct: Option<SelfConstruct<'_>>) -> DiResult<(Instance, Resolution)> {
        if let Some(construct) = construct {
            if let Some(outcome) = construct(self) {
                return outcome.map(|instance| (instance, Resolution::SelfConstructed));
            }
        }

        let dynamic = self.inner.dynamic.read().clone();
        if let Some(dynamic) = dynamic {
            match dynamic(key, self)? {
                Some(instance) if key.accepts(&*instance) => {
                    return Ok((instance, Resolution::Dynamic));
                }
                Some(_) => {
                    tracing::warn!(
                        scope = self.id(),
                        key = key.name(),
                        "dynamic provider returned a value of another type, ignoring it"
                    );
                }
                None => {}
            }
        }

        Err(DiError::NoProvider(key.name()))
    }

    /// Runs `op` as one hydrate/invoke operation: every `Once` value it
    /// materializes, on any scope, is freed when it returns.
    pub(crate) fn run_operation<R, F>(&self, op: F) -> DiResult<R>
    where
        F: FnOnce() -> DiResult<R>,
    {
        let operation = Operation::begin();
        let outcome = op();
        let teardown = Scope::release_ledger(operation.finish());

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(teardown)) => {
                tracing::warn!(scope = self.id(), error = %teardown, "once teardown failed after an earlier error");
                Err(err)
            }
        }
    }

    /// Creates a value through `link` and caches it on this scope. A `Once`
    /// value created during an operation is held by that operation instead.
    fn materialize(&self, key: &Key, link: &Arc<dyn Link>) -> DiResult<Instance> {
        let instance = link.create(self)?;
        tracing::debug!(scope = self.id(), key = key.name(), lifetime = %link.lifetime(), "materialized");

        if link.lifetime() == Lifetime::Once {
            let held = OnceValue {
                scope: self.clone(),
                key: *key,
                instance: instance.clone(),
                link: link.clone(),
            };
            if hold_once(held).is_ok() {
                return Ok(instance);
            }
        }

        self.inner.state.write().instances.insert(*key, instance.clone());
        Ok(instance)
    }

    fn cached(&self, key: &Key) -> Option<Instance> {
        self.inner.state.read().instances.get(key).cloned()
    }

    /// Nearest provider link for `key` on this scope or an ancestor.
    pub(crate) fn find_link(&self, key: &Key) -> Option<Arc<dyn Link>> {
        self.find_link_with_owner(key).map(|(link, _)| link)
    }

    fn find_link_with_owner(&self, key: &Key) -> Option<(Arc<dyn Link>, bool)> {
        let mut scope = Some(self);
        let mut owned_here = true;
        while let Some(current) = scope {
            if let Some(link) = current.inner.state.read().providers.get(key) {
                return Some((link.clone(), owned_here));
            }
            owned_here = false;
            scope = current.parent();
        }
        None
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.id()))
            .field("instances", &state.instances.keys().collect::<Vec<_>>())
            .field("providers", &state.providers.keys().collect::<Vec<_>>())
            .field("observers", &self.inner.observers.read().len())
            .finish()
    }
}
