//! Provider records describing how a type is created, observed and freed.
//!
//! A [`Provider`] is the strongly typed registration record. Registering it
//! on a scope erases it into a link so providers of unrelated types can live
//! in one table keyed by [`Key`](crate::Key).

use std::fmt;
use std::sync::Arc;

use crate::{DiResult, Lifetime, Scope};

mod link;

pub(crate) use link::{Link, ProviderLink};

/// Construction callback of a provider.
pub type CreateFn<V> = Arc<dyn Fn(&Scope) -> DiResult<V> + Send + Sync>;

/// Notification or teardown callback of a provider.
pub type HookFn<V> = Arc<dyn Fn(&Scope, &mut V) -> DiResult<()> + Send + Sync>;

/// Typed description of how to create, notify-after-use and free a value.
///
/// Values are created lazily on first resolution and cached according to
/// the provider's [`Lifetime`]. Re-registering a provider for the same type
/// on the same scope replaces the previous one without touching instances
/// it already created.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::{DiError, Provider, Scope};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Clone, Default)]
/// struct Connection { open: bool }
///
/// let closed = Arc::new(Mutex::new(0));
/// let closed_hook = closed.clone();
///
/// let scope = Scope::root();
/// scope.provide(
///     Provider::scoped(|_| Ok(Connection { open: true }))
///         .on_free(move |_, conn| {
///             conn.open = false;
///             *closed_hook.lock().unwrap() += 1;
///             Ok(())
///         }),
/// );
///
/// assert!(scope.get::<Connection>().unwrap().read().open);
/// scope.free().unwrap();
/// assert_eq!(*closed.lock().unwrap(), 1);
///
/// // A provider without a create function cannot materialize anything
/// #[derive(Clone, Default)]
/// struct Orphan;
/// scope.provide(Provider::<Orphan>::new(scoped_deps::Lifetime::Forever));
/// assert!(matches!(scope.get::<Orphan>(), Err(DiError::MissingCreate(_))));
/// ```
pub struct Provider<V> {
    pub(crate) lifetime: Lifetime,
    pub(crate) create: Option<CreateFn<V>>,
    pub(crate) after_pointer_use: Option<HookFn<V>>,
    pub(crate) free: Option<HookFn<V>>,
}

impl<V> Provider<V>
where
    V: Send + Sync + 'static,
{
    /// Creates a provider with the given lifetime and no callbacks.
    pub fn new(lifetime: Lifetime) -> Self {
        Self {
            lifetime,
            create: None,
            after_pointer_use: None,
            free: None,
        }
    }

    /// Provider whose value is cached on the scope that registered it.
    pub fn forever<F>(create: F) -> Self
    where
        F: Fn(&Scope) -> DiResult<V> + Send + Sync + 'static,
    {
        Self::new(Lifetime::Forever).create(create)
    }

    /// Provider whose value is cached on each requesting scope.
    pub fn scoped<F>(create: F) -> Self
    where
        F: Fn(&Scope) -> DiResult<V> + Send + Sync + 'static,
    {
        Self::new(Lifetime::Scope).create(create)
    }

    /// Provider whose value lives for one hydrate or invoke operation.
    pub fn once<F>(create: F) -> Self
    where
        F: Fn(&Scope) -> DiResult<V> + Send + Sync + 'static,
    {
        Self::new(Lifetime::Once).create(create)
    }

    /// Sets the construction callback.
    pub fn create<F>(mut self, create: F) -> Self
    where
        F: Fn(&Scope) -> DiResult<V> + Send + Sync + 'static,
    {
        self.create = Some(Arc::new(create));
        self
    }

    /// Called after an invocation that received the value by mutable
    /// reference.
    ///
    /// The value's cell is write-locked while the hook runs. The hook may
    /// resolve other types through the scope, but must not lock its own
    /// value's cell again (for example through `scope.get::<V>()`): that
    /// deadlocks. Use the `&mut V` it is given instead.
    pub fn after_pointer_use<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope, &mut V) -> DiResult<()> + Send + Sync + 'static,
    {
        self.after_pointer_use = Some(Arc::new(hook));
        self
    }

    /// Called when the value is released by `free`, `free_once` or the end
    /// of a `Once` operation.
    pub fn on_free<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope, &mut V) -> DiResult<()> + Send + Sync + 'static,
    {
        self.free = Some(Arc::new(hook));
        self
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn has_create(&self) -> bool {
        self.create.is_some()
    }
}

impl<V> Clone for Provider<V> {
    fn clone(&self) -> Self {
        Self {
            lifetime: self.lifetime,
            create: self.create.clone(),
            after_pointer_use: self.after_pointer_use.clone(),
            free: self.free.clone(),
        }
    }
}

impl<V> fmt::Debug for Provider<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("type", &std::any::type_name::<V>())
            .field("lifetime", &self.lifetime)
            .field("create", &self.create.is_some())
            .field("after_pointer_use", &self.after_pointer_use.is_some())
            .field("free", &self.free.is_some())
            .finish()
    }
}
