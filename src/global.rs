//! The process-wide root scope.
//!
//! The root is created on first use and lives for the rest of the process.
//! Nothing frees it implicitly: hosts that need deterministic teardown call
//! `global().free()` themselves. [`Scope::new`] spawns children of it.

use once_cell::sync::Lazy;

use crate::{DiResult, Hydrate, Invocable, ParamList, Provider, Results, Scope, Shared};

static GLOBAL: Lazy<Scope> = Lazy::new(|| {
    tracing::debug!("global scope initialized");
    Scope::root()
});

/// Returns the process-wide root scope.
///
/// ```rust
/// use scoped_deps::{global, Scope};
///
/// let child = Scope::new();
/// assert!(child.parent().unwrap().same_scope(global()));
/// assert!(global().is_root());
/// ```
pub fn global() -> &'static Scope {
    &GLOBAL
}

/// Sets a constant on the global scope.
pub fn set<V: Send + Sync + 'static>(value: V) -> Shared<V> {
    global().set(value)
}

pub fn set_shared<V: Send + Sync + 'static>(shared: Shared<V>) {
    global().set_shared(shared)
}

/// Resolves `V` from the global scope.
pub fn get<V: Send + Sync + 'static>() -> DiResult<Shared<V>> {
    global().get::<V>()
}

/// Registers a provider on the global scope.
pub fn provide<V: Send + Sync + 'static>(provider: Provider<V>) {
    global().provide(provider)
}

/// Invokes `f` against the global scope.
pub fn invoke<Args, F>(f: F) -> DiResult<Results>
where
    Args: ParamList,
    F: Invocable<Args>,
{
    global().invoke(f)
}

/// Hydrates `target` from the global scope.
pub fn hydrate<T: Hydrate>(target: &mut T) -> DiResult<()> {
    global().hydrate(target)
}

/// Creates a child of the global scope.
pub fn new() -> Scope {
    global().spawn()
}
