//! Dynamic fallback: types that build themselves, and per-scope synthesis
//! callbacks.
//!
//! When no cached value or provider resolves a type, resolution tries two
//! things in order: the requested type's own [`Dynamic`] capability (when
//! the request carries it), then the scope's dynamic callback installed with
//! [`Scope::set_dynamic`]. Neither result is cached.

use std::sync::Arc;

use crate::{DiResult, Instance, Key, Scope};

/// Scope-level synthesis callback.
///
/// Returning `Ok(None)` means the callback does not handle the type.
pub type DynamicProvider = Arc<dyn Fn(&Key, &Scope) -> DiResult<Option<Instance>> + Send + Sync>;

/// A type that knows how to populate itself from a scope.
///
/// Useful for generic types whose instantiations are not known ahead of
/// time, or are too many to register one by one.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::{Dynamic, DiResult, Scope};
///
/// #[derive(Clone, Default)]
/// struct Greeting(String);
///
/// impl Dynamic for Greeting {
///     fn provide_dynamic(&mut self, scope: &Scope) -> DiResult<()> {
///         let name = scope.get::<String>()?;
///         self.0 = format!("hello {}", name.read());
///         Ok(())
///     }
/// }
///
/// let scope = Scope::root();
/// scope.set("world".to_string());
/// let greeting = scope.get_dynamic::<Greeting>().unwrap();
/// assert_eq!(greeting.read().0, "hello world");
///
/// // Self-constructed values are never cached
/// assert!(!scope.has_instance::<Greeting>());
/// ```
pub trait Dynamic: Default + Send + Sync + 'static {
    /// Fills in `self`, a fresh default value, using `scope`.
    fn provide_dynamic(&mut self, scope: &Scope) -> DiResult<()>;
}

/// Builds a default `T` and lets it populate itself from `scope`.
pub fn construct_dynamic<T: Dynamic>(scope: &Scope) -> DiResult<T> {
    let mut value = T::default();
    value.provide_dynamic(scope)?;
    tracing::trace!(scope = scope.id(), key = std::any::type_name::<T>(), "self-constructed");
    Ok(value)
}
