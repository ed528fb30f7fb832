//! # scoped-deps
//!
//! A type-indexed dependency registry organized as a tree of scopes.
//!
//! Callers ask a [`Scope`] for a value by its type. The scope returns an
//! instance it already holds, lazily builds one from a registered
//! [`Provider`], or falls back to a dynamic construction path. Where a new
//! value is cached depends on its provider's [`Lifetime`]:
//!
//! - **Forever**: cached on the scope that owns the provider and shared by
//!   every descendant
//! - **Scope**: cached on the scope that asked, and freed with it
//! - **Once**: lives for a single [`Scope::hydrate`] or [`Scope::invoke`]
//!   operation and is freed when it ends
//!
//! ## Quick Start
//!
//! ```rust
//! use scoped_deps::{Provider, Scope, Shared};
//!
//! #[derive(Clone, Default)]
//! struct Env {
//!     connection: String,
//! }
//!
//! #[derive(Clone, Default)]
//! struct Database {
//!     url: String,
//! }
//!
//! let root = Scope::root();
//! root.set(Env { connection: "postgres://localhost".into() });
//! root.provide(Provider::scoped(|scope| {
//!     let env = scope.get::<Env>()?;
//!     let url = env.read().connection.clone();
//!     Ok(Database { url })
//! }));
//!
//! let request = root.spawn();
//! let url = request
//!     .invoke(|db: Shared<Database>| db.read().url.clone())
//!     .unwrap()
//!     .take::<String>(0)
//!     .unwrap();
//! assert_eq!(url, "postgres://localhost");
//!
//! // Scope-lifetime values are released with the scope that asked for them
//! request.free().unwrap();
//! ```
//!
//! ## Hydration
//!
//! Composite values are filled slot by slot. Slots whose type nothing
//! provides are left as they were.
//!
//! ```rust
//! use scoped_deps::{hydrate_record, Scope};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Port(u16);
//!
//! #[derive(Clone, Default)]
//! struct Settings {
//!     port: Port,
//!     ports: Vec<Port>,
//!     name: String,
//! }
//! hydrate_record!(Settings { port, ports, name });
//! scoped_deps::hydrate_leaf!(Port);
//!
//! let scope = Scope::root();
//! scope.set(Port(8080));
//!
//! let mut settings = Settings {
//!     ports: vec![Port(1), Port(2)],
//!     ..Default::default()
//! };
//! scope.hydrate(&mut settings).unwrap();
//! assert_eq!(settings.port, Port(8080));
//! assert_eq!(settings.ports, vec![Port(8080), Port(8080)]);
//! assert_eq!(settings.name, "");
//! ```
//!
//! ## Process-wide root
//!
//! [`global()`] is created on first use. [`Scope::new`] spawns a child of it,
//! and the free functions in [`global`](mod@global) operate on it directly.

use std::any::Any;
use std::sync::Arc;

// Module declarations
pub mod config;
pub mod dynamic;
pub mod error;
pub mod global;
pub mod hydrate;
pub mod invoke;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod scope;

// Internal modules
mod internal;

pub use config::ScopeConfig;
pub use dynamic::{construct_dynamic, Dynamic, DynamicProvider};
pub use error::{BoxError, DiError, DiResult, MultiError};
pub use global::global;
pub use hydrate::{Hydrate, PostUse};
pub use invoke::{Func, Invocable, IntoResults, ParamList, Results};
pub use key::Key;
pub use lifetime::Lifetime;
pub use observer::{Resolution, ScopeObserver, TracingObserver};
pub use provider::{CreateFn, HookFn, Provider};
pub use scope::Scope;

pub use parking_lot::RwLock;

/// The shared, mutable cell every materialized value lives in.
///
/// Resolution hands out clones of the `Arc`, so identity is stable across
/// calls and writes made through one handle are seen by the next `get`.
pub type Shared<V> = Arc<RwLock<V>>;

/// Type-erased form of a [`Shared`] cell, as stored in scope caches.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Wraps a value in its shared cell.
#[inline]
pub fn share<V>(value: V) -> Shared<V>
where
    V: Send + Sync + 'static,
{
    Arc::new(RwLock::new(value))
}

/// Recovers the typed cell from an erased instance.
///
/// Returns `None` when the instance holds a different type.
#[inline]
pub fn downcast<V>(instance: Instance) -> Option<Shared<V>>
where
    V: Send + Sync + 'static,
{
    instance.downcast::<RwLock<V>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_recovers_the_same_cell() {
        let cell = share(5u8);
        let erased: Instance = cell.clone();
        let back = downcast::<u8>(erased.clone()).unwrap();
        assert!(Arc::ptr_eq(&cell, &back));
        assert!(downcast::<u16>(erased).is_none());
    }
}
