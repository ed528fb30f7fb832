//! Lifetime policies for provided values.

/// How long a provided value lives and where it is cached.
///
/// The lifetime decides placement, not just duration: a `Forever` value is
/// cached on the scope that owns its provider, while a `Scope` value is
/// cached on whichever scope asked for it.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::{Lifetime, Provider, Scope};
/// use std::sync::Arc;
///
/// #[derive(Clone, Default)]
/// struct Pool(u32);
/// #[derive(Clone, Default)]
/// struct Request(u32);
///
/// let root = Scope::root();
/// root.provide(Provider::forever(|_| Ok(Pool(4))));
/// root.provide(Provider::scoped(|_| Ok(Request(1))));
///
/// let a = root.spawn();
/// let b = root.spawn();
///
/// // Forever: one instance, cached on the root
/// assert!(Arc::ptr_eq(&a.get::<Pool>().unwrap(), &b.get::<Pool>().unwrap()));
///
/// // Scope: one instance per requesting scope
/// assert!(!Arc::ptr_eq(&a.get::<Request>().unwrap(), &b.get::<Request>().unwrap()));
/// assert_eq!(Provider::<Pool>::new(Lifetime::Once).lifetime(), Lifetime::Once);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Lives until its owning scope is freed
    ///
    /// Resolution materializes the value on the scope that registered the
    /// provider, so every descendant shares one instance.
    #[default]
    Forever,
    /// Lives until the requesting scope is freed
    ///
    /// The value is cached on the scope that asked for it, even when the
    /// provider was registered on an ancestor.
    Scope,
    /// Lives for a single hydrate or invoke operation
    ///
    /// Freed unconditionally when the operation that materialized it ends,
    /// whichever scope it was cached on.
    Once,
}

impl Lifetime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Forever => "forever",
            Lifetime::Scope => "scope",
            Lifetime::Once => "once",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
