//! Type keys for instance and provider lookup.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identifier for "the type a value is requested as".
///
/// Keys index both the instance cache and the provider table of every
/// scope. Two requests for the same type always produce equal keys; the
/// type name is carried only for diagnostics.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::Key;
///
/// #[derive(Clone, Default)]
/// struct Port(u16);
///
/// let a = Key::of::<Port>();
/// let b = Key::of::<Port>();
/// assert_eq!(a, b);
/// assert!(a.name().ends_with("Port"));
/// assert_ne!(a, Key::of::<u16>());
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    id: TypeId,
    shared_id: TypeId,
    name: &'static str,
}

impl Key {
    /// Key for values requested as `T`.
    #[inline(always)]
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Key {
            id: TypeId::of::<T>(),
            shared_id: TypeId::of::<parking_lot::RwLock<T>>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the requested type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Human readable type name (`std::any::type_name`).
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when `instance` is the shared cell holding a value of this type.
    ///
    /// ```rust
    /// use scoped_deps::{share, Instance, Key};
    ///
    /// let instance: Instance = share(8080u16);
    /// assert!(Key::of::<u16>().accepts(&*instance));
    /// assert!(!Key::of::<u32>().accepts(&*instance));
    /// ```
    #[inline]
    pub fn accepts(&self, instance: &(dyn Any + Send + Sync)) -> bool {
        instance.type_id() == self.shared_id
    }

    /// True when this key indexes values of type `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

// Identity is the TypeId alone; the name only helps debugging.
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
