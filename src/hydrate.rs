//! Structural injection: filling every resolvable slot of a value.
//!
//! Hydration asks the scope for each slot's type. A slot that resolves is
//! overwritten and not descended into; a slot that has no provider is
//! descended into when it is a composite, and left untouched otherwise.
//! Only `NoProvider` is treated as "leave it alone": any other failure
//! aborts the whole hydration.
//!
//! Slot shapes are described by the [`Hydrate`] trait. The crate implements
//! it for primitives, `String`, [`Shared`] cells, `Option`, `Vec`, arrays
//! and maps; user types opt in with [`hydrate_leaf!`](crate::hydrate_leaf),
//! [`hydrate_record!`](crate::hydrate_record) or
//! [`hydrate_dynamic!`](crate::hydrate_dynamic).

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::{downcast, DiError, DiResult, Instance, Key, Scope, Shared};

/// A slot that a scope can fill.
///
/// `Target` is the type the slot is requested as. For plain values it is the
/// value's own type; a `Shared<V>` or `Option<T>` slot is requested as the
/// type it points to.
pub trait Hydrate: Sized + 'static {
    type Target: Send + Sync + 'static;

    /// Builds the slot value from a resolved cell: a copy for plain values,
    /// the cell itself for `Shared`.
    fn from_shared(shared: Shared<Self::Target>) -> DiResult<Self>;

    /// Fresh value for a slot that has nothing to start from, such as an
    /// invocation parameter or a replaced map entry.
    fn zero() -> DiResult<Self>;

    /// True for unset nilable containers, which are never descended into.
    fn is_vacant(&self) -> bool {
        false
    }

    /// Hydrates each addressable sub-slot through [`Scope::hydrate_slot`].
    fn hydrate_slots(&mut self, _scope: &Scope) -> DiResult<()> {
        Ok(())
    }

    /// Self-construction capability of the target type, if it has one.
    fn self_construct(_scope: &Scope) -> Option<DiResult<Instance>> {
        None
    }

    /// Post-use notification target when the slot is a mutable reference.
    fn post_use(&self) -> Option<PostUse> {
        None
    }
}

/// A value handed out by mutable reference, to be reported to its
/// provider's `after_pointer_use` hook.
#[derive(Clone)]
pub struct PostUse {
    pub key: Key,
    pub instance: Instance,
}

impl std::fmt::Debug for PostUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostUse").field("key", &self.key).finish()
    }
}

impl Scope {
    /// Fills every resolvable slot of `target`.
    ///
    /// This is one operation: `Once` values created while hydrating are
    /// freed before it returns, so hydrated copies outlive them but shared
    /// cells handed out for `Once` types are released.
    ///
    /// ```rust
    /// use scoped_deps::{hydrate_leaf, hydrate_record, DiError, Provider, Scope};
    ///
    /// #[derive(Clone, Default, Debug, PartialEq)]
    /// struct Port(u16);
    /// #[derive(Clone, Default, Debug, PartialEq)]
    /// struct Timeout(u64);
    /// hydrate_leaf!(Port, Timeout);
    ///
    /// #[derive(Clone, Default)]
    /// struct Server { port: Port, timeout: Timeout }
    /// hydrate_record!(Server { port, timeout });
    ///
    /// let scope = Scope::root();
    /// scope.set(Port(8080));
    ///
    /// let mut server = Server::default();
    /// scope.hydrate(&mut server).unwrap();
    /// assert_eq!(server.port, Port(8080));
    /// assert_eq!(server.timeout, Timeout(0));
    ///
    /// scope.provide(Provider::<Timeout>::scoped(|_| Err(DiError::msg("no clock"))));
    /// assert_eq!(scope.hydrate(&mut server).unwrap_err().to_string(), "no clock");
    /// ```
    pub fn hydrate<T: Hydrate>(&self, target: &mut T) -> DiResult<()> {
        let span = tracing::debug_span!("hydrate", scope = self.id(), target = std::any::type_name::<T>());
        let _enter = span.enter();
        self.run_operation(|| self.hydrate_slot(target))
    }

    /// Hydrates a single slot in place without ending an operation.
    ///
    /// This is what [`Hydrate::hydrate_slots`] implementations call for each
    /// of their sub-slots.
    pub fn hydrate_slot<T: Hydrate>(&self, slot: &mut T) -> DiResult<()> {
        match self.resolve_slot::<T>()? {
            Some(value) => {
                *slot = value;
                Ok(())
            }
            None => self.descend(slot),
        }
    }

    /// Produces a hydrated value of type `T` from nothing: the resolved value
    /// when `T`'s target is provided, a hydrated zero value otherwise.
    pub fn hydrate_type<T: Hydrate>(&self) -> DiResult<T> {
        if let Some(value) = self.resolve_slot::<T>()? {
            return Ok(value);
        }
        let mut value = T::zero()?;
        self.descend(&mut value)?;
        Ok(value)
    }

    /// Map values are replaced by a freshly hydrated instance. A value type
    /// with no zero and nothing providing it keeps the current value.
    fn replace_map_value<V: Hydrate>(&self, value: &mut V) -> DiResult<()> {
        if let Some(resolved) = self.resolve_slot::<V>()? {
            *value = resolved;
            return Ok(());
        }
        let mut fresh = match V::zero() {
            Ok(fresh) => fresh,
            Err(DiError::InvalidValue(_)) => return self.descend(value),
            Err(err) => return Err(err),
        };
        self.descend(&mut fresh)?;
        *value = fresh;
        Ok(())
    }

    fn descend<T: Hydrate>(&self, slot: &mut T) -> DiResult<()> {
        if slot.is_vacant() {
            return Ok(());
        }
        slot.hydrate_slots(self)
    }

    /// `Ok(None)` when nothing provides `T`'s target.
    fn resolve_slot<T: Hydrate>(&self) -> DiResult<Option<T>> {
        let key = Key::of::<T::Target>();
        let construct = |scope: &Scope| T::self_construct(scope);
        match self.resolve_with(&key, Some(&construct)) {
            Ok(instance) => {
                let shared = downcast::<T::Target>(instance).ok_or(DiError::NotPointer(key.name()))?;
                T::from_shared(shared).map(Some)
            }
            Err(err) if err.is_no_provider() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Implements [`Hydrate`] for leaf types: resolved by type, copied by
/// `Clone`, zeroed by `Default`, never descended into.
///
/// ```rust
/// use scoped_deps::{hydrate_leaf, Scope};
///
/// #[derive(Clone, Default, Debug, PartialEq)]
/// struct Port(u16);
/// hydrate_leaf!(Port);
///
/// let scope = Scope::root();
/// scope.set(Port(80));
/// assert_eq!(scope.hydrate_type::<Port>().unwrap(), Port(80));
/// ```
#[macro_export]
macro_rules! hydrate_leaf {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Hydrate for $ty {
                type Target = $ty;

                fn from_shared(shared: $crate::Shared<$ty>) -> $crate::DiResult<Self> {
                    let value = shared.read();
                    Ok(::std::clone::Clone::clone(&*value))
                }

                fn zero() -> $crate::DiResult<Self> {
                    Ok(::std::default::Default::default())
                }
            }
        )+
    };
}

/// Implements [`Hydrate`] for a record type whose listed fields are
/// hydrated one by one when the record itself has no provider.
///
/// Fields that are not listed are never touched. Tuple structs list field
/// indexes (`Pair { 0, 1 }`).
///
/// ```rust
/// use scoped_deps::{hydrate_record, Scope, Shared};
///
/// #[derive(Clone, Default)]
/// struct Handlers {
///     name: String,
///     cache: Option<Shared<Vec<u8>>>,
///     internal: u32,
/// }
/// hydrate_record!(Handlers { name, cache });
///
/// let scope = Scope::root();
/// scope.set("api".to_string());
/// scope.set(vec![1u8, 2, 3]);
///
/// let mut handlers = Handlers { internal: 7, ..Default::default() };
/// scope.hydrate(&mut handlers).unwrap();
/// assert_eq!(handlers.name, "api");
/// assert_eq!(handlers.cache.unwrap().read().len(), 3);
/// assert_eq!(handlers.internal, 7);
/// ```
#[macro_export]
macro_rules! hydrate_record {
    ($ty:ty { $($field:tt),* $(,)? }) => {
        impl $crate::Hydrate for $ty {
            type Target = $ty;

            fn from_shared(shared: $crate::Shared<$ty>) -> $crate::DiResult<Self> {
                let value = shared.read();
                Ok(::std::clone::Clone::clone(&*value))
            }

            fn zero() -> $crate::DiResult<Self> {
                Ok(::std::default::Default::default())
            }

            #[allow(unused_variables)]
            fn hydrate_slots(&mut self, scope: &$crate::Scope) -> $crate::DiResult<()> {
                $( scope.hydrate_slot(&mut self.$field)?; )*
                Ok(())
            }
        }
    };
}

/// Like [`hydrate_record!`], for types implementing [`Dynamic`](crate::Dynamic):
/// when nothing provides the type, it constructs itself.
///
/// ```rust
/// use scoped_deps::{hydrate_dynamic, Dynamic, DiResult, Scope};
///
/// #[derive(Clone, Default)]
/// struct Counter(u32);
///
/// impl Dynamic for Counter {
///     fn provide_dynamic(&mut self, _scope: &Scope) -> DiResult<()> {
///         self.0 = 42;
///         Ok(())
///     }
/// }
/// hydrate_dynamic!(Counter);
///
/// let scope = Scope::root();
/// assert_eq!(scope.hydrate_type::<Counter>().unwrap().0, 42);
/// ```
#[macro_export]
macro_rules! hydrate_dynamic {
    ($ty:ty { $($field:tt),* $(,)? }) => {
        impl $crate::Hydrate for $ty {
            type Target = $ty;

            fn from_shared(shared: $crate::Shared<$ty>) -> $crate::DiResult<Self> {
                let value = shared.read();
                Ok(::std::clone::Clone::clone(&*value))
            }

            fn zero() -> $crate::DiResult<Self> {
                Ok(::std::default::Default::default())
            }

            #[allow(unused_variables)]
            fn hydrate_slots(&mut self, scope: &$crate::Scope) -> $crate::DiResult<()> {
                $( scope.hydrate_slot(&mut self.$field)?; )*
                Ok(())
            }

            fn self_construct(
                scope: &$crate::Scope,
            ) -> ::std::option::Option<$crate::DiResult<$crate::Instance>> {
                Some(
                    $crate::construct_dynamic::<$ty>(scope)
                        .map(|value| $crate::share(value) as $crate::Instance),
                )
            }
        }
    };
    ($ty:ty) => {
        $crate::hydrate_dynamic!($ty {});
    };
}

hydrate_leaf!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str,
);

impl Hydrate for () {
    type Target = ();

    fn from_shared(_shared: Shared<()>) -> DiResult<Self> {
        Ok(())
    }

    fn zero() -> DiResult<Self> {
        Ok(())
    }
}

/// The "pointer" slot: resolves to the cached cell itself, so writes are
/// seen by later resolutions.
impl<V> Hydrate for Shared<V>
where
    V: Send + Sync + 'static,
{
    type Target = V;

    fn from_shared(shared: Shared<V>) -> DiResult<Self> {
        Ok(shared)
    }

    /// A cell cannot be conjured without a provider.
    fn zero() -> DiResult<Self> {
        Err(DiError::InvalidValue(std::any::type_name::<V>()))
    }

    fn post_use(&self) -> Option<PostUse> {
        Some(PostUse {
            key: Key::of::<V>(),
            instance: self.clone(),
        })
    }
}

/// The nilable slot: requested as `T`'s target, `None` when nothing
/// provides it.
impl<T> Hydrate for Option<T>
where
    T: Hydrate,
{
    type Target = T::Target;

    fn from_shared(shared: Shared<T::Target>) -> DiResult<Self> {
        T::from_shared(shared).map(Some)
    }

    fn zero() -> DiResult<Self> {
        Ok(None)
    }

    fn is_vacant(&self) -> bool {
        self.is_none()
    }

    fn self_construct(scope: &Scope) -> Option<DiResult<Instance>> {
        T::self_construct(scope)
    }

    fn post_use(&self) -> Option<PostUse> {
        self.as_ref().and_then(T::post_use)
    }
}

impl<T> Hydrate for Vec<T>
where
    T: Hydrate + Clone + Send + Sync,
{
    type Target = Vec<T>;

    fn from_shared(shared: Shared<Vec<T>>) -> DiResult<Self> {
        let items = shared.read();
        Ok(items.clone())
    }

    fn zero() -> DiResult<Self> {
        Ok(Vec::new())
    }

    fn is_vacant(&self) -> bool {
        self.is_empty()
    }

    fn hydrate_slots(&mut self, scope: &Scope) -> DiResult<()> {
        for item in self.iter_mut() {
            scope.hydrate_slot(item)?;
        }
        Ok(())
    }
}

impl<T, const N: usize> Hydrate for [T; N]
where
    T: Hydrate + Clone + Send + Sync,
{
    type Target = [T; N];

    fn from_shared(shared: Shared<[T; N]>) -> DiResult<Self> {
        let items = shared.read();
        Ok(items.clone())
    }

    fn zero() -> DiResult<Self> {
        let items = (0..N).map(|_| T::zero()).collect::<DiResult<Vec<T>>>()?;
        items
            .try_into()
            .map_err(|_| DiError::InvalidValue(std::any::type_name::<[T; N]>()))
    }

    fn hydrate_slots(&mut self, scope: &Scope) -> DiResult<()> {
        for item in self.iter_mut() {
            scope.hydrate_slot(item)?;
        }
        Ok(())
    }
}

/// Map values are replaced by freshly hydrated instances; keys are left
/// alone.
impl<K, V, S> Hydrate for HashMap<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Hydrate + Clone + Send + Sync,
    S: BuildHasher + Default + Clone + Send + Sync + 'static,
{
    type Target = HashMap<K, V, S>;

    fn from_shared(shared: Shared<Self::Target>) -> DiResult<Self> {
        let map = shared.read();
        Ok(map.clone())
    }

    fn zero() -> DiResult<Self> {
        Ok(HashMap::default())
    }

    fn is_vacant(&self) -> bool {
        self.is_empty()
    }

    fn hydrate_slots(&mut self, scope: &Scope) -> DiResult<()> {
        for value in self.values_mut() {
            scope.replace_map_value(value)?;
        }
        Ok(())
    }
}

impl<K, V> Hydrate for BTreeMap<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Hydrate + Clone + Send + Sync,
{
    type Target = BTreeMap<K, V>;

    fn from_shared(shared: Shared<Self::Target>) -> DiResult<Self> {
        let map = shared.read();
        Ok(map.clone())
    }

    fn zero() -> DiResult<Self> {
        Ok(BTreeMap::new())
    }

    fn is_vacant(&self) -> bool {
        self.is_empty()
    }

    fn hydrate_slots(&mut self, scope: &Scope) -> DiResult<()> {
        for value in self.values_mut() {
            scope.replace_map_value(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_leaf_is_left_untouched() {
        let scope = Scope::root();
        let mut value = 7u32;
        scope.hydrate(&mut value).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn vacant_containers_are_not_descended() {
        let scope = Scope::root();
        scope.set(1u8);

        let mut empty: Vec<u8> = Vec::new();
        scope.hydrate(&mut empty).unwrap();
        assert!(empty.is_empty());

        let mut missing: Option<u16> = None;
        scope.hydrate(&mut missing).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn arrays_hydrate_every_element() {
        let scope = Scope::root();
        scope.set(3i64);
        let mut items = [0i64; 4];
        scope.hydrate(&mut items).unwrap();
        assert_eq!(items, [3, 3, 3, 3]);
    }

    #[test]
    fn shared_slot_has_no_zero() {
        assert!(matches!(
            <Shared<u8> as Hydrate>::zero(),
            Err(DiError::InvalidValue(_))
        ));
        assert!(<Option<Shared<u8>> as Hydrate>::zero().unwrap().is_none());
    }

    #[test]
    fn map_values_are_replaced_keys_kept() {
        let scope = Scope::root();
        scope.set("filled".to_string());

        let mut map: BTreeMap<u8, String> = BTreeMap::new();
        map.insert(1, "old".into());
        map.insert(2, "older".into());
        scope.hydrate(&mut map).unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(map.values().all(|v| v == "filled"));
    }

    #[test]
    fn unprovided_shared_map_values_are_kept() {
        let scope = Scope::root();
        let conn = crate::share(String::from("kept"));

        let mut map: HashMap<&'static str, Shared<String>> = HashMap::new();
        map.insert("primary", conn.clone());
        scope.hydrate(&mut map).unwrap();
        assert!(std::sync::Arc::ptr_eq(&map["primary"], &conn));

        let replacement = scope.set(String::from("provided"));
        scope.hydrate(&mut map).unwrap();
        assert!(std::sync::Arc::ptr_eq(&map["primary"], &replacement));
    }

    #[test]
    fn unresolvable_map_values_are_reset() {
        let scope = Scope::root();
        let mut map: HashMap<&'static str, u32> = HashMap::new();
        map.insert("a", 9);
        scope.hydrate(&mut map).unwrap();
        assert_eq!(map["a"], 0);
    }
}
