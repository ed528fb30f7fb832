//! Calling functions with parameters resolved from a scope.
//!
//! Any closure or function whose parameters all implement [`Hydrate`] can be
//! invoked. Each parameter is produced by [`Scope::hydrate_type`] in
//! declaration order, the function is called, parameters passed as
//! [`Shared`] cells are reported to their provider's `after_pointer_use`
//! hook, and finally every `Once` value the call materialized is freed.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{BoxError, DiError, DiResult, Hydrate, Key, PostUse, RwLock, Scope};

/// An ordered parameter list that can be produced from a scope.
///
/// Implemented for tuples of up to eight [`Hydrate`] types.
pub trait ParamList: Sized {
    /// Keys the parameters are requested as, in declaration order.
    fn parameters() -> Vec<Key>;

    fn hydrate(scope: &Scope) -> DiResult<Self>;

    /// Parameters handed out by mutable reference.
    fn post_uses(&self) -> Vec<PostUse>;
}

/// A callable whose parameters are the list `Args`.
///
/// Implemented for every `FnMut(A1, ..., An) -> R` with `n <= 8`, each `Ai`
/// implementing [`Hydrate`] and `R` implementing [`IntoResults`].
pub trait Invocable<Args: ParamList> {
    type Output: IntoResults;

    fn call(&mut self, args: Args) -> Self::Output;
}

macro_rules! impl_params {
    ($($param:ident),*) => {
        impl<$($param: Hydrate),*> ParamList for ($($param,)*) {
            fn parameters() -> Vec<Key> {
                vec![$(Key::of::<$param::Target>()),*]
            }

            #[allow(unused_variables)]
            fn hydrate(scope: &Scope) -> DiResult<Self> {
                Ok(($(scope.hydrate_type::<$param>()?,)*))
            }

            #[allow(non_snake_case)]
            fn post_uses(&self) -> Vec<PostUse> {
                let ($($param,)*) = self;
                let mut post_uses = Vec::new();
                $(post_uses.extend($param.post_use());)*
                post_uses
            }
        }

        impl<Callable, Out, $($param: Hydrate),*> Invocable<($($param,)*)> for Callable
        where
            Callable: FnMut($($param),*) -> Out,
            Out: IntoResults,
        {
            type Output = Out;

            #[allow(non_snake_case)]
            fn call(&mut self, args: ($($param,)*)) -> Out {
                let ($($param,)*) = args;
                (self)($($param),*)
            }
        }
    };
}

impl_params!();
impl_params!(A1);
impl_params!(A1, A2);
impl_params!(A1, A2, A3);
impl_params!(A1, A2, A3, A4);
impl_params!(A1, A2, A3, A4, A5);
impl_params!(A1, A2, A3, A4, A5, A6);
impl_params!(A1, A2, A3, A4, A5, A6, A7);
impl_params!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Ordered return values of an invocation.
///
/// ```rust
/// use scoped_deps::Scope;
///
/// let scope = Scope::root();
/// scope.set(2u32);
///
/// let mut results = scope.invoke(|n: u32| (n * 10, format!("n={}", n))).unwrap();
/// assert_eq!(results.len(), 2);
/// assert_eq!(results.get::<u32>(0), Some(&20));
/// assert_eq!(results.take::<String>(1).as_deref(), Some("n=2"));
/// assert!(results.err().is_none());
/// ```
#[derive(Default)]
pub struct Results {
    values: Vec<Option<Box<dyn Any + Send>>>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Any + Send>(&mut self, value: T) {
        self.values.push(Some(Box::new(value)));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows the value at `index` when it is a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.as_ref()?.downcast_ref::<T>()
    }

    /// Moves the value at `index` out when it is a `T`. Later indexes are
    /// not shifted.
    pub fn take<T: Any>(&mut self, index: usize) -> Option<T> {
        let slot = self.values.get_mut(index)?;
        if !slot.as_ref()?.is::<T>() {
            return None;
        }
        slot.take()?.downcast::<T>().ok().map(|value| *value)
    }

    /// The first error-shaped return value, if any.
    pub fn err(&self) -> Option<DiError> {
        self.values.iter().flatten().find_map(|value| {
            if let Some(err) = value.downcast_ref::<DiError>() {
                return Some(err.clone());
            }
            value
                .downcast_ref::<Arc<dyn std::error::Error + Send + Sync>>()
                .map(|err| DiError::Failed(err.clone()))
        })
    }

    pub fn into_values(self) -> Vec<Box<dyn Any + Send>> {
        self.values.into_iter().flatten().collect()
    }
}

impl fmt::Debug for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results")
            .field("len", &self.values.len())
            .field("err", &self.err())
            .finish()
    }
}

/// Packages a callable's return value into [`Results`].
///
/// `()` yields nothing, a tuple yields one entry per element, a
/// `Result<T, E>` yields `T`'s entries or a single [`DiError`] entry, and
/// any other supported value yields one entry. Wrap other types in a
/// one-element tuple.
pub trait IntoResults {
    fn into_results(self) -> Results;
}

macro_rules! into_results_single {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoResults for $ty {
                fn into_results(self) -> Results {
                    let mut results = Results::new();
                    results.push(self);
                    results
                }
            }
        )+
    };
}

into_results_single!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str, DiError, Func,
);

impl<T: Send + 'static> IntoResults for Vec<T> {
    fn into_results(self) -> Results {
        let mut results = Results::new();
        results.push(self);
        results
    }
}

impl<T: Send + 'static> IntoResults for Option<T> {
    fn into_results(self) -> Results {
        let mut results = Results::new();
        results.push(self);
        results
    }
}

impl<T: ?Sized + Send + Sync + 'static> IntoResults for Arc<T> {
    fn into_results(self) -> Results {
        let mut results = Results::new();
        results.push(self);
        results
    }
}

impl<K: Send + 'static, V: Send + 'static, S: Send + 'static> IntoResults for HashMap<K, V, S> {
    fn into_results(self) -> Results {
        let mut results = Results::new();
        results.push(self);
        results
    }
}

impl<K: Send + 'static, V: Send + 'static> IntoResults for BTreeMap<K, V> {
    fn into_results(self) -> Results {
        let mut results = Results::new();
        results.push(self);
        results
    }
}

impl<T, E> IntoResults for Result<T, E>
where
    T: IntoResults,
    E: Into<BoxError>,
{
    fn into_results(self) -> Results {
        match self {
            Ok(value) => value.into_results(),
            Err(err) => {
                let mut results = Results::new();
                results.push(DiError::failed(err));
                results
            }
        }
    }
}

macro_rules! into_results_tuple {
    ($($value:ident),*) => {
        impl<$($value: Send + 'static),*> IntoResults for ($($value,)*) {
            #[allow(non_snake_case)]
            fn into_results(self) -> Results {
                let ($($value,)*) = self;
                let mut results = Results::new();
                $(results.push($value);)*
                results
            }
        }
    };
}

into_results_tuple!();
into_results_tuple!(R1);
into_results_tuple!(R1, R2);
into_results_tuple!(R1, R2, R3);
into_results_tuple!(R1, R2, R3, R4);
into_results_tuple!(R1, R2, R3, R4, R5);
into_results_tuple!(R1, R2, R3, R4, R5, R6);
into_results_tuple!(R1, R2, R3, R4, R5, R6, R7);
into_results_tuple!(R1, R2, R3, R4, R5, R6, R7, R8);

trait ErasedInvoke: Send + Sync {
    fn parameters(&self) -> Vec<Key>;

    fn invoke(&self, scope: &Scope) -> DiResult<Results>;

    fn name(&self) -> &'static str;
}

struct TypedFunc<F, Args> {
    f: Mutex<F>,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> ErasedInvoke for TypedFunc<F, Args>
where
    F: Invocable<Args> + Send + 'static,
    Args: ParamList + 'static,
{
    fn parameters(&self) -> Vec<Key> {
        Args::parameters()
    }

    fn invoke(&self, scope: &Scope) -> DiResult<Results> {
        let mut f = self.f.lock();
        scope.invoke_mut::<Args, F>(&mut *f)
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

/// A type-erased callable that can be stored and invoked later, including
/// from a scope's cache.
///
/// ```rust
/// use scoped_deps::{Func, Scope};
///
/// let scope = Scope::root();
/// scope.set(21u64);
/// scope.set(Func::new(|n: u64| n * 2));
///
/// let func = scope.get::<Func>().unwrap().read().clone();
/// let results = scope.invoke_value(&func).unwrap();
/// assert_eq!(results.get::<u64>(0), Some(&42));
/// assert_eq!(func.parameters().len(), 1);
/// ```
#[derive(Clone)]
pub struct Func {
    inner: Arc<dyn ErasedInvoke>,
}

impl Func {
    pub fn new<F, Args>(f: F) -> Self
    where
        F: Invocable<Args> + Send + 'static,
        Args: ParamList + 'static,
    {
        Self {
            inner: Arc::new(TypedFunc {
                f: Mutex::new(f),
                _args: PhantomData,
            }),
        }
    }

    /// Keys the parameters are requested as, in declaration order.
    pub fn parameters(&self) -> Vec<Key> {
        self.inner.parameters()
    }

    pub fn invoke(&self, scope: &Scope) -> DiResult<Results> {
        self.inner.invoke(scope)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("name", &self.inner.name())
            .field("parameters", &self.inner.parameters())
            .finish()
    }
}

impl Scope {
    /// Calls `f` with parameters resolved from this scope.
    ///
    /// Parameters are hydrated in declaration order and any resolution
    /// failure aborts before `f` runs. After the call, every `Shared`
    /// parameter is reported to the nearest provider of its type that has an
    /// `after_pointer_use` hook, in parameter order. `Once` values created
    /// during the call are freed last, whether or not it succeeded.
    ///
    /// ```rust
    /// use scoped_deps::{Provider, Scope, Shared};
    ///
    /// #[derive(Clone, Default, Debug, PartialEq)]
    /// struct Port(u16);
    /// scoped_deps::hydrate_leaf!(Port);
    ///
    /// let scope = Scope::root();
    /// scope.provide(Provider::forever(|_| Ok(Port(8080))));
    ///
    /// let seen = scope.invoke(|port: Port| port.0).unwrap();
    /// assert_eq!(seen.get::<u16>(0), Some(&8080));
    ///
    /// scope.invoke(|port: Shared<Port>| port.write().0 = 4040).unwrap();
    /// assert_eq!(*scope.get::<Port>().unwrap().read(), Port(4040));
    /// ```
    pub fn invoke<Args, F>(&self, mut f: F) -> DiResult<Results>
    where
        Args: ParamList,
        F: Invocable<Args>,
    {
        self.invoke_mut(&mut f)
    }

    /// Like [`invoke`](Self::invoke), borrowing the callable.
    pub fn invoke_mut<Args, F>(&self, f: &mut F) -> DiResult<Results>
    where
        Args: ParamList,
        F: Invocable<Args>,
    {
        let span = tracing::debug_span!("invoke", scope = self.id(), target = std::any::type_name::<F>());
        let _enter = span.enter();

        self.run_operation(|| {
            let args = Args::hydrate(self)?;
            let post_uses = args.post_uses();
            let output = f.call(args);
            self.notify_post_use(&post_uses)?;
            Ok(output.into_results())
        })
    }

    /// Invokes a stored [`Func`] (or a shared cell holding one). Anything
    /// else fails with `NotFunc`.
    pub fn invoke_value<T>(&self, value: &T) -> DiResult<Results>
    where
        T: Any + Send + Sync,
    {
        let value: &dyn Any = value;
        if let Some(func) = value.downcast_ref::<Func>() {
            return func.invoke(self);
        }
        if let Some(cell) = value.downcast_ref::<RwLock<Func>>() {
            let func = cell.read().clone();
            return func.invoke(self);
        }
        if let Some(cell) = value.downcast_ref::<Arc<RwLock<Func>>>() {
            let func = cell.read().clone();
            return func.invoke(self);
        }
        Err(DiError::NotFunc(std::any::type_name::<T>()))
    }

    fn notify_post_use(&self, post_uses: &[PostUse]) -> DiResult<()> {
        for post_use in post_uses {
            if let Some(link) = self.find_link(&post_use.key) {
                tracing::trace!(scope = self.id(), key = post_use.key.name(), "after pointer use");
                link.after_pointer_use(self, &post_use.instance)?;
            }
        }
        Ok(())
    }
}
