//! Error types for the dependency registry.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error type accepted from provider callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependency registry errors
///
/// Every failure surfaced by resolution, hydration, invocation or teardown is
/// one of these variants. Only [`DiError::NoProvider`] is treated as an
/// expected outcome, and only inside hydration of composite values.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::{DiError, Scope};
///
/// struct Unregistered;
///
/// let scope = Scope::root();
/// match scope.get::<Unregistered>() {
///     Err(DiError::NoProvider(name)) => assert!(name.ends_with("Unregistered")),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Provider registered without a construction function
    #[error("provider missing create function: {0}")]
    MissingCreate(&'static str),
    /// No constant, provider or dynamic fallback resolves the type
    #[error("no provider exists for the given type: {0}")]
    NoProvider(&'static str),
    /// An erased value was not the shared form of its declared type
    #[error("only shared pointers can be set on a scope: {0}")]
    NotPointer(&'static str),
    /// Invocation target is not callable
    #[error("only funcs can be invoked: {0}")]
    NotFunc(&'static str),
    /// A resolved argument slot is unusable
    #[error("invalid argument for invoke: {0}")]
    InvalidValue(&'static str),
    /// Aggregate of teardown failures
    #[error(transparent)]
    Multi(MultiError),
    /// Circular dependency detected (includes path)
    #[error("circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Maximum resolution depth exceeded
    #[error("max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Error raised by a provider or dynamic callback
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl DiError {
    /// Wraps an arbitrary error raised by user code. A boxed `DiError` is
    /// unwrapped rather than nested.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        match error.into().downcast::<DiError>() {
            Ok(inner) => *inner,
            Err(other) => DiError::Failed(Arc::from(other)),
        }
    }

    /// Builds a [`DiError::Failed`] from a message.
    ///
    /// ```rust
    /// use scoped_deps::DiError;
    ///
    /// let err = DiError::msg("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn msg(message: impl Into<String>) -> Self {
        Self::failed(message.into())
    }

    /// True for the only failure hydration treats as "leave it alone".
    #[inline]
    pub fn is_no_provider(&self) -> bool {
        matches!(self, DiError::NoProvider(_))
    }
}

/// Several teardown failures reported as one error.
///
/// A single failure renders exactly as the underlying error; more than one
/// renders as `multiple errors: a, b, ...` in the order they occurred.
#[derive(Debug, Clone, Default)]
pub struct MultiError {
    errors: Vec<DiError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: DiError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[DiError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing failed, the aggregate otherwise.
    pub fn into_result(self) -> DiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Multi(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [only] => write!(f, "{}", only),
            errors => {
                write!(f, "multiple errors: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}

impl FromIterator<DiError> for MultiError {
    fn from_iter<I: IntoIterator<Item = DiError>>(iter: I) -> Self {
        Self { errors: iter.into_iter().collect() }
    }
}

/// Result type for registry operations
pub type DiResult<T> = Result<T, DiError>;
