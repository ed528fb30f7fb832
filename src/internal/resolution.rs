//! Thread-local resolution state: cycle detection, depth guard and the
//! per-operation ledger of `Once` values.

use std::cell::RefCell;
use std::sync::Arc;

use crate::provider::Link;
use crate::{DiError, DiResult, Instance, Key, Scope, ScopeConfig};

thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    /// (scope id, key) of every resolution in progress on this thread
    stack: Vec<(u64, Key)>,
    /// One ledger per active hydrate/invoke operation, innermost last
    ledgers: Vec<Vec<OnceValue>>,
}

/// A `Once` value held by the operation that created it rather than by the
/// scope cache, so no other operation can reach it.
pub(crate) struct OnceValue {
    pub(crate) scope: Scope,
    pub(crate) key: Key,
    pub(crate) instance: Instance,
    pub(crate) link: Arc<dyn Link>,
}

/// Marks a resolution of `key` on one scope as in progress.
pub(crate) struct StackGuard {
    scope_id: u64,
    key: Key,
}

impl StackGuard {
    pub(crate) fn enter(scope_id: u64, key: Key, config: &ScopeConfig) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            if config.detect_cycles {
                if let Some(start) = tls
                    .stack
                    .iter()
                    .position(|&(id, k)| id == scope_id && k == key)
                {
                    let mut path: Vec<&'static str> =
                        tls.stack[start..].iter().map(|(_, k)| k.name()).collect();
                    path.push(key.name());
                    return Err(DiError::Circular(path));
                }
            }

            if tls.stack.len() >= config.max_depth {
                return Err(DiError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push((scope_id, key));
            Ok(Self { scope_id, key })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(last) = tls.stack.pop() {
                debug_assert!(last.0 == self.scope_id && last.1 == self.key);
            }
        });
    }
}

/// A hydrate or invoke operation collecting the `Once` values it creates.
///
/// Dropping an unfinished operation discards its ledger so a panic inside a
/// callback cannot leak entries into an enclosing operation.
pub(crate) struct Operation {
    depth: usize,
    finished: bool,
}

impl Operation {
    pub(crate) fn begin() -> Self {
        let depth = RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            tls.ledgers.push(Vec::new());
            tls.ledgers.len()
        });
        Self { depth, finished: false }
    }

    /// Ends the operation, returning the values it materialized in creation order.
    pub(crate) fn finish(mut self) -> Vec<OnceValue> {
        self.finished = true;
        self.pop()
    }

    fn pop(&self) -> Vec<OnceValue> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            debug_assert_eq!(tls.ledgers.len(), self.depth);
            tls.ledgers.pop().unwrap_or_default()
        })
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}

/// True while a hydrate or invoke operation runs on this thread.
pub(crate) fn in_operation() -> bool {
    RESOLUTION_TLS.with(|tls| !tls.borrow().ledgers.is_empty())
}

/// Hands a freshly materialized `Once` value to the innermost operation.
/// Gives the value back when no operation is running.
pub(crate) fn hold_once(value: OnceValue) -> Result<(), OnceValue> {
    RESOLUTION_TLS.with(|tls| match tls.borrow_mut().ledgers.last_mut() {
        Some(ledger) => {
            ledger.push(value);
            Ok(())
        }
        None => Err(value),
    })
}

/// The `Once` value the innermost operation holds for `key` on one scope.
pub(crate) fn held_once(scope_id: u64, key: &Key) -> Option<Instance> {
    RESOLUTION_TLS.with(|tls| {
        let tls = tls.borrow();
        tls.ledgers
            .last()?
            .iter()
            .find(|held| held.scope.id() == scope_id && held.key == *key)
            .map(|held| held.instance.clone())
    })
}
