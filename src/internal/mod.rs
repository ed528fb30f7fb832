//! Internal implementation details.

pub(crate) mod resolution;

pub(crate) use resolution::{held_once, hold_once, in_operation, OnceValue, Operation, StackGuard};
