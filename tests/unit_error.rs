/// Unit tests for DiError rendering and MultiError aggregation

use scoped_deps::{DiError, DiResult, MultiError};
use std::error::Error;

#[test]
fn test_error_display_no_provider() {
    let error = DiError::NoProvider("app::Database");
    assert_eq!(error.to_string(), "no provider exists for the given type: app::Database");
    assert!(error.is_no_provider());
}

#[test]
fn test_error_display_variants() {
    assert_eq!(
        DiError::MissingCreate("app::Pool").to_string(),
        "provider missing create function: app::Pool"
    );
    assert_eq!(
        DiError::NotPointer("u8").to_string(),
        "only shared pointers can be set on a scope: u8"
    );
    assert_eq!(DiError::NotFunc("u8").to_string(), "only funcs can be invoked: u8");
    assert_eq!(
        DiError::InvalidValue("app::Port").to_string(),
        "invalid argument for invoke: app::Port"
    );
    assert_eq!(DiError::DepthExceeded(64).to_string(), "max depth 64 exceeded");
    assert!(!DiError::InvalidValue("x").is_no_provider());
}

#[test]
fn test_error_display_circular() {
    let error = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
    assert_eq!(error.to_string(), "circular dependency: ServiceA -> ServiceB -> ServiceA");
}

#[test]
fn test_failed_wraps_and_unwraps() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "pipe closed");
    let error = DiError::failed(io);
    assert_eq!(error.to_string(), "pipe closed");
    assert!(matches!(error, DiError::Failed(_)));

    // A DiError passed through `failed` is not nested
    let inner = DiError::failed(DiError::NoProvider("u8"));
    assert!(inner.is_no_provider());
}

#[test]
fn test_multi_error_rendering() {
    let empty = MultiError::new();
    assert!(empty.is_empty());
    assert_eq!(empty.to_string(), "no errors");
    assert!(empty.into_result().is_ok());

    let one: MultiError = vec![DiError::msg("first")].into_iter().collect();
    assert_eq!(one.to_string(), "first");

    let mut many = MultiError::new();
    many.push(DiError::msg("first"));
    many.push(DiError::msg("second"));
    assert_eq!(many.len(), 2);
    assert_eq!(many.to_string(), "multiple errors: first, second");

    let error = many.into_result().unwrap_err();
    assert_eq!(error.to_string(), "multiple errors: first, second");
    match error {
        DiError::Multi(multi) => assert_eq!(multi.errors()[1].to_string(), "second"),
        other => panic!("expected aggregate, got {other}"),
    }
}

#[test]
fn test_error_trait_and_clone() {
    let error = DiError::msg("boom");
    let cloned = error.clone();
    assert_eq!(error.to_string(), cloned.to_string());

    let dyn_error: &dyn Error = &error;
    assert_eq!(dyn_error.to_string(), "boom");
}

#[test]
fn test_di_result_alias() {
    fn ok() -> DiResult<u8> {
        Ok(1)
    }
    fn err() -> DiResult<u8> {
        Err(DiError::NoProvider("u8"))
    }
    assert_eq!(ok().unwrap(), 1);
    assert!(err().unwrap_err().is_no_provider());
}
