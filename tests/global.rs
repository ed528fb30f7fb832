use scoped_deps::{global, Provider, Scope, Shared};
use serial_test::serial;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
struct AppName(String);
scoped_deps::hydrate_leaf!(AppName);

#[derive(Debug, Clone, Default, PartialEq)]
struct RequestId(u64);
scoped_deps::hydrate_leaf!(RequestId);

#[test]
#[serial]
fn test_global_set_and_get() {
    let set = global::set(AppName("demo".into()));
    let got = global::get::<AppName>().unwrap();
    assert!(Arc::ptr_eq(&set, &got));

    global().free().unwrap();
    assert!(global::get::<AppName>().unwrap_err().is_no_provider());
}

#[test]
#[serial]
fn test_new_scopes_are_children_of_global() {
    global::provide(Provider::scoped(|_| Ok(RequestId(7))));

    let request = Scope::new();
    let other = global::new();
    assert!(request.parent().unwrap().same_scope(global()));
    assert!(other.parent().unwrap().same_scope(global()));

    let id = request.get::<RequestId>().unwrap();
    assert_eq!(*id.read(), RequestId(7));
    assert!(request.has_instance::<RequestId>());
    assert!(!global().has_instance::<RequestId>());

    request.free().unwrap();
    global().free().unwrap();
}

#[test]
#[serial]
fn test_global_invoke_and_hydrate() {
    global::set_shared(scoped_deps::share(AppName("svc".into())));

    let results = global::invoke(|name: AppName, cell: Shared<AppName>| {
        cell.write().0.push_str("-v2");
        name.0
    })
    .unwrap();
    assert_eq!(results.get::<String>(0).map(String::as_str), Some("svc"));

    let mut names = vec![AppName::default()];
    global::hydrate(&mut names).unwrap();
    assert_eq!(names, vec![AppName("svc-v2".into())]);

    global().free().unwrap();
}
