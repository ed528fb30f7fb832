use scoped_deps::{share, DiError, Instance, Key, Lifetime, Provider, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
struct Config {
    port: u16,
}

#[derive(Debug, Clone, Default)]
struct Server {
    port: u16,
    name: String,
}

#[test]
fn test_constant_is_identity_stable() {
    let scope = Scope::root();
    let set = scope.set(Config { port: 8080 });

    let first = scope.get::<Config>().unwrap();
    let second = scope.get::<Config>().unwrap();

    assert!(Arc::ptr_eq(&set, &first));
    assert!(Arc::ptr_eq(&first, &second)); // Same instance
    assert_eq!(first.read().port, 8080);
}

#[test]
fn test_set_overwrites_cached_value() {
    let scope = Scope::root();
    scope.provide(Provider::forever(|_| Ok(Config { port: 1 })));
    assert_eq!(scope.get::<Config>().unwrap().read().port, 1);

    scope.set(Config { port: 2 });
    assert_eq!(scope.get::<Config>().unwrap().read().port, 2);
}

#[test]
fn test_set_shared_hands_out_the_same_cell() {
    let scope = Scope::root();
    let cell = share(Config { port: 9 });
    scope.set_shared(cell.clone());

    let resolved = scope.get::<Config>().unwrap();
    assert!(Arc::ptr_eq(&cell, &resolved));

    cell.write().port = 10;
    assert_eq!(resolved.read().port, 10);
}

#[test]
fn test_set_instance_validates_shape() {
    let scope = Scope::root();

    let good: Instance = share(Config { port: 1 });
    scope.set_instance(Key::of::<Config>(), good).unwrap();
    assert!(scope.has_instance::<Config>());

    let bare: Instance = Arc::new(Config { port: 1 });
    let err = scope.set_instance(Key::of::<Config>(), bare).unwrap_err();
    assert!(matches!(err, DiError::NotPointer(name) if name.ends_with("Config")));

    let mismatched: Instance = share(5u8);
    assert!(scope.set_instance(Key::of::<Config>(), mismatched).is_err());
}

#[test]
fn test_factory_with_dependencies() {
    let scope = Scope::root();
    scope.set(Config { port: 8080 });
    scope.provide(Provider::forever(|scope| {
        let config = scope.get::<Config>()?;
        let port = config.read().port;
        Ok(Server {
            port,
            name: "MyServer".to_string(),
        })
    }));

    let server = scope.get::<Server>().unwrap();
    assert_eq!(server.read().port, 8080);
    assert_eq!(server.read().name, "MyServer");
}

#[test]
fn test_providers_are_lazy_and_cached() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let scope = Scope::root();
    scope.provide(Provider::forever(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Config::default())
    }));
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let a = scope.get::<Config>().unwrap();
    let b = scope.get::<Config>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_provider() {
    let scope = Scope::root();
    let err = scope.get::<Server>().unwrap_err();
    assert!(err.is_no_provider());
    assert!(err.to_string().contains("Server"));
    assert!(!scope.contains::<Server>());
}

#[test]
fn test_missing_create() {
    let scope = Scope::root();
    scope.provide(Provider::<Config>::new(Lifetime::Scope));

    assert!(matches!(scope.get::<Config>(), Err(DiError::MissingCreate(_))));
    assert!(!scope.has_instance::<Config>());
}

#[test]
fn test_create_errors_surface_unchanged() {
    let scope = Scope::root();
    scope.provide(Provider::<Config>::forever(|_| Err(DiError::msg("disk on fire"))));

    let err = scope.get::<Config>().unwrap_err();
    assert_eq!(err.to_string(), "disk on fire");
    assert!(!scope.has_instance::<Config>());
}

#[test]
fn test_reregistration_replaces_without_freeing() {
    let freed = Arc::new(AtomicUsize::new(0));
    let freed_hook = freed.clone();

    let scope = Scope::root();
    scope.provide(Provider::scoped(|_| Ok(Config { port: 1 })).on_free(move |_, _| {
        freed_hook.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    let old = scope.get::<Config>().unwrap();

    scope.provide(Provider::scoped(|_| Ok(Config { port: 2 })));
    assert_eq!(freed.load(Ordering::SeqCst), 0);

    // The cached instance survives re-registration
    let still = scope.get::<Config>().unwrap();
    assert!(Arc::ptr_eq(&old, &still));
    assert_eq!(still.read().port, 1);
}

#[test]
fn test_contains_walks_ancestors() {
    let root = Scope::root();
    root.provide(Provider::scoped(|_| Ok(Config::default())));
    let child = root.spawn();

    assert!(child.contains::<Config>());
    assert!(!child.has_provider::<Config>());
    assert!(root.has_provider::<Config>());
    assert!(!child.contains::<Server>());
}

#[test]
fn test_erased_resolve() {
    let scope = Scope::root();
    scope.set(Config { port: 3 });

    let instance = scope.resolve(&Key::of::<Config>()).unwrap();
    assert!(Key::of::<Config>().accepts(&*instance));
    let typed = scoped_deps::downcast::<Config>(instance).unwrap();
    assert_eq!(typed.read().port, 3);
}

#[test]
fn test_scope_tree_navigation() {
    let root = Scope::root();
    let child = root.spawn();
    let grandchild = child.spawn();

    assert!(root.is_root());
    assert!(root.parent().is_none());
    assert!(grandchild.parent().unwrap().same_scope(&child));
    assert!(child.parent().unwrap().same_scope(&root));
    assert_ne!(child.id(), grandchild.id());
}
