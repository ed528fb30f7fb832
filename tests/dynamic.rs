use scoped_deps::{hydrate_dynamic, share, DiError, DiResult, Dynamic, Instance, Key, Provider, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq)]
struct Repository {
    table: String,
}

impl Dynamic for Repository {
    fn provide_dynamic(&mut self, scope: &Scope) -> DiResult<()> {
        let table = scope.get::<String>()?;
        self.table = table.read().clone();
        Ok(())
    }
}
hydrate_dynamic!(Repository);

#[derive(Debug, Clone, Default)]
struct Broken;

impl Dynamic for Broken {
    fn provide_dynamic(&mut self, _scope: &Scope) -> DiResult<()> {
        Err(DiError::msg("cannot self-construct"))
    }
}
hydrate_dynamic!(Broken);

#[derive(Debug, Clone, Default)]
struct Services {
    users: Repository,
    count: u32,
}
hydrate_dynamic!(Services { users });

impl Dynamic for Services {
    fn provide_dynamic(&mut self, _scope: &Scope) -> DiResult<()> {
        self.count = 1;
        Ok(())
    }
}

#[test]
fn test_self_construction() {
    let scope = Scope::root();
    scope.set("users".to_string());

    let repo = scope.get_dynamic::<Repository>().unwrap();
    assert_eq!(repo.read().table, "users");

    // Never cached
    assert!(!scope.has_instance::<Repository>());
    let again = scope.get_dynamic::<Repository>().unwrap();
    assert!(!Arc::ptr_eq(&repo, &again));
}

#[test]
fn test_plain_get_has_no_capability() {
    let scope = Scope::root();
    scope.set("users".to_string());
    assert!(scope.get::<Repository>().unwrap_err().is_no_provider());
}

#[test]
fn test_provider_wins_over_self_construction() {
    let scope = Scope::root();
    scope.provide(Provider::forever(|_| Ok(Repository { table: "provided".into() })));
    assert_eq!(scope.get_dynamic::<Repository>().unwrap().read().table, "provided");
}

#[test]
fn test_self_construction_error_propagates() {
    let scope = Scope::root();
    let err = scope.get_dynamic::<Broken>().unwrap_err();
    assert_eq!(err.to_string(), "cannot self-construct");

    let mut slot = Broken;
    assert!(scope.hydrate(&mut slot).is_err());
}

#[test]
fn test_self_construction_through_hydration() {
    let scope = Scope::root();
    scope.set("orders".to_string());

    let mut services = Services::default();
    scope.hydrate(&mut services).unwrap();
    // Services constructs itself as a whole, so its fields are not visited
    assert_eq!(services.count, 1);
    assert_eq!(services.users.table, "");

    let repo = scope.hydrate_type::<Repository>().unwrap();
    assert_eq!(repo.table, "orders");
}

#[test]
fn test_dynamic_callback() {
    let asked = Arc::new(Mutex::new(Vec::new()));
    let log = asked.clone();

    let scope = Scope::root();
    scope.set_dynamic(move |key: &Key, _scope: &Scope| {
        log.lock().unwrap().push(key.name());
        if key.is::<u64>() {
            Ok(Some(share(64u64) as Instance))
        } else {
            Ok(None)
        }
    });

    assert_eq!(*scope.get::<u64>().unwrap().read(), 64);
    assert!(scope.get::<u32>().unwrap_err().is_no_provider());
    assert_eq!(asked.lock().unwrap().as_slice(), ["u64", "u32"]);

    // Dynamic results are not cached
    assert!(!scope.has_instance::<u64>());
}

#[test]
fn test_capability_tried_before_callback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let scope = Scope::root();
    scope.set("users".to_string());
    scope.set_dynamic(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some(share(Repository { table: "callback".into() }) as Instance))
    });

    assert_eq!(scope.get_dynamic::<Repository>().unwrap().read().table, "users");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(scope.get::<Repository>().unwrap().read().table, "callback");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ancestor_callback_tried_before_child_callback() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (root_log, child_log) = (order.clone(), order.clone());

    let root = Scope::root();
    root.set_dynamic(move |_, _| {
        root_log.lock().unwrap().push("root");
        Ok(None)
    });
    let child = root.spawn();
    child.set_dynamic(move |key, _| {
        child_log.lock().unwrap().push("child");
        Ok(key.is::<i8>().then(|| share(-1i8) as Instance))
    });

    assert_eq!(*child.get::<i8>().unwrap().read(), -1);
    assert_eq!(order.lock().unwrap().as_slice(), ["root", "child"]);

    // The root's own resolution never sees the child's callback
    assert!(root.get::<i8>().unwrap_err().is_no_provider());
}

#[test]
fn test_callback_value_of_wrong_type_is_ignored() {
    let scope = Scope::root();
    scope.set_dynamic(|_, _| Ok(Some(share("wrong") as Instance)));
    assert!(scope.get::<u16>().unwrap_err().is_no_provider());
}

#[test]
fn test_callback_error_propagates() {
    let scope = Scope::root();
    scope.set_dynamic(|_, _| Err(DiError::msg("registry offline")));
    assert_eq!(scope.get::<u16>().unwrap_err().to_string(), "registry offline");

    scope.clear_dynamic();
    assert!(scope.get::<u16>().unwrap_err().is_no_provider());
}

#[test]
fn test_callback_feeds_hydration() {
    let scope = Scope::root();
    scope.set_dynamic(|key, _| {
        if key.is::<String>() {
            Ok(Some(share(String::from("synthesized")) as Instance))
        } else {
            Ok(None)
        }
    });

    let mut names = vec![String::new(), String::new()];
    scope.hydrate(&mut names).unwrap();
    assert_eq!(names, ["synthesized", "synthesized"]);
}
