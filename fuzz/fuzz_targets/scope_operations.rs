#![no_main]

use libfuzzer_sys::fuzz_target;
use scoped_deps::{hydrate_leaf, DiError, Lifetime, Provider, Scope, Shared};

#[derive(Clone, Default)]
struct Value(u8);
hydrate_leaf!(Value);

fn lifetime(byte: u8) -> Lifetime {
    match byte % 3 {
        0 => Lifetime::Forever,
        1 => Lifetime::Scope,
        _ => Lifetime::Once,
    }
}

// Drives a small scope tree through random registrations, resolutions,
// invocations and teardowns. Every operation must return, never panic.
fuzz_target!(|data: &[u8]| {
    let mut scopes = vec![Scope::root()];

    for op in data.chunks(2) {
        let (code, arg) = (op[0], op.get(1).copied().unwrap_or(0));
        let scope = scopes[arg as usize % scopes.len()].clone();

        match code % 8 {
            0 => {
                if scopes.len() < 16 {
                    scopes.push(scope.spawn());
                }
            }
            1 => {
                scope.set(Value(arg));
            }
            2 => {
                let fail = arg % 5 == 0;
                scope.provide(
                    Provider::new(lifetime(arg))
                        .create(move |_| if fail { Err(DiError::msg("create")) } else { Ok(Value(arg)) })
                        .on_free(move |_, _| if fail { Err(DiError::msg("free")) } else { Ok(()) }),
                );
            }
            3 => {
                let _ = scope.get::<Value>();
            }
            4 => {
                let _ = scope.invoke(|v: Value, r: Option<Shared<Value>>| (v.0, r.is_some()));
            }
            5 => {
                let mut values = vec![Value::default(); arg as usize % 4];
                let _ = scope.hydrate(&mut values);
            }
            6 => {
                let _ = scope.free_once();
            }
            _ => {
                let _ = scope.free();
            }
        }
    }

    for scope in scopes.iter().rev() {
        let _ = scope.free();
        assert_eq!(scope.instance_count(), 0);
    }
});
