#![no_main]

use libfuzzer_sys::fuzz_target;
use mast::{compile, evaluate, parse, Backend, Bindings, CompileOptions, RealField};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let options = CompileOptions::default();
    let Ok(tree) = parse(s, &options) else {
        return;
    };

    let field = Arc::new(RealField::new());
    let bindings = Bindings::from([("x", 1.5), ("y", -2.0)]);
    let reference = evaluate(&tree, field.as_ref(), &bindings);

    for backend in [Backend::Closure, Backend::Vm] {
        let Ok(expression) = compile(&tree, field.clone(), backend, &options) else {
            continue;
        };
        match (expression.invoke(&bindings), &reference) {
            (Ok(a), Ok(b)) => assert!(a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())),
            (Err(_), Err(_)) => {}
            (a, b) => panic!("{} disagrees: {:?} vs {:?}", backend, a, b),
        }
    }
});
