#![no_main]

use libfuzzer_sys::fuzz_target;
use mast::{compile, parse, Backend, CompileOptions, RealField};
use std::sync::Arc;

fuzz_target!(|depth: u16| {
    let depth = (depth as usize % 512) + 1;

    let mut source = String::from("x");
    for _ in 0..depth {
        source = format!("({} + 1)", source);
    }

    if let Ok(tree) = parse(&source, &CompileOptions::default()) {
        let _ = compile(
            &tree,
            Arc::new(RealField::new()),
            Backend::Vm,
            &CompileOptions::default(),
        );
    }
});
