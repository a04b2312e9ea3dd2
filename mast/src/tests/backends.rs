use crate::algebra::{Algebra, OperationTable, RealField};
use crate::backend::vm::{scratch_capacity, Instruction};
use crate::backend::{ClosureExpression, VmExpression};
use crate::{
    lower, parse, Bindings, CompileOptions, Expression, MastError, MastResult, Mst, Number, Program,
};
use std::sync::Arc;
use std::thread;

fn program(source: &str) -> Program<f64> {
    let tree = parse(source, &CompileOptions::default()).unwrap();
    lower(&tree, &RealField::new(), &CompileOptions::default()).unwrap()
}

#[test]
fn test_instructions_mirror_program_steps() {
    let program = program("x * 2 + 1");
    let vm = VmExpression::new(&program).unwrap();
    assert_eq!(vm.code().len(), program.steps().len());
    assert!(matches!(vm.code()[0], Instruction::Load { target: 0, variable: 0 }));
    assert!(matches!(vm.code().last(), Some(Instruction::Binary { .. })));
}

#[test]
fn test_functions_are_deduplicated_by_name() {
    let program = program("sin(x) + sin(y) + sin(z)");
    let vm = VmExpression::new(&program).unwrap();
    let listing = vm.disassemble();
    assert!(listing.contains("u0 = sin"));
    assert!(!listing.contains("u1"));
    assert!(listing.contains("b0 = +"));
    assert!(listing.contains("v2 = z"));
}

#[test]
fn test_register_files_are_reused() {
    let vm = VmExpression::new(&program("x * x + 1")).unwrap();
    for value in 0..10 {
        let x = value as f64;
        let result = vm.invoke(&Bindings::from([("x", x)])).unwrap();
        assert_eq!(result, x * x + 1.0);
    }
    // One file per thread, parked between calls with room for every register
    let capacity = scratch_capacity::<f64>().unwrap();
    assert!(capacity >= vm.code().len());
}

#[test]
fn test_failed_call_leaves_no_stale_registers() {
    let vm = VmExpression::new(&program("x + y")).unwrap();
    assert_eq!(vm.invoke(&Bindings::from([("x", 1.0), ("y", 2.0)])).unwrap(), 3.0);

    let err = vm.invoke(&Bindings::from([("x", 1.0)])).unwrap_err();
    assert_eq!(err, MastError::UnboundSymbol("y".to_string()));

    // A later call on a larger program still starts from empty registers
    let larger = VmExpression::new(&program("x * 2 + y * 3 - 1")).unwrap();
    let err = larger.invoke(&Bindings::from([("x", 1.0)])).unwrap_err();
    assert_eq!(err, MastError::UnboundSymbol("y".to_string()));
    assert!(scratch_capacity::<f64>().is_some());
}

/// Real arithmetic plus `nested`, which evaluates another VM expression
struct Nesting {
    operations: OperationTable<f64>,
}

impl Algebra<f64> for Nesting {
    fn operations(&self) -> &OperationTable<f64> {
        &self.operations
    }

    fn number(&self, value: Number) -> MastResult<f64> {
        Ok(value.as_f64())
    }
}

#[test]
fn test_invocation_from_inside_an_operation() {
    let inner = Arc::new(VmExpression::new(&program("t * 10 + 1")).unwrap());
    let algebra = Nesting {
        operations: OperationTable::new()
            .with_extended_field(&crate::algebra::RealArithmetic)
            .with_unary("nested", move |t: f64| inner.invoke(&Bindings::from([("t", t)]))),
    };

    let tree = parse("nested(x) + x * 2", &CompileOptions::default()).unwrap();
    let program = lower(&tree, &algebra, &CompileOptions::default()).unwrap();
    let outer = VmExpression::new(&program).unwrap();
    for x in [0.0, 1.5, -3.0] {
        let value = outer.invoke(&Bindings::from([("x", x)])).unwrap();
        assert_eq!(value, x * 10.0 + 1.0 + x * 2.0);
    }
}

#[test]
fn test_concurrent_invocations_do_not_interfere() {
    let vm = Arc::new(VmExpression::new(&program("x * 3 - y")).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let vm = Arc::clone(&vm);
            thread::spawn(move || {
                let x = i as f64;
                for _ in 0..200 {
                    let result = vm.invoke(&Bindings::from([("x", x), ("y", 1.0)])).unwrap();
                    assert_eq!(result, x * 3.0 - 1.0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_closure_memoizes_shared_slots_per_call() {
    let tree = Mst::symbol("x").exp();
    let tree = tree.clone() * tree;
    let program = lower(&tree, &RealField::new(), &CompileOptions::default()).unwrap();
    let closure = ClosureExpression::new(&program).unwrap();
    assert_eq!(closure.memo_size, 1);

    let first = closure.invoke(&Bindings::from([("x", 1.0)])).unwrap();
    let second = closure.invoke(&Bindings::from([("x", 2.0)])).unwrap();
    assert_eq!(first, 1f64.exp() * 1f64.exp());
    assert_eq!(second, 2f64.exp() * 2f64.exp());
}

#[test]
fn test_malformed_program_is_rejected() {
    let mut steps = program("x + 1").steps().to_vec();
    steps.remove(0);
    let broken = Program::from_steps(steps, 2);
    assert!(ClosureExpression::new(&broken).is_err());
}
