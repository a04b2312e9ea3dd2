#![cfg(feature = "jit")]

use mast::jit::{self, JitExpression};
use mast::{
    compile, lower, parse, Backend, Bindings, CompileOptions, DecimalField, Expression, MastError,
    Mst, RealField,
};
use rust_decimal::Decimal;
use std::sync::Arc;

#[test]
fn test_scenario_compiles_to_native_code() {
    let tree = parse("x * 2 + 2 / x - 16 / sin(x)", &CompileOptions::default()).unwrap();
    let expression = jit::compile(&tree, &RealField::new(), &CompileOptions::default()).unwrap();

    let value = expression.invoke(&Bindings::from([("x", 2.0)])).unwrap();
    assert!((value - (5.0 - 16.0 / 2f64.sin())).abs() < 1e-12);

    // Only sin goes through the algebra; arithmetic is emitted inline.
    assert_eq!(expression.callback_count(), 1);
    let ir = expression.ir();
    assert!(ir.contains("fmul"));
    assert!(ir.contains("fdiv"));
    assert!(ir.contains("call"));
}

#[test]
fn test_variables_are_passed_in_first_use_order() {
    let tree = parse("y - x", &CompileOptions::default()).unwrap();
    let expression = jit::compile(&tree, &RealField::new(), &CompileOptions::default()).unwrap();
    let names: Vec<&str> = expression.variables().map(|s| s.name()).collect();
    assert_eq!(names, vec!["y", "x"]);

    let value = expression
        .invoke(&Bindings::from([("x", 1.0), ("y", 10.0)]))
        .unwrap();
    assert_eq!(value, 9.0);
}

#[test]
fn test_constant_expression_without_variables() {
    let tree = parse("2 * 3 + sqrt(16)", &CompileOptions::default()).unwrap();
    let expression = jit::compile(&tree, &RealField::new(), &CompileOptions::default()).unwrap();
    assert_eq!(expression.invoke(&Bindings::new()).unwrap(), 10.0);
}

#[test]
fn test_unbound_symbol() {
    let tree = parse("x + y", &CompileOptions::default()).unwrap();
    let expression = jit::compile(&tree, &RealField::new(), &CompileOptions::default()).unwrap();
    let err = expression.invoke(&Bindings::from([("x", 1.0)])).unwrap_err();
    assert_eq!(err, MastError::UnboundSymbol("y".to_string()));
}

#[test]
fn test_callback_errors_surface_as_results() {
    let algebra = Arc::new(Checked::new());
    let tree = Mst::unary("checked_sqrt", Mst::symbol("x")) + 1i64;

    let expression = compile(&tree, algebra, Backend::Jit, &CompileOptions::default()).unwrap();
    assert_eq!(expression.invoke(&Bindings::from([("x", 4.0)])).unwrap(), 3.0);

    let err = expression.invoke(&Bindings::from([("x", -4.0)])).unwrap_err();
    assert!(matches!(err, MastError::Domain(_)));

    // The fault cell is per call
    assert_eq!(expression.invoke(&Bindings::from([("x", 9.0)])).unwrap(), 4.0);
}

#[test]
fn test_arithmetic_is_inline_only_for_ieee_algebras() {
    let tree = parse("x * 2 + 1", &CompileOptions::default()).unwrap();
    let bindings = Bindings::from([("x", 3.0)]);

    let inline = jit::compile(&tree, &RealField::new(), &CompileOptions::default()).unwrap();
    assert_eq!(inline.callback_count(), 0);
    assert!(inline.ir().contains("fmul"));
    assert_eq!(inline.invoke(&bindings).unwrap(), 7.0);

    let called = jit::compile(&tree, &Checked::new(), &CompileOptions::default()).unwrap();
    assert_eq!(called.callback_count(), 2);
    assert!(!called.ir().contains("fmul"));
    assert!(!called.ir().contains("fadd"));
    assert_eq!(called.invoke(&bindings).unwrap(), 7.0);
}

#[test]
fn test_jit_rejects_non_f64_values() {
    let tree = parse("x + 1", &CompileOptions::default()).unwrap();
    let result = compile::<Decimal, _>(
        &tree,
        Arc::new(DecimalField::new()),
        Backend::Jit,
        &CompileOptions::default(),
    );
    assert!(matches!(result.err(), Some(MastError::Backend(_))));
}

#[test]
fn test_many_expressions_can_coexist() {
    let field = RealField::new();
    let expressions: Vec<JitExpression> = (1..=16)
        .map(|i| {
            let tree = Mst::symbol("x") * (i as i64);
            let program = lower(&tree, &field, &CompileOptions::default()).unwrap();
            JitExpression::new(&program).unwrap()
        })
        .collect();

    for (i, expression) in expressions.iter().enumerate() {
        let value = expression.invoke(&Bindings::from([("x", 2.0)])).unwrap();
        assert_eq!(value, 2.0 * (i + 1) as f64);
    }
}

/// A real algebra whose square root refuses negative input
struct Checked {
    operations: mast::OperationTable<f64>,
}

impl Checked {
    fn new() -> Self {
        Self {
            operations: mast::OperationTable::new()
                .with_ring(&mast::algebra::RealArithmetic)
                .with_unary("checked_sqrt", |a: f64| {
                    if a < 0.0 {
                        Err(MastError::Domain(format!("sqrt of {}", a)))
                    } else {
                        Ok(a.sqrt())
                    }
                }),
        }
    }
}

impl mast::Algebra<f64> for Checked {
    fn operations(&self) -> &mast::OperationTable<f64> {
        &self.operations
    }

    fn number(&self, value: mast::Number) -> mast::MastResult<f64> {
        Ok(value.as_f64())
    }
}
