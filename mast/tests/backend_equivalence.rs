use mast::{
    compile, evaluate, parse, Algebra, Backend, Bindings, CompileOptions, Expression, MastError,
    MastResult, Mst, Number, OperationTable, RealField,
};
use std::sync::Arc;

fn backends() -> Vec<Backend> {
    let mut backends = vec![Backend::Interpreter, Backend::Closure, Backend::Vm];
    if cfg!(feature = "jit") {
        backends.push(Backend::Jit);
    }
    backends
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

fn run(tree: &Mst, backend: Backend, bindings: &Bindings<f64>) -> Result<f64, MastError> {
    compile(tree, Arc::new(RealField::new()), backend, &CompileOptions::default())?.invoke(bindings)
}

#[test]
fn test_scenario_matches_direct_computation() {
    let x = Mst::symbol("x");
    let tree = x.clone() * 2.0 + 2.0 / x.clone() - 16.0 / x.sin();
    let expected = 5.0 - 16.0 / 2f64.sin();

    for backend in backends() {
        let value = run(&tree, backend, &Bindings::from([("x", 2.0)])).unwrap();
        assert!(
            (value - expected).abs() < 1e-12,
            "{} gave {}, expected {}",
            backend,
            value,
            expected
        );
    }
}

#[test]
fn test_scenario_repeated_invocations() {
    let tree = parse("x * 2 + 2 / x - 16 / sin(x)", &CompileOptions::default()).unwrap();
    let field = RealField::new();

    for backend in backends() {
        let expression =
            compile(&tree, Arc::new(RealField::new()), backend, &CompileOptions::default())
                .unwrap();
        let mut x = 0.1;
        for _ in 0..1000 {
            let bindings = Bindings::from([("x", x)]);
            let reference = evaluate(&tree, &field, &bindings).unwrap();
            let value = expression.invoke(&bindings).unwrap();
            assert!(same(value, reference), "{} differs at x = {}", backend, x);
            x += 0.37;
        }
    }
}

#[test]
fn test_backends_agree_on_a_range_of_formulas() {
    let sources = [
        "x",
        "42",
        "-x",
        "x ^ 3 - 2 * x ^ 2 + x - 1",
        "sqrt(x * x + y * y)",
        "exp(-x ^ 2 / 2) / sqrt(2 * pi)",
        "sinh(x) / cosh(x) - tanh(x)",
        "ln(x) + e",
        "atan(y / x) * 180 / pi",
        "(x + y) * (x + y) / (x - y)",
        "1 / (x - x)",
        "acos(x * 10)",
    ];
    let field = RealField::new();
    for source in sources {
        let tree = parse(source, &CompileOptions::default()).unwrap();
        for (x, y) in [(0.5, 1.5), (-2.0, 3.25), (10.0, -0.125)] {
            let bindings = Bindings::from([("x", x), ("y", y)]);
            let reference = evaluate(&tree, &field, &bindings).unwrap();
            for backend in backends() {
                let value = run(&tree, backend, &bindings).unwrap();
                assert!(
                    same(value, reference),
                    "{} on '{}' gave {} instead of {}",
                    backend,
                    source,
                    value,
                    reference
                );
            }
        }
    }
}

#[test]
fn test_unbound_symbol_reported_by_every_backend() {
    let tree = parse("x + y", &CompileOptions::default()).unwrap();
    for backend in backends() {
        let err = run(&tree, backend, &Bindings::from([("x", 1.0)])).unwrap_err();
        assert_eq!(
            err,
            MastError::UnboundSymbol("y".to_string()),
            "backend {}",
            backend
        );
    }
}

#[test]
fn test_unsupported_operation_reported_by_every_backend() {
    let tree = Mst::binary("%%", Mst::symbol("x"), Mst::symbol("x"));
    for backend in backends() {
        let err = run(&tree, backend, &Bindings::from([("x", 1.0)])).unwrap_err();
        assert_eq!(err.operation(), Some("%%"), "backend {}", backend);
    }
}

#[test]
fn test_compiled_backends_fail_before_invocation() {
    let tree = Mst::binary("%%", Mst::symbol("x"), Mst::symbol("x"));
    let field = Arc::new(RealField::new());

    let interpreted = compile(&tree, field.clone(), Backend::Interpreter, &CompileOptions::default());
    assert!(interpreted.is_ok());

    let mut compiled_backends = vec![Backend::Closure, Backend::Vm];
    if cfg!(feature = "jit") {
        compiled_backends.push(Backend::Jit);
    }
    for backend in compiled_backends {
        let compiled = compile(&tree, field.clone(), backend, &CompileOptions::default());
        assert_eq!(
            compiled.err().and_then(|err| err.operation().map(str::to_string)),
            Some("%%".to_string()),
            "backend {}",
            backend
        );
    }
}

#[test]
fn test_unsupported_operation_outranks_unbound_symbol() {
    let tree = Mst::binary(
        "+",
        Mst::symbol("y"),
        Mst::unary("%%", Mst::symbol("x")),
    );
    let bindings = Bindings::from([("x", 1.0)]);

    let reference = evaluate(&tree, &RealField::new(), &bindings).unwrap_err();
    assert_eq!(reference.operation(), Some("%%"));
    for backend in backends() {
        let err = run(&tree, backend, &bindings).unwrap_err();
        assert_eq!(err, reference, "backend {}", backend);
    }
}

/// Max-plus semiring over `f64`: `+` is max, `*` is addition
struct Tropical {
    operations: OperationTable<f64>,
}

impl Tropical {
    fn new() -> Self {
        Self {
            operations: OperationTable::new()
                .with_binary("+", |a: f64, b: f64| Ok(a.max(b)))
                .with_binary("*", |a: f64, b: f64| Ok(a + b))
                .with_binary("/", |a: f64, b: f64| {
                    if b == 0.0 {
                        Err(MastError::Domain("division by zero".to_string()))
                    } else {
                        Ok(a - b)
                    }
                })
                .with_unary("-", |a: f64| Ok(-a))
                .with_unary("sqrt", |a: f64| Ok(a / 2.0)),
        }
    }
}

impl Algebra<f64> for Tropical {
    fn operations(&self) -> &OperationTable<f64> {
        &self.operations
    }

    fn number(&self, value: Number) -> MastResult<f64> {
        Ok(value.as_f64())
    }
}

#[test]
fn test_custom_f64_algebra_is_respected_by_every_backend() {
    let algebra = Arc::new(Tropical::new());
    let tree = parse("x + y * 2", &CompileOptions::default()).unwrap();
    for backend in backends() {
        let expression =
            compile(&tree, algebra.clone(), backend, &CompileOptions::default()).unwrap();
        let value = expression
            .invoke(&Bindings::from([("x", 5.0), ("y", 1.0)]))
            .unwrap();
        assert_eq!(value, 5.0, "backend {}", backend);
    }

    let sources = ["x + y * 2", "x / y", "sqrt(x * y) + x", "-x * y", "(x + 1) / (y * 0)"];
    for source in sources {
        let tree = parse(source, &CompileOptions::default()).unwrap();
        for (x, y) in [(5.0, 1.0), (5.0, 0.0), (-2.0, 3.5)] {
            let bindings = Bindings::from([("x", x), ("y", y)]);
            let reference = evaluate(&tree, algebra.as_ref(), &bindings);
            for backend in backends() {
                let result = compile(&tree, algebra.clone(), backend, &CompileOptions::default())
                    .and_then(|expression| expression.invoke(&bindings));
                assert_eq!(
                    result, reference,
                    "{} on '{}' at x = {}, y = {}",
                    backend, source, x, y
                );
            }
        }
    }
}

#[test]
fn test_named_constants_and_overrides() {
    let tree = parse("2 * pi", &CompileOptions::default()).unwrap();
    for backend in backends() {
        let value = run(&tree, backend, &Bindings::new()).unwrap();
        assert_eq!(value, 2.0 * std::f64::consts::PI);
        let value = run(&tree, backend, &Bindings::from([("pi", 3.0)])).unwrap();
        assert_eq!(value, 6.0);
    }
}

#[test]
fn test_extra_bindings_are_ignored() {
    let tree = parse("x + 1", &CompileOptions::default()).unwrap();
    let bindings = Bindings::from([("x", 1.0), ("unused", 99.0)]);
    for backend in backends() {
        assert_eq!(run(&tree, backend, &bindings).unwrap(), 2.0);
    }
}

#[test]
fn test_shared_expression_across_threads() {
    let tree = parse("x * x - 3 * x + 2", &CompileOptions::default()).unwrap();
    for backend in backends() {
        let expression: Arc<dyn Expression<f64>> =
            compile(&tree, Arc::new(RealField::new()), backend, &CompileOptions::default())
                .unwrap();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let expression = Arc::clone(&expression);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let x = (t * 1000 + i) as f64;
                        let value = expression.invoke(&Bindings::from([("x", x)])).unwrap();
                        assert_eq!(value, x * x - 3.0 * x + 2.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

#[test]
fn test_function_as_expression() {
    let square = |bindings: &Bindings<f64>| -> mast::MastResult<f64> {
        let x = bindings
            .get("x")
            .copied()
            .ok_or_else(|| MastError::UnboundSymbol("x".to_string()))?;
        Ok(x * x)
    };
    assert_eq!(square.invoke(&Bindings::from([("x", 3.0)])).unwrap(), 9.0);
}
