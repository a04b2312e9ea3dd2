use crate::mst::{ops, Number};
use crate::{parse, CompileOptions, MastError, Mst};

fn parse_default(source: &str) -> Mst {
    parse(source, &CompileOptions::default()).unwrap()
}

fn x() -> Mst {
    Mst::symbol("x")
}

#[test]
fn test_parse_scenario_matches_builders() {
    let parsed = parse_default("x * 2 + 2 / x - 16 / sin(x)");
    let built = x() * 2i64 + 2i64 / x() - 16i64 / x().sin();
    assert_eq!(parsed, built);
}

#[test]
fn test_integer_and_real_literals() {
    assert_eq!(parse_default("42"), Mst::Numeric(Number::Integer(42)));
    assert_eq!(parse_default("2.5"), Mst::Numeric(Number::Real(2.5)));
    assert_eq!(parse_default("1e3"), Mst::Numeric(Number::Real(1000.0)));
    assert_eq!(parse_default("1.5E-1"), Mst::Numeric(Number::Real(0.15)));
}

#[test]
fn test_integer_overflow_becomes_real() {
    let parsed = parse_default("99999999999999999999");
    assert_eq!(parsed, Mst::Numeric(Number::Real(99999999999999999999.0)));
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    assert_eq!(parse_default("1 + 2 * x"), 1i64 + 2i64 * x());
    assert_eq!(parse_default("(1 + 2) * x"), (Mst::number(1i64) + 2i64) * x());
}

#[test]
fn test_operators_are_left_associative() {
    assert_eq!(parse_default("x - 1 - 2"), x() - 1i64 - 2i64);
    assert_eq!(parse_default("x / 2 / 3"), x() / 2i64 / 3i64);
}

#[test]
fn test_power_is_right_associative() {
    let expected = x().pow(Mst::number(2i64).pow(3i64));
    assert_eq!(parse_default("x ^ 2 ^ 3"), expected);
}

#[test]
fn test_power_binds_tighter_than_negation() {
    assert_eq!(parse_default("-x ^ 2"), -(x().pow(2i64)));
    assert_eq!(parse_default("x ^ -2"), x().pow(-Mst::number(2i64)));
}

#[test]
fn test_prefix_signs() {
    assert_eq!(parse_default("--x"), -(-x()));
    assert_eq!(parse_default("+x"), Mst::unary(ops::PLUS, x()));
    assert_eq!(parse_default("2 * -x"), 2i64 * -x());
}

#[test]
fn test_calls_choose_arity_from_argument_count() {
    assert_eq!(parse_default("ln(x)"), Mst::unary("ln", x()));
    assert_eq!(
        parse_default("atan2(x, 1)"),
        Mst::binary("atan2", x(), Mst::number(1i64))
    );
    assert_eq!(parse_default("pow(x, 2)"), x().pow(2i64));
}

#[test]
fn test_call_with_three_arguments_is_rejected() {
    let err = parse("f(1, 2, 3)", &CompileOptions::default()).unwrap_err();
    match err {
        MastError::Parse(details) => {
            assert!(details.message.contains("3 arguments"));
            assert!(details.suggestion.is_some());
        }
        other => panic!("Expected parse error, got {:?}", other),
    }
}

#[test]
fn test_display_reparses_to_same_tree() {
    let sources = [
        "x * 2 + 2 / x - 16 / sin(x)",
        "(x + 1) * (x - 1)",
        "x - (y - z)",
        "-(x + 1) ^ 2",
        "x ^ 2 ^ 3",
        "(x ^ 2) ^ 3",
        "atan2(x, y) / 2.5",
    ];
    for source in sources {
        let tree = parse_default(source);
        let reparsed = parse_default(&tree.to_string());
        assert_eq!(tree, reparsed, "round trip of {}", source);
    }
}

#[test]
fn test_syntax_error_reports_position() {
    let err = parse("x * * 2", &CompileOptions::default()).unwrap_err();
    match err {
        MastError::Parse(details) => {
            assert_eq!(details.span.line, 1);
            assert!(details.span.col > 2);
            assert_eq!(details.span.start + 1, details.span.col);
            assert_eq!(details.source_id, "<input>");
        }
        other => panic!("Expected parse error, got {:?}", other),
    }
}

#[test]
fn test_empty_input_is_a_parse_error() {
    let err = parse("", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, MastError::Parse(_)));
}

#[test]
fn test_source_size_limit() {
    let options = CompileOptions {
        max_source_bytes: 10,
        ..CompileOptions::default()
    };
    let err = parse("x + x + x + x + x", &options).unwrap_err();
    match err {
        MastError::ResourceLimitExceeded { limit_name, .. } => {
            assert_eq!(limit_name, "max_source_bytes");
        }
        other => panic!("Expected ResourceLimitExceeded, got {:?}", other),
    }
}

#[test]
fn test_nesting_limit() {
    let options = CompileOptions {
        max_expression_depth: 8,
        ..CompileOptions::default()
    };
    let source = format!("{}x{}", "(".repeat(20), ")".repeat(20));
    let err = parse(&source, &options).unwrap_err();
    assert!(matches!(err, MastError::ResourceLimitExceeded { .. }));
}

#[test]
fn test_long_sum_exceeds_depth_limit() {
    let options = CompileOptions {
        max_expression_depth: 16,
        ..CompileOptions::default()
    };
    let source = vec!["x"; 40].join(" + ");
    let err = parse(&source, &options).unwrap_err();
    match err {
        MastError::ResourceLimitExceeded { limit_name, .. } => {
            assert_eq!(limit_name, "max_expression_depth");
        }
        other => panic!("Expected ResourceLimitExceeded, got {:?}", other),
    }
}
