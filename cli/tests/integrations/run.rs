use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn mast() -> Command {
    Command::cargo_bin("mast").unwrap()
}

#[test]
fn test_eval_scenario() {
    mast()
        .args(["eval", "x * 2 + 2 / x - 16 / sin(x)", "x=2", "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("-12.5"));
}

#[test]
fn test_eval_on_every_backend() {
    let mut backends = vec!["interpreter", "closure", "vm"];
    if cfg!(feature = "jit") {
        backends.push("jit");
    }
    for backend in backends {
        mast()
            .args(["eval", "x * x + y", "x=3", "y=1", "--backend", backend, "--raw"])
            .assert()
            .success()
            .stdout("10\n");
    }
}

#[test]
fn test_eval_shows_bindings_table() {
    mast()
        .args(["eval", "price * qty", "price=2.5", "qty=4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("price"))
        .stdout(predicate::str::contains("qty"))
        .stdout(predicate::str::contains("= 10"));
}

#[test]
fn test_eval_decimal_is_exact() {
    mast()
        .args(["eval", "a + b", "a=0.1", "b=0.2", "--algebra", "decimal", "--raw"])
        .assert()
        .success()
        .stdout("0.3\n");
}

#[test]
fn test_eval_named_constant() {
    mast()
        .args(["eval", "cos(pi)", "--raw"])
        .assert()
        .success()
        .stdout("-1\n");
}

#[test]
fn test_eval_unbound_symbol() {
    mast()
        .args(["eval", "x + y", "x=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unbound symbol"))
        .stderr(predicate::str::contains("'y'"));
}

#[test]
fn test_eval_unsupported_operation() {
    mast()
        .args(["eval", "sin(x)", "x=1", "--algebra", "decimal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported operation"))
        .stderr(predicate::str::contains("'sin'"));
}

#[test]
fn test_eval_parse_error_is_rendered() {
    mast()
        .args(["eval", "x * * 2", "x=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn test_eval_invalid_binding() {
    mast()
        .args(["eval", "x + 1", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected name=value"));
}

#[test]
fn test_eval_unknown_backend() {
    mast()
        .args(["eval", "x + 1", "x=1", "--backend", "gpu"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown backend 'gpu'"));
}

#[test]
fn test_eval_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let formula = temp_dir.path().join("formula.txt");
    fs::write(&formula, "x ^ 2 - 1\n").unwrap();

    mast()
        .arg("eval")
        .arg("--file")
        .arg(&formula)
        .arg("x=3")
        .arg("--raw")
        .assert()
        .success()
        .stdout("8\n");
}

#[test]
fn test_eval_from_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    mast()
        .arg("eval")
        .arg("--file")
        .arg(temp_dir.path().join("missing.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_eval_depth_limit() {
    let source = format!("{}x{}", "(".repeat(20), ")".repeat(20));
    mast()
        .args(["eval", &source, "x=1", "--max-depth", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_expression_depth"));
}

#[test]
fn test_compile_vm_listing() {
    mast()
        .args(["compile", "x * 2 + sin(x)", "--backend", "vm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vm backend"))
        .stdout(predicate::str::contains("u0 = sin"))
        .stdout(predicate::str::contains("ret"));
}

#[test]
fn test_compile_closure_listing() {
    mast()
        .args(["compile", "x * 2 + 3 * 4", "--backend", "closure"])
        .assert()
        .success()
        .stdout(predicate::str::contains("load x"))
        .stdout(predicate::str::contains("const 12"))
        .stdout(predicate::str::contains("return"));
}

#[test]
fn test_compile_unoptimized_keeps_constants_apart() {
    mast()
        .args(["compile", "3 * 4", "--backend", "closure", "--no-optimize"])
        .assert()
        .success()
        .stdout(predicate::str::contains("const 3"))
        .stdout(predicate::str::contains("const 4"));
}

#[cfg(feature = "jit")]
#[test]
fn test_compile_jit_shows_ir() {
    mast()
        .args(["compile", "x * 2 + 2 / x", "--backend", "jit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fmul"))
        .stdout(predicate::str::contains("fdiv"));
}

#[cfg(feature = "jit")]
#[test]
fn test_compile_jit_rejects_decimal() {
    mast()
        .args(["compile", "x + 1", "--backend", "jit", "--algebra", "decimal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("real algebra"));
}

#[test]
fn test_tree_view() {
    mast()
        .args(["tree", "x * 2 + 1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("└─ +"))
        .stdout(predicate::str::contains("├─ *"));
}

#[test]
fn test_tree_json() {
    let output = mast().args(["tree", "sqrt(x)", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json.get("Unary").is_some());
}

#[test]
fn test_bench_lists_every_backend() {
    mast()
        .args(["bench", "x * 2 + sin(x)", "x=1", "-n", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("interpreter"))
        .stdout(predicate::str::contains("closure"))
        .stdout(predicate::str::contains("vm"))
        .stdout(predicate::str::contains("jit"))
        .stdout(predicate::str::contains("10 invocations each"));
}

#[test]
fn test_bench_reports_backends_that_fail() {
    mast()
        .args(["bench", "x + 1", "x=1", "--algebra", "decimal", "-n", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backend error"));
}
