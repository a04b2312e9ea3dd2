mod error_formatter;
mod formatter;
mod server;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use formatter::{BenchRow, Formatter};
use mast::{
    compile, lower, Algebra, Backend, Bindings, CompileOptions, DecimalField, Expression, Mst,
    RealField, Value,
};
use mast::parser::parse_named;
use rust_decimal::Decimal;
use std::fmt::Display;
use std::fs;
use std::hint::black_box;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "mast")]
#[command(about = "Build an expression once, evaluate it many times.")]
#[command(
    long_about = "mast turns infix formulas into symbolic trees and compiles them against an algebra.\nThe CLI evaluates formulas on a chosen backend, shows what each backend compiles to, compares backend speed, or serves evaluations over HTTP."
)]
#[command(version)]
struct Cli {
    /// Log compilation details to stderr (filter with RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AlgebraKind {
    /// 64-bit floating point with the full set of functions
    Real,
    /// Exact decimals; no trigonometry
    Decimal,
}

#[derive(Args, Clone)]
struct Source {
    /// Formula to evaluate, e.g. "x * 2 + sin(x)"
    #[arg(value_name = "EXPRESSION", required_unless_present = "file")]
    expression: Option<String>,

    /// Read the formula from a file instead
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,
}

struct Input {
    name: String,
    text: String,
    bindings: Vec<String>,
}

impl Source {
    fn read(&self, bindings: &[String]) -> Result<Input> {
        match &self.file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                // With --file every positional argument is a binding
                let bindings = self.expression.iter().chain(bindings).cloned().collect();
                Ok(Input {
                    name: path.to_string_lossy().to_string(),
                    text: text.trim().to_string(),
                    bindings,
                })
            }
            None => {
                let text = self.expression.clone().context("No expression given")?;
                Ok(Input {
                    name: "expression".to_string(),
                    text,
                    bindings: bindings.to_vec(),
                })
            }
        }
    }
}

#[derive(Args, Clone)]
struct Compilation {
    /// Backend: interpreter, closure, vm or jit
    #[arg(short, long, default_value = "vm")]
    backend: Backend,

    /// Number type the formula is evaluated in
    #[arg(short, long, value_enum, default_value = "real")]
    algebra: AlgebraKind,

    /// Disable constant folding and subtree sharing
    #[arg(long)]
    no_optimize: bool,

    /// Maximum nesting depth of the formula
    #[arg(long, default_value = "256")]
    max_depth: usize,
}

impl Compilation {
    fn options(&self) -> CompileOptions {
        let base = if self.no_optimize {
            CompileOptions::unoptimized()
        } else {
            CompileOptions::default()
        };
        CompileOptions {
            max_expression_depth: self.max_depth,
            ..base
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula with variable bindings
    ///
    /// Bindings use name=value syntax. Unbound names fall back to constants of the
    /// algebra (pi, e).
    ///
    /// Examples:
    ///   mast eval "x * 2 + 2 / x - 16 / sin(x)" x=2
    ///   mast eval "price * qty" price=19.99 qty=3 --algebra decimal
    Eval {
        #[command(flatten)]
        source: Source,
        /// Variable bindings (format: name=value)
        bindings: Vec<String>,
        #[command(flatten)]
        compilation: Compilation,
        /// Output the value only (for piping to other tools)
        #[arg(short = 'r', long)]
        raw: bool,
    },
    /// Show what a backend compiles a formula into
    ///
    /// Prints the lowered step listing for the closure backend, the instruction
    /// listing for the vm backend and the Cranelift IR for the jit backend.
    Compile {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        compilation: Compilation,
    },
    /// Show the symbolic tree of a formula
    Tree {
        #[command(flatten)]
        source: Source,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Time repeated evaluation on every backend
    Bench {
        #[command(flatten)]
        source: Source,
        /// Variable bindings (format: name=value)
        bindings: Vec<String>,
        /// Number type the formula is evaluated in
        #[arg(short, long, value_enum, default_value = "real")]
        algebra: AlgebraKind,
        /// Invocations per backend
        #[arg(short = 'n', long, default_value = "100000")]
        iterations: usize,
    },
    /// Start HTTP REST API server (default: localhost:3000)
    ///
    /// API: POST /evaluate with {expression, bindings, backend}, GET /health
    Server {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port number to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Number of compiled expressions kept in memory (0 disables caching)
        #[arg(long, default_value = "1024")]
        cache_size: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        init_logging("mast=debug");
    }

    let result = match &cli.command {
        Commands::Eval {
            source,
            bindings,
            compilation,
            raw,
        } => eval_command(source, bindings, compilation, *raw),
        Commands::Compile {
            source,
            compilation,
        } => compile_command(source, compilation),
        Commands::Tree { source, json } => tree_command(source, *json),
        Commands::Bench {
            source,
            bindings,
            algebra,
            iterations,
        } => bench_command(source, bindings, *algebra, *iterations),
        Commands::Server {
            host,
            port,
            cache_size,
        } => server_command(host, *port, *cache_size, cli.verbose),
    };

    if let Err(e) = result {
        // Render MastError with source context, otherwise use default
        if let Some(mast_err) = e.downcast_ref::<mast::MastError>() {
            eprintln!("{}", error_formatter::format_error(mast_err));
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .try_init();
}

fn parse_source(
    source: &Source,
    bindings: &[String],
    options: &CompileOptions,
) -> Result<(Mst, Vec<String>)> {
    let input = source.read(bindings)?;
    let tree = parse_named(&input.text, &input.name, options)?;
    Ok((tree, input.bindings))
}

/// Parse "name=value" arguments into bindings
fn parse_bindings<T>(arguments: &[String]) -> Result<Bindings<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let mut bindings = Bindings::new();
    for argument in arguments {
        let (name, value) = argument
            .split_once('=')
            .with_context(|| format!("Invalid binding '{}': expected name=value", argument))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Invalid binding '{}': missing name", argument);
        }
        let value = value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for '{}': {}", name, e))?;
        bindings.insert(name, value);
    }
    Ok(bindings)
}

fn eval_command(
    source: &Source,
    arguments: &[String],
    compilation: &Compilation,
    raw: bool,
) -> Result<()> {
    let options = compilation.options();
    let (tree, arguments) = parse_source(source, arguments, &options)?;
    let formatter = Formatter::default();

    let output = match compilation.algebra {
        AlgebraKind::Real => {
            let bindings = parse_bindings::<f64>(&arguments)?;
            let value = evaluate_with(&tree, RealField::new(), &bindings, compilation)?;
            formatter.format_evaluation(&tree, &bindings, &value, raw)
        }
        AlgebraKind::Decimal => {
            let bindings = parse_bindings::<Decimal>(&arguments)?;
            let value = evaluate_with(&tree, DecimalField::new(), &bindings, compilation)?;
            formatter.format_evaluation(&tree, &bindings, &value, raw)
        }
    };
    print!("{}", output);
    Ok(())
}

fn evaluate_with<T, A>(
    tree: &Mst,
    algebra: A,
    bindings: &Bindings<T>,
    compilation: &Compilation,
) -> Result<T>
where
    T: Value,
    A: Algebra<T> + 'static,
{
    let expression = compile(
        tree,
        Arc::new(algebra),
        compilation.backend,
        &compilation.options(),
    )?;
    Ok(expression.invoke(bindings)?)
}

fn compile_command(source: &Source, compilation: &Compilation) -> Result<()> {
    let options = compilation.options();
    let (tree, _) = parse_source(source, &[], &options)?;
    let formatter = Formatter::default();

    let listing = match compilation.algebra {
        AlgebraKind::Real => listing_for(&tree, &RealField::new(), compilation)?,
        AlgebraKind::Decimal => listing_for(&tree, &DecimalField::new(), compilation)?,
    };
    print!("{}", formatter.format_listing(compilation.backend, &listing));
    Ok(())
}

fn listing_for<T, A>(tree: &Mst, algebra: &A, compilation: &Compilation) -> Result<String>
where
    T: Value,
    A: Algebra<T>,
{
    let options = compilation.options();
    match compilation.backend {
        Backend::Interpreter => Ok(format!("{}\n", tree)),
        Backend::Closure => Ok(lower(tree, algebra, &options)?.to_string()),
        Backend::Vm => {
            let program = lower(tree, algebra, &options)?;
            Ok(mast::backend::VmExpression::new(&program)?.disassemble())
        }
        Backend::Jit => jit_listing(lower(tree, algebra, &options)?),
    }
}

#[cfg(feature = "jit")]
fn jit_listing<T: Value>(program: mast::Program<T>) -> Result<String> {
    let program: Box<dyn std::any::Any> = Box::new(program);
    match program.downcast::<mast::Program<f64>>() {
        Ok(program) => Ok(mast::jit::JitExpression::new(&program)?.ir().to_string()),
        Err(_) => anyhow::bail!("The jit backend only supports the real algebra"),
    }
}

#[cfg(not(feature = "jit"))]
fn jit_listing<T: Value>(_program: mast::Program<T>) -> Result<String> {
    eprintln!("Error: JIT feature not enabled");
    eprintln!("Recompile with: cargo build --features jit");
    std::process::exit(1);
}

fn tree_command(source: &Source, json: bool) -> Result<()> {
    let (tree, _) = parse_source(source, &[], &CompileOptions::default())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print!("{}", Formatter::default().format_tree(&tree));
    }
    Ok(())
}

fn bench_command(
    source: &Source,
    arguments: &[String],
    algebra: AlgebraKind,
    iterations: usize,
) -> Result<()> {
    let (tree, arguments) = parse_source(source, arguments, &CompileOptions::default())?;

    let rows = match algebra {
        AlgebraKind::Real => {
            let bindings = parse_bindings::<f64>(&arguments)?;
            bench_backends(&tree, Arc::new(RealField::new()), &bindings, iterations)
        }
        AlgebraKind::Decimal => {
            let bindings = parse_bindings::<Decimal>(&arguments)?;
            bench_backends(&tree, Arc::new(DecimalField::new()), &bindings, iterations)
        }
    };

    print!("{}", Formatter::default().format_bench(&tree, iterations, &rows));
    Ok(())
}

fn bench_backends<T, A>(
    tree: &Mst,
    algebra: Arc<A>,
    bindings: &Bindings<T>,
    iterations: usize,
) -> Vec<BenchRow>
where
    T: Value + Display,
    A: Algebra<T> + 'static,
{
    let options = CompileOptions::default();
    Backend::ALL
        .iter()
        .map(|&backend| {
            let started = Instant::now();
            let expression = match compile(tree, algebra.clone(), backend, &options) {
                Ok(expression) => expression,
                Err(e) => return BenchRow::failed(backend, e.to_string()),
            };
            let compile_time = started.elapsed();

            let started = Instant::now();
            let mut last = None;
            for _ in 0..iterations {
                last = Some(black_box(expression.invoke(black_box(bindings))));
            }
            let run_time = started.elapsed();

            let result = match last {
                Some(Ok(value)) => value.to_string(),
                Some(Err(e)) => e.to_string(),
                None => "-".to_string(),
            };
            BenchRow::measured(backend, compile_time, run_time, iterations, result)
        })
        .collect()
}

fn server_command(host: &str, port: u16, cache_size: usize, verbose: bool) -> Result<()> {
    #[cfg(feature = "server")]
    {
        use tokio::runtime::Runtime;
        if !verbose {
            init_logging("mast=info,tower_http=info");
        }
        let rt = Runtime::new()?;
        rt.block_on(server::http::start_server(host, port, cache_size))?;
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = (host, port, cache_size, verbose);
        eprintln!("Error: Server feature not enabled");
        eprintln!("Recompile with: cargo build --features server");
        std::process::exit(1);
    }

    Ok(())
}
