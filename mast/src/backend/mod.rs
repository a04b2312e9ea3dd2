//! Compiled expressions and the strategies that produce them

pub mod closure;
pub mod interpreted;
pub mod vm;

pub use closure::ClosureExpression;
pub use interpreted::InterpretedExpression;
pub use vm::VmExpression;

use crate::algebra::{Algebra, Value};
use crate::lowering::{lower, Program};
use crate::{Bindings, CompileOptions, MastError, MastResult, Mst};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// A callable produced from a tree bound to an algebra
///
/// Expressions are immutable once built and safe to invoke from many threads
/// at once; each call works on its own scratch state.
pub trait Expression<T>: Send + Sync {
    fn invoke(&self, bindings: &Bindings<T>) -> MastResult<T>;
}

/// Any thread-safe function of the bindings is an expression
impl<T, F> Expression<T> for F
where
    F: Fn(&Bindings<T>) -> MastResult<T> + Send + Sync,
{
    fn invoke(&self, bindings: &Bindings<T>) -> MastResult<T> {
        self(bindings)
    }
}

/// Evaluation strategy, chosen explicitly by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Walk the tree on every call
    Interpreter,
    /// Chain one closure per program step
    Closure,
    /// Run a flat instruction array over a register file
    Vm,
    /// Native code; only available for `f64` with the `jit` feature
    Jit,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Interpreter,
        Backend::Closure,
        Backend::Vm,
        Backend::Jit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Interpreter => "interpreter",
            Backend::Closure => "closure",
            Backend::Vm => "vm",
            Backend::Jit => "jit",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interpreter" | "mst" => Ok(Backend::Interpreter),
            "closure" => Ok(Backend::Closure),
            "vm" => Ok(Backend::Vm),
            "jit" | "native" => Ok(Backend::Jit),
            other => Err(format!(
                "Unknown backend '{}'. Expected one of: interpreter, closure, vm, jit",
                other
            )),
        }
    }
}

/// Build an expression from a tree with the chosen backend
///
/// Every backend except [`Backend::Interpreter`] lowers the tree first, so
/// unsupported operations fail here rather than on the first invocation.
pub fn compile<T, A>(
    tree: &Mst,
    algebra: Arc<A>,
    backend: Backend,
    options: &CompileOptions,
) -> MastResult<Arc<dyn Expression<T>>>
where
    T: Value,
    A: Algebra<T> + ?Sized + 'static,
{
    debug!(backend = %backend, nodes = tree.node_count(), "Compiling expression");

    if backend == Backend::Interpreter {
        let depth = tree.depth();
        if depth > options.max_expression_depth {
            return Err(options.depth_exceeded(depth));
        }
        return Ok(Arc::new(InterpretedExpression::new(tree.clone(), algebra)));
    }

    let program = lower(tree, algebra.as_ref(), options)?;
    compile_program(&program, backend)
}

/// Build an expression from an already lowered program
pub fn compile_program<T: Value>(
    program: &Program<T>,
    backend: Backend,
) -> MastResult<Arc<dyn Expression<T>>> {
    program.validate()?;
    match backend {
        Backend::Interpreter => Err(MastError::Backend(
            "the interpreter evaluates trees, not lowered programs".to_string(),
        )),
        Backend::Closure => Ok(Arc::new(ClosureExpression::new(program)?)),
        Backend::Vm => Ok(Arc::new(VmExpression::new(program)?)),
        Backend::Jit => compile_native(program),
    }
}

#[cfg(feature = "jit")]
fn compile_native<T: Value>(program: &Program<T>) -> MastResult<Arc<dyn Expression<T>>> {
    use std::any::Any;

    let Some(program) = (program as &dyn Any).downcast_ref::<Program<f64>>() else {
        return Err(native_unavailable::<T>());
    };
    let expression: Arc<dyn Expression<f64>> = Arc::new(crate::jit::JitExpression::new(program)?);
    let erased: Box<dyn Any> = Box::new(expression);
    erased
        .downcast::<Arc<dyn Expression<T>>>()
        .map(|expression| *expression)
        .map_err(|_| native_unavailable::<T>())
}

#[cfg(not(feature = "jit"))]
fn compile_native<T: Value>(_program: &Program<T>) -> MastResult<Arc<dyn Expression<T>>> {
    Err(MastError::Backend(
        "native code generation requires the `jit` feature".to_string(),
    ))
}

#[cfg(feature = "jit")]
fn native_unavailable<T>() -> MastError {
    MastError::Backend(format!(
        "native code generation only supports f64, not {}",
        std::any::type_name::<T>()
    ))
}
