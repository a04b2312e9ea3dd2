//! # mast
//!
//! **Build an expression once, evaluate it many times**
//!
//! mast represents algebraic expressions as symbolic trees ([`Mst`]) that are
//! independent of any number type. An [`Algebra`] gives the tree's operation
//! names and literals a meaning for one value type; a backend then turns the
//! tree into an [`Expression`] that can be invoked repeatedly with different
//! variable bindings.
//!
//! ## Quick Start
//!
//! ```rust
//! use mast::{compile, Backend, Bindings, CompileOptions, MastResult, Mst, RealField};
//! use std::sync::Arc;
//!
//! fn main() -> MastResult<()> {
//!     let x = Mst::symbol("x");
//!     let tree = x.clone() * 2.0 + 2.0 / x.clone() - 16.0 / x.sin();
//!
//!     let expression = compile(&tree, Arc::new(RealField::new()), Backend::Vm, &CompileOptions::default())?;
//!     let value = expression.invoke(&Bindings::from([("x", 2.0)]))?;
//!     assert!((value - (5.0 - 16.0 / 2f64.sin())).abs() < 1e-12);
//!     Ok(())
//! }
//! ```
//!
//! ## Evaluation strategies
//!
//! - **Interpreter** walks the tree on every call. It is the reference semantics.
//! - **Closure** lowers the tree to a single-assignment [`Program`] and chains
//!   one closure per step.
//! - **Vm** runs the program as a flat instruction array over a register file.
//! - **Jit** (feature `jit`, `f64` only) emits native code through Cranelift.
//!
//! All strategies agree on results and on which errors they report.

pub mod algebra;
pub mod analysis;
pub mod backend;
pub mod bindings;
pub mod cache;
pub mod error;
pub mod interpreter;
#[cfg(feature = "jit")]
pub mod jit;
pub mod limits;
pub mod lowering;
pub mod mst;
pub mod parser;
pub mod span;

pub use algebra::{
    Algebra, BinaryFn, DecimalField, OperationTable, RealField, UnaryFn, Value,
};
pub use backend::{compile, Backend, Expression};
pub use bindings::Bindings;
pub use cache::{EvictionPolicy, ExpressionCache};
pub use error::{Arity, MastError, ParseErrorDetails};
pub use interpreter::evaluate;
pub use limits::CompileOptions;
pub use lowering::{lower, Program, Slot, Step};
pub use mst::{ops, Mst, Number, Symbol};
pub use parser::parse;
pub use span::Span;

/// Result type for mast operations
pub type MastResult<T> = Result<T, MastError>;

#[cfg(test)]
mod tests;
