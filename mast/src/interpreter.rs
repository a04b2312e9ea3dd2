//! Tree-walking evaluation
//!
//! The reference semantics every other backend is checked against. Children
//! are evaluated left to right before their parent's operation is applied;
//! every operation name in the tree is resolved up front, so an unsupported
//! operation is reported ahead of unbound symbols and domain errors, the same
//! way lowering reports it.

use crate::algebra::{Algebra, Value};
use crate::analysis::check_operations;
use crate::{Bindings, MastResult, Mst};

/// Evaluate a tree against an algebra and a set of variable bindings
///
/// Symbols are looked up in `bindings` first and fall back to the algebra's
/// named constants; a symbol found in neither fails with `UnboundSymbol`.
pub fn evaluate<T, A>(node: &Mst, algebra: &A, bindings: &Bindings<T>) -> MastResult<T>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    check_operations(node, algebra)?;
    evaluate_checked(node, algebra, bindings)
}

/// Walk a tree whose operations are already known to resolve
pub(crate) fn evaluate_checked<T, A>(node: &Mst, algebra: &A, bindings: &Bindings<T>) -> MastResult<T>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    match node {
        Mst::Numeric(value) => algebra.number(*value),

        Mst::Symbolic(symbol) => match bindings.get(symbol.name()) {
            Some(value) => Ok(value.clone()),
            None => algebra.bind_symbol(symbol.name()),
        },

        Mst::Unary(operation, operand) => {
            let function = algebra.unary_operation_function(operation)?;
            let value = evaluate_checked(operand, algebra, bindings)?;
            function(value)
        }

        Mst::Binary(operation, left, right) => {
            let function = algebra.binary_operation_function(operation)?;
            let left_value = evaluate_checked(left, algebra, bindings)?;
            let right_value = evaluate_checked(right, algebra, bindings)?;
            function(left_value, right_value)
        }
    }
}
