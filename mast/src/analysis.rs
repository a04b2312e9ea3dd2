//! Whole-tree checks shared by the interpreter and lowering
//!
//! Trees may reuse a subtree through several `Arc` references, so a naive
//! walk can visit the same node exponentially often. The passes here visit
//! each distinct node once, keyed by its address.

use crate::algebra::{Algebra, Value};
use crate::{CompileOptions, MastResult, Mst};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Resolve every operation name in the tree against the algebra
///
/// Operations are resolved before their operands and left before right, so
/// the error names the outermost, leftmost unsupported operation.
pub fn check_operations<T, A>(tree: &Mst, algebra: &A) -> MastResult<()>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    Survey::new(algebra, None).visit(tree, 1).map(|_| ())
}

/// Check operations and nesting depth in one pass
///
/// A node deeper than `options.max_expression_depth` fails with
/// `ResourceLimitExceeded` before anything below it is resolved.
pub fn check_tree<T, A>(tree: &Mst, algebra: &A, options: &CompileOptions) -> MastResult<usize>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    Survey::new(algebra, Some(options)).visit(tree, 1)
}

struct Survey<'a, T, A: ?Sized> {
    algebra: &'a A,
    limits: Option<&'a CompileOptions>,
    heights: HashMap<*const Mst, usize>,
    _value: PhantomData<fn() -> T>,
}

impl<'a, T, A> Survey<'a, T, A>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    fn new(algebra: &'a A, limits: Option<&'a CompileOptions>) -> Self {
        Self {
            algebra,
            limits,
            heights: HashMap::new(),
            _value: PhantomData,
        }
    }

    /// Height of the subtree rooted at `node`, which sits at `level`
    fn visit(&mut self, node: &Mst, level: usize) -> MastResult<usize> {
        self.check_depth(level)?;
        let key = node as *const Mst;
        if let Some(&height) = self.heights.get(&key) {
            // Reached again through another parent, possibly at a deeper level.
            self.check_depth(level + height - 1)?;
            return Ok(height);
        }

        let height = match node {
            Mst::Numeric(_) | Mst::Symbolic(_) => 1,
            Mst::Unary(operation, operand) => {
                self.algebra.unary_operation_function(operation)?;
                1 + self.visit(operand, level + 1)?
            }
            Mst::Binary(operation, left, right) => {
                self.algebra.binary_operation_function(operation)?;
                let left = self.visit(left, level + 1)?;
                let right = self.visit(right, level + 1)?;
                1 + left.max(right)
            }
        };
        self.heights.insert(key, height);
        Ok(height)
    }

    fn check_depth(&self, depth: usize) -> MastResult<()> {
        match self.limits {
            Some(options) if depth > options.max_expression_depth => {
                Err(options.depth_exceeded(options.max_expression_depth + 1))
            }
            _ => Ok(()),
        }
    }
}
