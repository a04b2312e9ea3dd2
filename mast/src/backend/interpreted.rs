use super::Expression;
use crate::algebra::{Algebra, Value};
use crate::analysis::check_operations;
use crate::interpreter::evaluate_checked;
use crate::{Bindings, MastResult, Mst};
use std::marker::PhantomData;
use std::sync::Arc;

/// A tree paired with its algebra, evaluated by walking the tree per call
///
/// Operation names are resolved once when the expression is built; the
/// outcome is replayed on every call so the error surfaces at invocation.
pub struct InterpretedExpression<T, A: ?Sized> {
    tree: Mst,
    algebra: Arc<A>,
    operations: MastResult<()>,
    _value: PhantomData<fn() -> T>,
}

impl<T, A> InterpretedExpression<T, A>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    pub fn new(tree: Mst, algebra: Arc<A>) -> Self {
        let operations = check_operations(&tree, algebra.as_ref());
        Self {
            tree,
            algebra,
            operations,
            _value: PhantomData,
        }
    }
}

impl<T, A: ?Sized> InterpretedExpression<T, A> {
    pub fn tree(&self) -> &Mst {
        &self.tree
    }
}

impl<T, A> Expression<T> for InterpretedExpression<T, A>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    fn invoke(&self, bindings: &Bindings<T>) -> MastResult<T> {
        self.operations.clone()?;
        evaluate_checked(&self.tree, self.algebra.as_ref(), bindings)
    }
}
