//! Closure-chaining backend
//!
//! Each program step becomes a closure that calls the closures of its
//! operands. Slots read by more than one step are memoized for the duration
//! of a single call, so shared subtrees are computed once per invocation.

use super::Expression;
use crate::algebra::Value;
use crate::lowering::{Program, Step};
use crate::{Bindings, MastError, MastResult};
use std::sync::Arc;

type Node<T> = Arc<dyn Fn(&Bindings<T>, &mut [Option<T>]) -> MastResult<T> + Send + Sync>;

pub struct ClosureExpression<T> {
    root: Node<T>,
    pub(crate) memo_size: usize,
}

impl<T: Value> ClosureExpression<T> {
    pub fn new(program: &Program<T>) -> MastResult<Self> {
        let uses = program.use_counts();
        let mut nodes: Vec<Option<Node<T>>> = vec![None; program.slot_count()];
        let mut memo_size = 0;

        for step in program.steps() {
            let built = match step {
                Step::LoadConstant { value, .. } => {
                    let value = value.clone();
                    node(move |_: &Bindings<T>, _: &mut [Option<T>]| Ok(value.clone()))
                }
                Step::LoadVariable {
                    symbol, fallback, ..
                } => {
                    let symbol = symbol.clone();
                    let fallback = fallback.clone();
                    node(move |bindings: &Bindings<T>, _: &mut [Option<T>]| {
                        match bindings.get(symbol.name()) {
                            Some(value) => Ok(value.clone()),
                            None => fallback.clone(),
                        }
                    })
                }
                Step::ApplyUnary {
                    function, operand, ..
                } => {
                    let function = function.clone();
                    let operand = node_at(&nodes, *operand)?;
                    let apply = node(move |bindings: &Bindings<T>, memo: &mut [Option<T>]| {
                        function(operand(bindings, memo)?)
                    });
                    memoize(apply, uses[step.slot()], &mut memo_size)
                }
                Step::ApplyBinary {
                    function,
                    left,
                    right,
                    ..
                } => {
                    let function = function.clone();
                    let left = node_at(&nodes, *left)?;
                    let right = node_at(&nodes, *right)?;
                    let apply = node(move |bindings: &Bindings<T>, memo: &mut [Option<T>]| {
                        let left = left(bindings, memo)?;
                        let right = right(bindings, memo)?;
                        function(left, right)
                    });
                    memoize(apply, uses[step.slot()], &mut memo_size)
                }
            };
            nodes[step.slot()] = Some(built);
        }

        Ok(Self {
            root: node_at(&nodes, program.result())?,
            memo_size,
        })
    }
}

fn node_at<T>(nodes: &[Option<Node<T>>], slot: usize) -> MastResult<Node<T>> {
    nodes.get(slot).cloned().flatten().ok_or_else(|| {
        MastError::MalformedProgram(format!("slot %{} has no producer", slot))
    })
}

fn node<T, F>(function: F) -> Node<T>
where
    F: Fn(&Bindings<T>, &mut [Option<T>]) -> MastResult<T> + Send + Sync + 'static,
{
    Arc::new(function)
}

fn memoize<T: Value>(inner: Node<T>, uses: usize, memo_size: &mut usize) -> Node<T> {
    if uses < 2 {
        return inner;
    }
    let index = *memo_size;
    *memo_size += 1;
    node(move |bindings: &Bindings<T>, memo: &mut [Option<T>]| {
        if let Some(value) = &memo[index] {
            return Ok(value.clone());
        }
        let value = inner(bindings, memo)?;
        memo[index] = Some(value.clone());
        Ok(value)
    })
}

impl<T: Value> Expression<T> for ClosureExpression<T> {
    fn invoke(&self, bindings: &Bindings<T>) -> MastResult<T> {
        let mut memo: Vec<Option<T>> = vec![None; self.memo_size];
        (self.root)(bindings, &mut memo)
    }
}
