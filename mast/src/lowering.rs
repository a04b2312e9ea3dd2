//! Lowering trees into single-assignment programs
//!
//! A [`Program`] is a flat list of [`Step`]s. Each step writes exactly one
//! slot, and every slot it reads was written by an earlier step. Operation
//! names are resolved against the algebra here, once, so an unsupported
//! operation fails compilation instead of the first invocation.
//!
//! Two optimizations are applied when enabled in [`CompileOptions`]:
//! subtrees made only of literals are folded into one constant, and
//! structurally equal subtrees are emitted once and share their slot.
//! With sharing on, a node reached through several `Arc` references is
//! lowered once, so trees that reuse subtrees lower in linear time.

use crate::algebra::{Algebra, BinaryFn, UnaryFn, Value};
use crate::analysis::check_tree;
use crate::mst::Number;
use crate::{Bindings, CompileOptions, MastError, MastResult, Mst, Symbol};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Index of a value cell in a program
pub type Slot = usize;

/// One instruction of a lowered program
#[derive(Clone)]
pub enum Step<T> {
    LoadConstant {
        slot: Slot,
        value: T,
    },
    /// Read a free variable. `fallback` is what the algebra answered for the
    /// name at compile time and is used when the caller does not bind it.
    LoadVariable {
        slot: Slot,
        symbol: Symbol,
        fallback: MastResult<T>,
    },
    ApplyUnary {
        slot: Slot,
        operation: String,
        function: UnaryFn<T>,
        operand: Slot,
    },
    ApplyBinary {
        slot: Slot,
        operation: String,
        function: BinaryFn<T>,
        left: Slot,
        right: Slot,
    },
}

impl<T> Step<T> {
    /// The slot this step writes
    pub fn slot(&self) -> Slot {
        match self {
            Step::LoadConstant { slot, .. }
            | Step::LoadVariable { slot, .. }
            | Step::ApplyUnary { slot, .. }
            | Step::ApplyBinary { slot, .. } => *slot,
        }
    }

    /// The slots this step reads
    pub fn operands(&self) -> Vec<Slot> {
        match self {
            Step::LoadConstant { .. } | Step::LoadVariable { .. } => Vec::new(),
            Step::ApplyUnary { operand, .. } => vec![*operand],
            Step::ApplyBinary { left, right, .. } => vec![*left, *right],
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", StepListing(self))
    }
}

struct StepListing<'a, T>(&'a Step<T>);

impl<T: fmt::Debug> fmt::Display for StepListing<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Step::LoadConstant { slot, value } => write!(f, "%{} = const {:?}", slot, value),
            Step::LoadVariable { slot, symbol, .. } => write!(f, "%{} = load {}", slot, symbol),
            Step::ApplyUnary {
                slot,
                operation,
                operand,
                ..
            } => write!(f, "%{} = {} %{}", slot, operation, operand),
            Step::ApplyBinary {
                slot,
                operation,
                left,
                right,
                ..
            } => write!(f, "%{} = {} %{} %{}", slot, operation, left, right),
        }
    }
}

/// A lowered expression ready for a backend
#[derive(Clone)]
pub struct Program<T> {
    steps: Vec<Step<T>>,
    result: Slot,
    slot_count: usize,
    variables: Vec<Symbol>,
    ieee_arithmetic: bool,
}

impl<T> Program<T> {
    /// Assemble a program from raw steps without checking it
    ///
    /// Backends call [`Program::validate`] before trusting the layout.
    pub fn from_steps(steps: Vec<Step<T>>, result: Slot) -> Self {
        let slot_count = steps.iter().map(|step| step.slot() + 1).max().unwrap_or(0);
        let mut variables: Vec<Symbol> = Vec::new();
        for step in &steps {
            if let Step::LoadVariable { symbol, .. } = step {
                if !variables.contains(symbol) {
                    variables.push(symbol.clone());
                }
            }
        }
        Self {
            steps,
            result,
            slot_count,
            variables,
            ieee_arithmetic: false,
        }
    }

    /// Mark the arithmetic operators as plain IEEE-754 `f64` arithmetic
    ///
    /// Set by [`lower`] when the algebra reports
    /// [`Algebra::is_ieee754`](crate::Algebra::is_ieee754).
    pub fn with_ieee_arithmetic(mut self, ieee_arithmetic: bool) -> Self {
        self.ieee_arithmetic = ieee_arithmetic;
        self
    }

    /// Whether `+ - * /`, negation and `sqrt` are the IEEE-754 operations
    pub fn ieee_arithmetic(&self) -> bool {
        self.ieee_arithmetic
    }

    pub fn steps(&self) -> &[Step<T>] {
        &self.steps
    }

    pub fn result(&self) -> Slot {
        self.result
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Distinct free variables, in the order they are first loaded
    pub fn variables(&self) -> &[Symbol] {
        &self.variables
    }

    /// Number of times each slot is read, counting the result as one read
    pub fn use_counts(&self) -> Vec<usize> {
        let mut uses = vec![0; self.slot_count];
        for step in &self.steps {
            for operand in step.operands() {
                if let Some(count) = uses.get_mut(operand) {
                    *count += 1;
                }
            }
        }
        if let Some(count) = uses.get_mut(self.result) {
            *count += 1;
        }
        uses
    }

    /// Check the single-assignment discipline
    ///
    /// Every slot is written once, every read happens after the write, and the
    /// result slot is written.
    pub fn validate(&self) -> MastResult<()> {
        let mut written = vec![false; self.slot_count];
        for (index, step) in self.steps.iter().enumerate() {
            for operand in step.operands() {
                if !written.get(operand).copied().unwrap_or(false) {
                    return Err(MastError::MalformedProgram(format!(
                        "step {} reads slot %{} before it is written",
                        index, operand
                    )));
                }
            }
            let slot = step.slot();
            if written[slot] {
                return Err(MastError::MalformedProgram(format!(
                    "step {} writes slot %{} a second time",
                    index, slot
                )));
            }
            written[slot] = true;
        }
        if !written.get(self.result).copied().unwrap_or(false) {
            return Err(MastError::MalformedProgram(format!(
                "result slot %{} is never written",
                self.result
            )));
        }
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Display for Program<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{}", StepListing(step))?;
        }
        write!(f, "return %{}", self.result)
    }
}

impl<T: fmt::Debug> fmt::Debug for Program<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Lower a tree against an algebra
///
/// Fails with `UnsupportedOperation` for any operation name the algebra does
/// not implement, with `ResourceLimitExceeded` when the tree is deeper than
/// allowed, and with whatever a folded constant subtree raises.
pub fn lower<T, A>(tree: &Mst, algebra: &A, options: &CompileOptions) -> MastResult<Program<T>>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    let depth = check_tree(tree, algebra, options)?;

    let mut lowerer = Lowerer {
        algebra,
        options,
        steps: Vec::new(),
        shared: HashMap::new(),
        visited: HashMap::new(),
        constants: HashMap::new(),
        folded: 0,
        reused: 0,
    };
    let root = lowerer.lower(tree)?;
    let result = lowerer.materialize(root);

    debug!(
        depth,
        steps = lowerer.steps.len(),
        folded = lowerer.folded,
        reused = lowerer.reused,
        "Lowered expression"
    );

    let program =
        Program::from_steps(lowerer.steps, result).with_ieee_arithmetic(algebra.is_ieee754());
    program.validate()?;
    Ok(program)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StepKey {
    Constant(usize),
    Variable(Symbol),
    Unary(String, Slot),
    Binary(String, Slot, Slot),
}

/// Structural identity of a folded constant, built from interned children
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Literal(Number),
    Unary(String, usize),
    Binary(String, usize, usize),
}

/// A lowered subtree: either already in a slot, or a constant not yet emitted
#[derive(Clone)]
enum Lowered<T> {
    Slot(Slot),
    Constant { value: T, id: usize },
}

struct Lowerer<'a, T, A: ?Sized> {
    algebra: &'a A,
    options: &'a CompileOptions,
    steps: Vec<Step<T>>,
    shared: HashMap<StepKey, Slot>,
    visited: HashMap<*const Mst, Lowered<T>>,
    constants: HashMap<ConstantKey, usize>,
    folded: usize,
    reused: usize,
}

impl<T, A> Lowerer<'_, T, A>
where
    T: Value,
    A: Algebra<T> + ?Sized,
{
    fn lower(&mut self, node: &Mst) -> MastResult<Lowered<T>> {
        if !self.options.share_subtrees {
            return self.lower_node(node);
        }
        let key = node as *const Mst;
        if let Some(lowered) = self.visited.get(&key) {
            self.reused += 1;
            return Ok(lowered.clone());
        }
        let lowered = self.lower_node(node)?;
        self.visited.insert(key, lowered.clone());
        Ok(lowered)
    }

    fn lower_node(&mut self, node: &Mst) -> MastResult<Lowered<T>> {
        match node {
            Mst::Numeric(number) => {
                let value = self.algebra.number(*number)?;
                let id = self.constant_id(ConstantKey::Literal(*number));
                if self.options.fold_constants {
                    Ok(Lowered::Constant { value, id })
                } else {
                    Ok(Lowered::Slot(self.emit_constant(value, id)))
                }
            }

            Mst::Symbolic(symbol) => {
                let key = StepKey::Variable(symbol.clone());
                if let Some(slot) = self.lookup(&key) {
                    return Ok(Lowered::Slot(slot));
                }
                let fallback = self.algebra.bind_symbol(symbol.name());
                let slot = self.emit(key, |slot| Step::LoadVariable {
                    slot,
                    symbol: symbol.clone(),
                    fallback,
                });
                Ok(Lowered::Slot(slot))
            }

            Mst::Unary(operation, operand) => {
                let function = self.algebra.unary_operation_function(operation)?;
                match self.lower(operand)? {
                    Lowered::Constant { value, id } => {
                        self.folded += 1;
                        Ok(Lowered::Constant {
                            value: function(value)?,
                            id: self.constant_id(ConstantKey::Unary(operation.clone(), id)),
                        })
                    }
                    Lowered::Slot(operand) => {
                        let key = StepKey::Unary(operation.clone(), operand);
                        if let Some(slot) = self.lookup(&key) {
                            return Ok(Lowered::Slot(slot));
                        }
                        let slot = self.emit(key, |slot| Step::ApplyUnary {
                            slot,
                            operation: operation.clone(),
                            function,
                            operand,
                        });
                        Ok(Lowered::Slot(slot))
                    }
                }
            }

            Mst::Binary(operation, left, right) => {
                let function = self.algebra.binary_operation_function(operation)?;
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                match (left, right) {
                    (
                        Lowered::Constant {
                            value: left,
                            id: left_id,
                        },
                        Lowered::Constant {
                            value: right,
                            id: right_id,
                        },
                    ) => {
                        self.folded += 1;
                        let key = ConstantKey::Binary(operation.clone(), left_id, right_id);
                        Ok(Lowered::Constant {
                            value: function(left, right)?,
                            id: self.constant_id(key),
                        })
                    }
                    (left, right) => {
                        let left = self.materialize(left);
                        let right = self.materialize(right);
                        let key = StepKey::Binary(operation.clone(), left, right);
                        if let Some(slot) = self.lookup(&key) {
                            return Ok(Lowered::Slot(slot));
                        }
                        let slot = self.emit(key, |slot| Step::ApplyBinary {
                            slot,
                            operation: operation.clone(),
                            function,
                            left,
                            right,
                        });
                        Ok(Lowered::Slot(slot))
                    }
                }
            }
        }
    }

    fn constant_id(&mut self, key: ConstantKey) -> usize {
        let next = self.constants.len();
        *self.constants.entry(key).or_insert(next)
    }

    fn materialize(&mut self, lowered: Lowered<T>) -> Slot {
        match lowered {
            Lowered::Slot(slot) => slot,
            Lowered::Constant { value, id } => self.emit_constant(value, id),
        }
    }

    fn emit_constant(&mut self, value: T, id: usize) -> Slot {
        let key = StepKey::Constant(id);
        if let Some(slot) = self.lookup(&key) {
            return slot;
        }
        self.emit(key, |slot| Step::LoadConstant { slot, value })
    }

    fn lookup(&mut self, key: &StepKey) -> Option<Slot> {
        if !self.options.share_subtrees {
            return None;
        }
        let slot = self.shared.get(key).copied();
        if slot.is_some() {
            self.reused += 1;
        }
        slot
    }

    fn emit(&mut self, key: StepKey, step: impl FnOnce(Slot) -> Step<T>) -> Slot {
        let slot = self.steps.len();
        self.steps.push(step(slot));
        if self.options.share_subtrees {
            self.shared.insert(key, slot);
        }
        slot
    }
}

/// Run a program step by step with a fresh slot vector
///
/// Used to check backends against the program they were built from.
pub fn execute<T: Value>(program: &Program<T>, bindings: &Bindings<T>) -> MastResult<T> {
    let mut slots: Vec<Option<T>> = vec![None; program.slot_count()];
    let read = |slots: &[Option<T>], slot: Slot| -> MastResult<T> {
        slots.get(slot).and_then(Option::as_ref).cloned().ok_or_else(|| {
            MastError::MalformedProgram(format!("slot %{} read before it is written", slot))
        })
    };

    for step in program.steps() {
        let value = match step {
            Step::LoadConstant { value, .. } => value.clone(),
            Step::LoadVariable {
                symbol, fallback, ..
            } => match bindings.get(symbol.name()) {
                Some(value) => value.clone(),
                None => fallback.clone()?,
            },
            Step::ApplyUnary {
                function, operand, ..
            } => function(read(&slots, *operand)?)?,
            Step::ApplyBinary {
                function,
                left,
                right,
                ..
            } => function(read(&slots, *left)?, read(&slots, *right)?)?,
        };
        slots[step.slot()] = Some(value);
    }

    read(&slots, program.result())
}
