//! Register-based bytecode interpreter
//!
//! A program is flattened into an instruction array whose operands are
//! register indices and table indices. Execution is a single
//! fetch-decode-execute loop writing one register per instruction. Each
//! thread keeps one scratch register file per value type, so calls take no
//! locks and stop allocating once the file has grown to fit. A call made
//! while another is running on the same thread (an algebra function that
//! invokes an expression) gets a fresh file.

use super::Expression;
use crate::algebra::{BinaryFn, UnaryFn, Value};
use crate::lowering::{Program, Step};
use crate::{Bindings, MastError, MastResult, Symbol};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `constants[constant]` into `target`
    Constant { target: usize, constant: usize },
    /// Read `variables[variable]` from the bindings into `target`
    Load { target: usize, variable: usize },
    Unary {
        target: usize,
        function: usize,
        operand: usize,
    },
    Binary {
        target: usize,
        function: usize,
        left: usize,
        right: usize,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Constant { target, constant } => {
                write!(f, "const  r{} <- k{}", target, constant)
            }
            Instruction::Load { target, variable } => {
                write!(f, "load   r{} <- v{}", target, variable)
            }
            Instruction::Unary {
                target,
                function,
                operand,
            } => write!(f, "unary  r{} <- u{}(r{})", target, function, operand),
            Instruction::Binary {
                target,
                function,
                left,
                right,
            } => write!(f, "binary r{} <- b{}(r{}, r{})", target, function, left, right),
        }
    }
}

type Registers<T> = Vec<Option<T>>;

thread_local! {
    static SCRATCH: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

pub struct VmExpression<T> {
    code: Vec<Instruction>,
    constants: Vec<T>,
    variables: Vec<(Symbol, MastResult<T>)>,
    unary: Vec<(String, UnaryFn<T>)>,
    binary: Vec<(String, BinaryFn<T>)>,
    result: usize,
    register_count: usize,
}

impl<T: Value> VmExpression<T> {
    pub fn new(program: &Program<T>) -> MastResult<Self> {
        let mut code = Vec::with_capacity(program.steps().len());
        let mut constants = Vec::new();
        let mut variables: Vec<(Symbol, MastResult<T>)> = Vec::new();
        let mut unary: Vec<(String, UnaryFn<T>)> = Vec::new();
        let mut binary: Vec<(String, BinaryFn<T>)> = Vec::new();
        let mut unary_index: HashMap<&str, usize> = HashMap::new();
        let mut binary_index: HashMap<&str, usize> = HashMap::new();

        for step in program.steps() {
            let instruction = match step {
                Step::LoadConstant { slot, value } => {
                    constants.push(value.clone());
                    Instruction::Constant {
                        target: *slot,
                        constant: constants.len() - 1,
                    }
                }
                Step::LoadVariable {
                    slot,
                    symbol,
                    fallback,
                } => {
                    let variable = match variables.iter().position(|(s, _)| s == symbol) {
                        Some(index) => index,
                        None => {
                            variables.push((symbol.clone(), fallback.clone()));
                            variables.len() - 1
                        }
                    };
                    Instruction::Load {
                        target: *slot,
                        variable,
                    }
                }
                Step::ApplyUnary {
                    slot,
                    operation,
                    function,
                    operand,
                } => {
                    let function = *unary_index.entry(operation.as_str()).or_insert_with(|| {
                        unary.push((operation.clone(), function.clone()));
                        unary.len() - 1
                    });
                    Instruction::Unary {
                        target: *slot,
                        function,
                        operand: *operand,
                    }
                }
                Step::ApplyBinary {
                    slot,
                    operation,
                    function,
                    left,
                    right,
                } => {
                    let function = *binary_index.entry(operation.as_str()).or_insert_with(|| {
                        binary.push((operation.clone(), function.clone()));
                        binary.len() - 1
                    });
                    Instruction::Binary {
                        target: *slot,
                        function,
                        left: *left,
                        right: *right,
                    }
                }
            };
            code.push(instruction);
        }

        if program.result() >= program.slot_count() {
            return Err(MastError::MalformedProgram(format!(
                "result register r{} is out of range",
                program.result()
            )));
        }

        Ok(Self {
            code,
            constants,
            variables,
            unary,
            binary,
            result: program.result(),
            register_count: program.slot_count(),
        })
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Human-readable listing of the tables and instructions
    pub fn disassemble(&self) -> String {
        let mut listing = String::new();
        for (index, constant) in self.constants.iter().enumerate() {
            listing.push_str(&format!("k{} = {:?}\n", index, constant));
        }
        for (index, (symbol, _)) in self.variables.iter().enumerate() {
            listing.push_str(&format!("v{} = {}\n", index, symbol));
        }
        for (index, (name, _)) in self.unary.iter().enumerate() {
            listing.push_str(&format!("u{} = {}\n", index, name));
        }
        for (index, (name, _)) in self.binary.iter().enumerate() {
            listing.push_str(&format!("b{} = {}\n", index, name));
        }
        for (offset, instruction) in self.code.iter().enumerate() {
            listing.push_str(&format!("{:04} {}\n", offset, instruction));
        }
        listing.push_str(&format!("ret    r{}", self.result));
        listing
    }

    fn execute(&self, registers: &mut [Option<T>], bindings: &Bindings<T>) -> MastResult<T> {
        for instruction in &self.code {
            match *instruction {
                Instruction::Constant { target, constant } => {
                    registers[target] = Some(self.constants[constant].clone());
                }
                Instruction::Load { target, variable } => {
                    let (symbol, fallback) = &self.variables[variable];
                    let value = match bindings.get(symbol.name()) {
                        Some(value) => value.clone(),
                        None => fallback.clone()?,
                    };
                    registers[target] = Some(value);
                }
                Instruction::Unary {
                    target,
                    function,
                    operand,
                } => {
                    let operand = read(registers, operand)?;
                    registers[target] = Some((self.unary[function].1)(operand)?);
                }
                Instruction::Binary {
                    target,
                    function,
                    left,
                    right,
                } => {
                    let left = read(registers, left)?;
                    let right = read(registers, right)?;
                    registers[target] = Some((self.binary[function].1)(left, right)?);
                }
            }
        }
        read(registers, self.result)
    }

    fn acquire(&self) -> Box<Registers<T>> {
        let scratch = SCRATCH
            .try_with(|scratch| scratch.borrow_mut().remove(&TypeId::of::<Registers<T>>()))
            .ok()
            .flatten()
            .and_then(|registers| registers.downcast::<Registers<T>>().ok());
        let mut registers = scratch.unwrap_or_default();
        if registers.capacity() < self.register_count {
            trace!(registers = self.register_count, "Growing register file");
        }
        registers.resize(self.register_count, None);
        registers
    }

    fn release(&self, mut registers: Box<Registers<T>>) {
        registers.clear();
        let _ = SCRATCH.try_with(|scratch| {
            scratch
                .borrow_mut()
                .insert(TypeId::of::<Registers<T>>(), registers as Box<dyn Any>);
        });
    }
}

/// Capacity of this thread's scratch register file for `T`, if one is parked
#[cfg(test)]
pub(crate) fn scratch_capacity<T: Value>() -> Option<usize> {
    SCRATCH.with(|scratch| {
        scratch
            .borrow()
            .get(&TypeId::of::<Registers<T>>())
            .and_then(|registers| registers.downcast_ref::<Registers<T>>())
            .map(Vec::capacity)
    })
}

fn read<T: Clone>(registers: &[Option<T>], register: usize) -> MastResult<T> {
    registers
        .get(register)
        .and_then(Option::as_ref)
        .cloned()
        .ok_or_else(|| {
            MastError::MalformedProgram(format!("register r{} read before it is written", register))
        })
}

impl<T: Value> Expression<T> for VmExpression<T> {
    fn invoke(&self, bindings: &Bindings<T>) -> MastResult<T> {
        let mut registers = self.acquire();
        let result = self.execute(&mut registers, bindings);
        self.release(registers);
        result
    }
}

impl<T: Value> fmt::Debug for VmExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmExpression")
            .field("instructions", &self.code.len())
            .field("registers", &self.register_count)
            .finish()
    }
}
