//! Native code generation for `f64` programs through Cranelift
//!
//! Each lowered program becomes one native function
//! `fn(arguments: *const f64, fault: *mut c_void) -> f64`. Variables are
//! passed as a dense array in [`Program::variables`] order. When the program
//! was lowered against an IEEE-754 algebra ([`Program::ieee_arithmetic`]),
//! the operators `+ - * /`, negation and `sqrt` are emitted as machine
//! instructions. Every other operation calls back into the algebra's
//! function through a trampoline, which records the first error it sees in
//! the fault cell.

use crate::algebra::{BinaryFn, UnaryFn};
use crate::backend::Expression;
use crate::lowering::{lower, Program, Step};
use crate::mst::ops;
use crate::{Algebra, Bindings, CompileOptions, MastError, MastResult, Mst, Symbol};
use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use std::collections::HashMap;
use std::ffi::c_void;
use tracing::{debug, trace};

const UNARY_TRAMPOLINE: &str = "mast_apply_unary";
const BINARY_TRAMPOLINE: &str = "mast_apply_binary";

type Fault = Option<MastError>;
type NativeFn = extern "C" fn(*const f64, *mut c_void) -> f64;

fn record_fault(fault: *mut c_void, error: MastError) -> f64 {
    // SAFETY: generated code only ever passes the fault cell that
    // `JitExpression::invoke` allocated for the current call.
    let fault = unsafe { &mut *(fault as *mut Fault) };
    if fault.is_none() {
        *fault = Some(error);
    }
    f64::NAN
}

extern "C" fn apply_unary(function: *const c_void, fault: *mut c_void, a: f64) -> f64 {
    // SAFETY: `function` points into `JitExpression::unary`, which outlives the code.
    let function = unsafe { &*(function as *const UnaryFn<f64>) };
    function(a).unwrap_or_else(|error| record_fault(fault, error))
}

extern "C" fn apply_binary(function: *const c_void, fault: *mut c_void, a: f64, b: f64) -> f64 {
    // SAFETY: `function` points into `JitExpression::binary`, which outlives the code.
    let function = unsafe { &*(function as *const BinaryFn<f64>) };
    function(a, b).unwrap_or_else(|error| record_fault(fault, error))
}

fn codegen_error(context: &str, error: impl std::fmt::Display) -> MastError {
    MastError::Backend(format!("{}: {}", context, error))
}

/// A program compiled to machine code
pub struct JitExpression {
    function: NativeFn,
    variables: Vec<(Symbol, MastResult<f64>)>,
    unary: Box<[UnaryFn<f64>]>,
    binary: Box<[BinaryFn<f64>]>,
    ir: String,
    module: Option<JITModule>,
}

// SAFETY: the module is only touched again in `Drop`; the finalized code is
// immutable and reentrant, and per-call state lives on the caller's stack.
unsafe impl Send for JitExpression {}
unsafe impl Sync for JitExpression {}

impl JitExpression {
    pub fn new(program: &Program<f64>) -> MastResult<Self> {
        program.validate()?;
        let native = program.ieee_arithmetic();

        let mut variables: Vec<(Symbol, MastResult<f64>)> = Vec::new();
        let mut unary: Vec<UnaryFn<f64>> = Vec::new();
        let mut binary: Vec<BinaryFn<f64>> = Vec::new();
        let mut unary_index: HashMap<&str, usize> = HashMap::new();
        let mut binary_index: HashMap<&str, usize> = HashMap::new();

        for step in program.steps() {
            match step {
                Step::LoadVariable {
                    symbol, fallback, ..
                } => {
                    if !variables.iter().any(|(s, _)| s == symbol) {
                        variables.push((symbol.clone(), fallback.clone()));
                    }
                }
                Step::ApplyUnary {
                    operation,
                    function,
                    ..
                } if !(native && is_native_unary(operation)) => {
                    unary_index.entry(operation.as_str()).or_insert_with(|| {
                        unary.push(function.clone());
                        unary.len() - 1
                    });
                }
                Step::ApplyBinary {
                    operation,
                    function,
                    ..
                } if !(native && is_native_binary(operation)) => {
                    binary_index.entry(operation.as_str()).or_insert_with(|| {
                        binary.push(function.clone());
                        binary.len() - 1
                    });
                }
                _ => {}
            }
        }

        // Boxed slices never move their elements, so these addresses stay
        // valid for as long as the expression lives.
        let unary = unary.into_boxed_slice();
        let binary = binary.into_boxed_slice();

        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", "speed")
            .map_err(|e| codegen_error("Failed to set opt_level", e))?;
        let isa_builder =
            cranelift_native::builder().map_err(|e| codegen_error("Failed to create ISA builder", e))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| codegen_error("Failed to create ISA", e))?;

        let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        builder.symbol(UNARY_TRAMPOLINE, apply_unary as *const u8);
        builder.symbol(BINARY_TRAMPOLINE, apply_binary as *const u8);
        let mut module = JITModule::new(builder);

        let pointer = module.target_config().pointer_type();

        let mut unary_signature = module.make_signature();
        unary_signature.params.push(AbiParam::new(pointer)); // function
        unary_signature.params.push(AbiParam::new(pointer)); // fault
        unary_signature.params.push(AbiParam::new(types::F64));
        unary_signature.returns.push(AbiParam::new(types::F64));
        let unary_id = module
            .declare_function(UNARY_TRAMPOLINE, Linkage::Import, &unary_signature)
            .map_err(|e| codegen_error("Failed to declare unary trampoline", e))?;

        let mut binary_signature = module.make_signature();
        binary_signature.params.push(AbiParam::new(pointer)); // function
        binary_signature.params.push(AbiParam::new(pointer)); // fault
        binary_signature.params.push(AbiParam::new(types::F64));
        binary_signature.params.push(AbiParam::new(types::F64));
        binary_signature.returns.push(AbiParam::new(types::F64));
        let binary_id = module
            .declare_function(BINARY_TRAMPOLINE, Linkage::Import, &binary_signature)
            .map_err(|e| codegen_error("Failed to declare binary trampoline", e))?;

        let mut ctx = module.make_context();
        ctx.func.signature.params.push(AbiParam::new(pointer)); // arguments
        ctx.func.signature.params.push(AbiParam::new(pointer)); // fault
        ctx.func.signature.returns.push(AbiParam::new(types::F64));

        let unary_ref = module.declare_func_in_func(unary_id, &mut ctx.func);
        let binary_ref = module.declare_func_in_func(binary_id, &mut ctx.func);

        let mut function_context = FunctionBuilderContext::new();
        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut function_context);
            let entry = builder.create_block();
            builder.append_block_params_for_function_params(entry);
            builder.switch_to_block(entry);
            builder.seal_block(entry);

            let arguments = builder.block_params(entry)[0];
            let fault = builder.block_params(entry)[1];
            let mut values: Vec<Option<Value>> = vec![None; program.slot_count()];

            for step in program.steps() {
                let value = match step {
                    Step::LoadConstant { value, .. } => builder.ins().f64const(*value),
                    Step::LoadVariable { symbol, .. } => {
                        let index = variables
                            .iter()
                            .position(|(s, _)| s == symbol)
                            .ok_or_else(|| {
                                MastError::MalformedProgram(format!(
                                    "variable '{}' has no argument position",
                                    symbol
                                ))
                            })?;
                        builder
                            .ins()
                            .load(types::F64, MemFlags::trusted(), arguments, (index * 8) as i32)
                    }
                    Step::ApplyUnary {
                        operation, operand, ..
                    } => {
                        let a = slot_value(&values, *operand)?;
                        match operation.as_str() {
                            ops::MINUS if native => builder.ins().fneg(a),
                            ops::PLUS if native => a,
                            ops::SQRT if native => builder.ins().sqrt(a),
                            name => {
                                let address = &unary[unary_index[name]] as *const UnaryFn<f64>;
                                let callee = builder.ins().iconst(pointer, address as i64);
                                let call = builder.ins().call(unary_ref, &[callee, fault, a]);
                                builder.inst_results(call)[0]
                            }
                        }
                    }
                    Step::ApplyBinary {
                        operation,
                        left,
                        right,
                        ..
                    } => {
                        let a = slot_value(&values, *left)?;
                        let b = slot_value(&values, *right)?;
                        match operation.as_str() {
                            ops::PLUS if native => builder.ins().fadd(a, b),
                            ops::MINUS if native => builder.ins().fsub(a, b),
                            ops::TIMES if native => builder.ins().fmul(a, b),
                            ops::DIV if native => builder.ins().fdiv(a, b),
                            name => {
                                let address = &binary[binary_index[name]] as *const BinaryFn<f64>;
                                let callee = builder.ins().iconst(pointer, address as i64);
                                let call = builder.ins().call(binary_ref, &[callee, fault, a, b]);
                                builder.inst_results(call)[0]
                            }
                        }
                    }
                };
                values[step.slot()] = Some(value);
            }

            let result = slot_value(&values, program.result())?;
            builder.ins().return_(&[result]);
            builder.finalize();
        }

        let ir = ctx.func.display().to_string();
        trace!(ir = %ir, "Generated Cranelift IR");

        let id = module
            .declare_function("mast_expression", Linkage::Local, &ctx.func.signature)
            .map_err(|e| codegen_error("Failed to declare function", e))?;
        module
            .define_function(id, &mut ctx)
            .map_err(|e| codegen_error("Failed to define function", e))?;
        module.clear_context(&mut ctx);
        module
            .finalize_definitions()
            .map_err(|e| codegen_error("Failed to finalize definitions", e))?;

        let code = module.get_finalized_function(id);
        // SAFETY: the function was declared with exactly this signature.
        let function = unsafe { std::mem::transmute::<*const u8, NativeFn>(code) };

        debug!(
            steps = program.steps().len(),
            callbacks = unary.len() + binary.len(),
            "Compiled native expression"
        );

        Ok(Self {
            function,
            variables,
            unary,
            binary,
            ir,
            module: Some(module),
        })
    }

    /// The Cranelift IR the expression was compiled from
    pub fn ir(&self) -> &str {
        &self.ir
    }

    /// Free variables in argument order
    pub fn variables(&self) -> impl Iterator<Item = &Symbol> {
        self.variables.iter().map(|(symbol, _)| symbol)
    }

    /// Number of operations that call back into the algebra
    pub fn callback_count(&self) -> usize {
        self.unary.len() + self.binary.len()
    }
}

/// Lower and compile a tree in one go
pub fn compile<A>(tree: &Mst, algebra: &A, options: &CompileOptions) -> MastResult<JitExpression>
where
    A: Algebra<f64> + ?Sized,
{
    let program = lower(tree, algebra, options)?;
    JitExpression::new(&program)
}

fn is_native_unary(operation: &str) -> bool {
    matches!(operation, ops::MINUS | ops::PLUS | ops::SQRT)
}

fn is_native_binary(operation: &str) -> bool {
    matches!(operation, ops::PLUS | ops::MINUS | ops::TIMES | ops::DIV)
}

fn slot_value(values: &[Option<Value>], slot: usize) -> MastResult<Value> {
    values.get(slot).copied().flatten().ok_or_else(|| {
        MastError::MalformedProgram(format!("slot %{} read before it is written", slot))
    })
}

impl Expression<f64> for JitExpression {
    fn invoke(&self, bindings: &Bindings<f64>) -> MastResult<f64> {
        let mut arguments = Vec::with_capacity(self.variables.len());
        for (symbol, fallback) in &self.variables {
            arguments.push(match bindings.get(symbol.name()) {
                Some(value) => *value,
                None => fallback.clone()?,
            });
        }

        let mut fault: Fault = None;
        let result = (self.function)(arguments.as_ptr(), &mut fault as *mut Fault as *mut c_void);
        match fault {
            Some(error) => Err(error),
            None => Ok(result),
        }
    }
}

impl Drop for JitExpression {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: `function` is never called after the expression is dropped.
            unsafe { module.free_memory() };
        }
    }
}

impl std::fmt::Debug for JitExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitExpression")
            .field("variables", &self.variables.len())
            .field("callbacks", &self.callback_count())
            .finish()
    }
}
