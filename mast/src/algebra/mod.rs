//! Algebra capability contract
//!
//! An algebra tells the evaluators what a tree's operation names and literals
//! mean for one value type. Each algebra owns an [`OperationTable`]: an explicit
//! name-to-function record built once per instance from the capability sets
//! the algebra declares ([`Ring`], [`Field`], [`Trigonometric`], ...). Lookups
//! fail closed with [`MastError::UnsupportedOperation`].

pub mod capabilities;
pub mod decimal;
pub mod real;

pub use capabilities::{
    Exponential, ExtendedField, Field, Hyperbolic, PowerOps, Ring, Trigonometric,
};
pub use decimal::{DecimalArithmetic, DecimalField};
pub use real::{RealArithmetic, RealField};

use crate::mst::{ops, Number};
use crate::{MastError, MastResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Values an algebra can operate on
pub trait Value: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> Value for T {}

/// Implementation of a named unary operation
pub type UnaryFn<T> = Arc<dyn Fn(T) -> MastResult<T> + Send + Sync>;

/// Implementation of a named binary operation
pub type BinaryFn<T> = Arc<dyn Fn(T, T) -> MastResult<T> + Send + Sync>;

/// The contract every value domain implements to be usable with trees
///
/// Operation lookups are referentially stable: asking twice for the same name
/// returns the same function, so backends resolve each name once.
pub trait Algebra<T: Value>: Send + Sync {
    /// The capability record backing the default lookups
    fn operations(&self) -> &OperationTable<T>;

    /// Coerce a tree literal into a value
    fn number(&self, value: Number) -> MastResult<T>;

    /// Resolve a named constant, if the algebra knows one by that name
    fn bind_symbol_or_none(&self, name: &str) -> Option<T> {
        self.operations().constant(name).cloned()
    }

    /// Resolve a named constant or fail with `UnboundSymbol`
    fn bind_symbol(&self, name: &str) -> MastResult<T> {
        self.bind_symbol_or_none(name)
            .ok_or_else(|| MastError::UnboundSymbol(name.to_string()))
    }

    fn unary_operation_function(&self, operation: &str) -> MastResult<UnaryFn<T>> {
        self.operations()
            .unary(operation)
            .cloned()
            .ok_or_else(|| MastError::unsupported_unary(operation))
    }

    fn binary_operation_function(&self, operation: &str) -> MastResult<BinaryFn<T>> {
        self.operations()
            .binary(operation)
            .cloned()
            .ok_or_else(|| MastError::unsupported_binary(operation))
    }

    /// True only if `+ - * /`, unary `-`/`+` and `sqrt` are exactly the
    /// IEEE-754 operations on `f64`
    ///
    /// Native code generation replaces those operations with machine
    /// instructions when this holds and calls the algebra's functions otherwise.
    fn is_ieee754(&self) -> bool {
        false
    }
}

impl<T: Value, A: Algebra<T> + ?Sized> Algebra<T> for Arc<A> {
    fn operations(&self) -> &OperationTable<T> {
        (**self).operations()
    }

    fn number(&self, value: Number) -> MastResult<T> {
        (**self).number(value)
    }

    fn bind_symbol_or_none(&self, name: &str) -> Option<T> {
        (**self).bind_symbol_or_none(name)
    }

    fn bind_symbol(&self, name: &str) -> MastResult<T> {
        (**self).bind_symbol(name)
    }

    fn unary_operation_function(&self, operation: &str) -> MastResult<UnaryFn<T>> {
        (**self).unary_operation_function(operation)
    }

    fn binary_operation_function(&self, operation: &str) -> MastResult<BinaryFn<T>> {
        (**self).binary_operation_function(operation)
    }

    fn is_ieee754(&self) -> bool {
        (**self).is_ieee754()
    }
}

/// Explicit mapping from operation names to implementations
pub struct OperationTable<T> {
    unary: HashMap<String, UnaryFn<T>>,
    binary: HashMap<String, BinaryFn<T>>,
    constants: HashMap<String, T>,
}

impl<T: Value> Default for OperationTable<T> {
    fn default() -> Self {
        Self {
            unary: HashMap::new(),
            binary: HashMap::new(),
            constants: HashMap::new(),
        }
    }
}

impl<T> fmt::Debug for OperationTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut unary: Vec<&String> = self.unary.keys().collect();
        let mut binary: Vec<&String> = self.binary.keys().collect();
        let mut constants: Vec<&String> = self.constants.keys().collect();
        unary.sort();
        binary.sort();
        constants.sort();
        f.debug_struct("OperationTable")
            .field("unary", &unary)
            .field("binary", &binary)
            .field("constants", &constants)
            .finish()
    }
}

impl<T: Value> OperationTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unary(
        mut self,
        name: impl Into<String>,
        function: impl Fn(T) -> MastResult<T> + Send + Sync + 'static,
    ) -> Self {
        self.unary.insert(name.into(), Arc::new(function));
        self
    }

    pub fn with_binary(
        mut self,
        name: impl Into<String>,
        function: impl Fn(T, T) -> MastResult<T> + Send + Sync + 'static,
    ) -> Self {
        self.binary.insert(name.into(), Arc::new(function));
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: T) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn unary(&self, name: &str) -> Option<&UnaryFn<T>> {
        self.unary.get(name)
    }

    pub fn binary(&self, name: &str) -> Option<&BinaryFn<T>> {
        self.binary.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&T> {
        self.constants.get(name)
    }

    /// Registered unary operation names, sorted
    pub fn unary_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.unary.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered binary operation names, sorted
    pub fn binary_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.binary.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Addition, subtraction, multiplication, and unary plus/minus
    pub fn with_ring<A: Ring<T>>(self, algebra: &A) -> Self {
        let (add, sub, mul, neg) = (
            algebra.clone(),
            algebra.clone(),
            algebra.clone(),
            algebra.clone(),
        );
        self.with_binary(ops::PLUS, move |a, b| add.add(a, b))
            .with_binary(ops::MINUS, move |a, b| sub.subtract(a, b))
            .with_binary(ops::TIMES, move |a, b| mul.multiply(a, b))
            .with_unary(ops::MINUS, move |a| neg.negate(a))
            .with_unary(ops::PLUS, Ok)
    }

    /// Division
    pub fn with_field<A: Field<T>>(self, algebra: &A) -> Self {
        let div = algebra.clone();
        self.with_binary(ops::DIV, move |a, b| div.divide(a, b))
    }

    /// Circular functions and the constant `pi`
    pub fn with_trigonometric<A: Trigonometric<T>>(self, algebra: &A) -> Self {
        let table = self.with_constant(ops::PI, algebra.pi());
        let functions: [(&str, fn(&A, T) -> MastResult<T>); 6] = [
            (ops::SIN, A::sin),
            (ops::COS, A::cos),
            (ops::TAN, A::tan),
            (ops::ASIN, A::asin),
            (ops::ACOS, A::acos),
            (ops::ATAN, A::atan),
        ];
        register_unary(table, algebra, functions)
    }

    /// Hyperbolic functions
    pub fn with_hyperbolic<A: Hyperbolic<T>>(self, algebra: &A) -> Self {
        let functions: [(&str, fn(&A, T) -> MastResult<T>); 6] = [
            (ops::SINH, A::sinh),
            (ops::COSH, A::cosh),
            (ops::TANH, A::tanh),
            (ops::ASINH, A::asinh),
            (ops::ACOSH, A::acosh),
            (ops::ATANH, A::atanh),
        ];
        register_unary(self, algebra, functions)
    }

    /// `exp`, `ln` and the constant `e`
    pub fn with_exponential<A: Exponential<T>>(self, algebra: &A) -> Self {
        let table = self.with_constant(ops::E, algebra.e());
        let functions: [(&str, fn(&A, T) -> MastResult<T>); 2] =
            [(ops::EXP, A::exp), (ops::LN, A::ln)];
        register_unary(table, algebra, functions)
    }

    /// `pow` and `sqrt`
    pub fn with_power<A: PowerOps<T>>(self, algebra: &A) -> Self {
        let (pow, sqrt) = (algebra.clone(), algebra.clone());
        self.with_binary(ops::POW, move |a, b| pow.power(a, b))
            .with_unary(ops::SQRT, move |a| sqrt.sqrt(a))
    }

    /// Every capability of an extended field
    pub fn with_extended_field<A: ExtendedField<T>>(self, algebra: &A) -> Self {
        self.with_ring(algebra)
            .with_field(algebra)
            .with_trigonometric(algebra)
            .with_hyperbolic(algebra)
            .with_exponential(algebra)
            .with_power(algebra)
    }
}

fn register_unary<T, A, const N: usize>(
    mut table: OperationTable<T>,
    algebra: &A,
    functions: [(&str, fn(&A, T) -> MastResult<T>); N],
) -> OperationTable<T>
where
    T: Value,
    A: Clone + Send + Sync + 'static,
{
    for (name, function) in functions {
        let algebra = algebra.clone();
        table = table.with_unary(name, move |a| function(&algebra, a));
    }
    table
}
