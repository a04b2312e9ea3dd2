//! Capability sets an algebra can declare
//!
//! Each trait is a small, independent group of operations. An algebra
//! implements the groups it supports and registers them into its
//! [`OperationTable`](super::OperationTable); [`ExtendedField`] is just the
//! union of the groups a real-like field provides.

use super::Value;
use crate::MastResult;

/// Addition, subtraction, multiplication and negation
pub trait Ring<T: Value>: Clone + Send + Sync + 'static {
    fn zero(&self) -> T;
    fn one(&self) -> T;
    fn add(&self, a: T, b: T) -> MastResult<T>;
    fn subtract(&self, a: T, b: T) -> MastResult<T>;
    fn multiply(&self, a: T, b: T) -> MastResult<T>;
    fn negate(&self, a: T) -> MastResult<T>;
}

/// A ring with division
pub trait Field<T: Value>: Ring<T> {
    fn divide(&self, a: T, b: T) -> MastResult<T>;
}

pub trait Trigonometric<T: Value>: Clone + Send + Sync + 'static {
    fn pi(&self) -> T;
    fn sin(&self, a: T) -> MastResult<T>;
    fn cos(&self, a: T) -> MastResult<T>;
    fn tan(&self, a: T) -> MastResult<T>;
    fn asin(&self, a: T) -> MastResult<T>;
    fn acos(&self, a: T) -> MastResult<T>;
    fn atan(&self, a: T) -> MastResult<T>;
}

pub trait Hyperbolic<T: Value>: Clone + Send + Sync + 'static {
    fn sinh(&self, a: T) -> MastResult<T>;
    fn cosh(&self, a: T) -> MastResult<T>;
    fn tanh(&self, a: T) -> MastResult<T>;
    fn asinh(&self, a: T) -> MastResult<T>;
    fn acosh(&self, a: T) -> MastResult<T>;
    fn atanh(&self, a: T) -> MastResult<T>;
}

pub trait Exponential<T: Value>: Clone + Send + Sync + 'static {
    fn e(&self) -> T;
    fn exp(&self, a: T) -> MastResult<T>;
    fn ln(&self, a: T) -> MastResult<T>;
}

pub trait PowerOps<T: Value>: Clone + Send + Sync + 'static {
    fn power(&self, base: T, exponent: T) -> MastResult<T>;
    fn sqrt(&self, a: T) -> MastResult<T>;
}

/// Field with transcendental functions
pub trait ExtendedField<T: Value>:
    Field<T> + Trigonometric<T> + Hyperbolic<T> + Exponential<T> + PowerOps<T>
{
}

impl<T, A> ExtendedField<T> for A
where
    T: Value,
    A: Field<T> + Trigonometric<T> + Hyperbolic<T> + Exponential<T> + PowerOps<T>,
{
}
