//! Exact decimal arithmetic on `rust_decimal::Decimal`
//!
//! Unlike [`RealField`](super::RealField), every operation here can fail:
//! division by zero, overflow and out-of-domain transcendental inputs are
//! reported as [`MastError::Domain`] at invocation time.

use super::{Algebra, Exponential, Field, OperationTable, PowerOps, Ring};
use crate::mst::Number;
use crate::{MastError, MastResult};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalArithmetic;

fn overflow(operation: &str, a: Decimal, b: Decimal) -> MastError {
    MastError::Domain(format!("Decimal overflow in {} {} {}", a, operation, b))
}

impl Ring<Decimal> for DecimalArithmetic {
    fn zero(&self) -> Decimal {
        Decimal::ZERO
    }

    fn one(&self) -> Decimal {
        Decimal::ONE
    }

    fn add(&self, a: Decimal, b: Decimal) -> MastResult<Decimal> {
        a.checked_add(b).ok_or_else(|| overflow("+", a, b))
    }

    fn subtract(&self, a: Decimal, b: Decimal) -> MastResult<Decimal> {
        a.checked_sub(b).ok_or_else(|| overflow("-", a, b))
    }

    fn multiply(&self, a: Decimal, b: Decimal) -> MastResult<Decimal> {
        a.checked_mul(b).ok_or_else(|| overflow("*", a, b))
    }

    fn negate(&self, a: Decimal) -> MastResult<Decimal> {
        Ok(-a)
    }
}

impl Field<Decimal> for DecimalArithmetic {
    fn divide(&self, a: Decimal, b: Decimal) -> MastResult<Decimal> {
        if b.is_zero() {
            return Err(MastError::Domain("Division by zero".to_string()));
        }
        a.checked_div(b).ok_or_else(|| overflow("/", a, b))
    }
}

impl Exponential<Decimal> for DecimalArithmetic {
    fn e(&self) -> Decimal {
        Decimal::E
    }

    fn exp(&self, a: Decimal) -> MastResult<Decimal> {
        a.checked_exp()
            .ok_or_else(|| MastError::Domain(format!("exp({}) is not representable", a)))
    }

    fn ln(&self, a: Decimal) -> MastResult<Decimal> {
        if a <= Decimal::ZERO {
            return Err(MastError::Domain(format!(
                "ln is undefined for non-positive value {}",
                a
            )));
        }
        a.checked_ln()
            .ok_or_else(|| MastError::Domain(format!("ln({}) is not representable", a)))
    }
}

impl PowerOps<Decimal> for DecimalArithmetic {
    fn power(&self, base: Decimal, exponent: Decimal) -> MastResult<Decimal> {
        base.checked_powd(exponent).ok_or_else(|| {
            MastError::Domain(format!("{} ^ {} is not representable", base, exponent))
        })
    }

    fn sqrt(&self, a: Decimal) -> MastResult<Decimal> {
        a.sqrt().ok_or_else(|| {
            MastError::Domain(format!("sqrt is undefined for negative value {}", a))
        })
    }
}

/// Exact algebra over decimals: ring, field, exponential and power operations
///
/// There is no trigonometry here, so `sin` and friends are unsupported.
#[derive(Debug)]
pub struct DecimalField {
    operations: OperationTable<Decimal>,
}

impl Default for DecimalField {
    fn default() -> Self {
        Self {
            operations: OperationTable::new()
                .with_ring(&DecimalArithmetic)
                .with_field(&DecimalArithmetic)
                .with_exponential(&DecimalArithmetic)
                .with_power(&DecimalArithmetic),
        }
    }
}

impl DecimalField {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Algebra<Decimal> for DecimalField {
    fn operations(&self) -> &OperationTable<Decimal> {
        &self.operations
    }

    fn number(&self, value: Number) -> MastResult<Decimal> {
        match value {
            Number::Integer(i) => Ok(Decimal::from(i)),
            Number::Real(r) => Decimal::from_f64(r).ok_or_else(|| {
                MastError::Domain(format!("{} cannot be represented as a decimal", r))
            }),
        }
    }
}
