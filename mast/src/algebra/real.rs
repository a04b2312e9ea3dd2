//! The field of IEEE-754 double precision reals

use super::{
    Algebra, Exponential, Field, Hyperbolic, OperationTable, PowerOps, Ring, Trigonometric,
};
use crate::mst::Number;
use crate::MastResult;

/// Capability implementations for `f64`
///
/// Operations are total: out-of-domain inputs produce NaN or infinities the
/// way `f64` arithmetic does, never an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealArithmetic;

impl Ring<f64> for RealArithmetic {
    fn zero(&self) -> f64 {
        0.0
    }

    fn one(&self) -> f64 {
        1.0
    }

    fn add(&self, a: f64, b: f64) -> MastResult<f64> {
        Ok(a + b)
    }

    fn subtract(&self, a: f64, b: f64) -> MastResult<f64> {
        Ok(a - b)
    }

    fn multiply(&self, a: f64, b: f64) -> MastResult<f64> {
        Ok(a * b)
    }

    fn negate(&self, a: f64) -> MastResult<f64> {
        Ok(-a)
    }
}

impl Field<f64> for RealArithmetic {
    fn divide(&self, a: f64, b: f64) -> MastResult<f64> {
        Ok(a / b)
    }
}

impl Trigonometric<f64> for RealArithmetic {
    fn pi(&self) -> f64 {
        std::f64::consts::PI
    }

    fn sin(&self, a: f64) -> MastResult<f64> {
        Ok(a.sin())
    }

    fn cos(&self, a: f64) -> MastResult<f64> {
        Ok(a.cos())
    }

    fn tan(&self, a: f64) -> MastResult<f64> {
        Ok(a.tan())
    }

    fn asin(&self, a: f64) -> MastResult<f64> {
        Ok(a.asin())
    }

    fn acos(&self, a: f64) -> MastResult<f64> {
        Ok(a.acos())
    }

    fn atan(&self, a: f64) -> MastResult<f64> {
        Ok(a.atan())
    }
}

impl Hyperbolic<f64> for RealArithmetic {
    fn sinh(&self, a: f64) -> MastResult<f64> {
        Ok(a.sinh())
    }

    fn cosh(&self, a: f64) -> MastResult<f64> {
        Ok(a.cosh())
    }

    fn tanh(&self, a: f64) -> MastResult<f64> {
        Ok(a.tanh())
    }

    fn asinh(&self, a: f64) -> MastResult<f64> {
        Ok(a.asinh())
    }

    fn acosh(&self, a: f64) -> MastResult<f64> {
        Ok(a.acosh())
    }

    fn atanh(&self, a: f64) -> MastResult<f64> {
        Ok(a.atanh())
    }
}

impl Exponential<f64> for RealArithmetic {
    fn e(&self) -> f64 {
        std::f64::consts::E
    }

    fn exp(&self, a: f64) -> MastResult<f64> {
        Ok(a.exp())
    }

    fn ln(&self, a: f64) -> MastResult<f64> {
        Ok(a.ln())
    }
}

impl PowerOps<f64> for RealArithmetic {
    fn power(&self, base: f64, exponent: f64) -> MastResult<f64> {
        Ok(base.powf(exponent))
    }

    fn sqrt(&self, a: f64) -> MastResult<f64> {
        Ok(a.sqrt())
    }
}

/// Algebra over `f64` with every extended-field capability
#[derive(Debug)]
pub struct RealField {
    operations: OperationTable<f64>,
}

impl Default for RealField {
    fn default() -> Self {
        Self {
            operations: OperationTable::new().with_extended_field(&RealArithmetic),
        }
    }
}

impl RealField {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Algebra<f64> for RealField {
    fn operations(&self) -> &OperationTable<f64> {
        &self.operations
    }

    fn number(&self, value: Number) -> MastResult<f64> {
        Ok(value.as_f64())
    }

    fn is_ieee754(&self) -> bool {
        true
    }
}
