//! Mathematical syntax trees
//!
//! An [`Mst`] is an immutable expression tree: numeric literals, free-variable
//! references, and named unary/binary operations. Children are reference
//! counted, so one subtree can be shared by several parents (or several trees)
//! without copying. Equality and hashing are structural, which makes trees
//! usable as cache keys.
//!
//! The tree carries no evaluation logic. Operation names are looked up in an
//! [`Algebra`](crate::algebra::Algebra) when the tree is interpreted or compiled.
//!
//! ```
//! use mast::Mst;
//!
//! let x = Mst::symbol("x");
//! let tree = x.clone() * 2.0 + 2.0 / x.clone() - 16.0 / x.sin();
//! assert_eq!(tree.to_string(), "x * 2.0 + 2.0 / x - 16.0 / sin(x)");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

/// Canonical operation names understood by the bundled algebras
pub mod ops {
    pub const PLUS: &str = "+";
    pub const MINUS: &str = "-";
    pub const TIMES: &str = "*";
    pub const DIV: &str = "/";
    pub const POW: &str = "pow";
    pub const SQRT: &str = "sqrt";
    pub const SIN: &str = "sin";
    pub const COS: &str = "cos";
    pub const TAN: &str = "tan";
    pub const ASIN: &str = "asin";
    pub const ACOS: &str = "acos";
    pub const ATAN: &str = "atan";
    pub const SINH: &str = "sinh";
    pub const COSH: &str = "cosh";
    pub const TANH: &str = "tanh";
    pub const ASINH: &str = "asinh";
    pub const ACOSH: &str = "acosh";
    pub const ATANH: &str = "atanh";
    pub const EXP: &str = "exp";
    pub const LN: &str = "ln";

    /// Named constants resolved through `bind_symbol`
    pub const PI: &str = "pi";
    pub const E: &str = "e";
}

/// Name of a free variable
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl std::borrow::Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A type-erased numeric literal
///
/// The bound algebra decides how to turn it into a value. Reals compare and
/// hash by bit pattern so that every tree has a well-defined identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Real(r) => *r,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Integer(i) => *i < 0,
            Number::Real(r) => r.is_sign_negative(),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (Number::Real(a), Number::Real(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Number::Integer(i) => {
                state.write_u8(0);
                i.hash(state);
            }
            Number::Real(r) => {
                state.write_u8(1);
                r.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            // Debug keeps the decimal point on integral reals ("2.0")
            Number::Real(r) => write!(f, "{:?}", r),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Integer(value as i64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Real(value)
    }
}

/// A node of a mathematical syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mst {
    /// A literal number, coerced by the algebra at evaluation time
    Numeric(Number),
    /// A reference to a free variable
    Symbolic(Symbol),
    /// Application of a named unary operation
    Unary(String, Arc<Mst>),
    /// Application of a named binary operation
    Binary(String, Arc<Mst>, Arc<Mst>),
}

impl Mst {
    pub fn number(value: impl Into<Number>) -> Self {
        Mst::Numeric(value.into())
    }

    pub fn symbol(name: impl Into<Symbol>) -> Self {
        Mst::Symbolic(name.into())
    }

    pub fn unary(operation: impl Into<String>, operand: impl Into<Arc<Mst>>) -> Self {
        Mst::Unary(operation.into(), operand.into())
    }

    pub fn binary(
        operation: impl Into<String>,
        left: impl Into<Arc<Mst>>,
        right: impl Into<Arc<Mst>>,
    ) -> Self {
        Mst::Binary(operation.into(), left.into(), right.into())
    }

    pub fn pow(self, exponent: impl Into<Mst>) -> Self {
        Mst::binary(ops::POW, self, exponent.into())
    }

    pub fn sqrt(self) -> Self {
        Mst::unary(ops::SQRT, self)
    }

    pub fn sin(self) -> Self {
        Mst::unary(ops::SIN, self)
    }

    pub fn cos(self) -> Self {
        Mst::unary(ops::COS, self)
    }

    pub fn tan(self) -> Self {
        Mst::unary(ops::TAN, self)
    }

    pub fn asin(self) -> Self {
        Mst::unary(ops::ASIN, self)
    }

    pub fn acos(self) -> Self {
        Mst::unary(ops::ACOS, self)
    }

    pub fn atan(self) -> Self {
        Mst::unary(ops::ATAN, self)
    }

    pub fn sinh(self) -> Self {
        Mst::unary(ops::SINH, self)
    }

    pub fn cosh(self) -> Self {
        Mst::unary(ops::COSH, self)
    }

    pub fn tanh(self) -> Self {
        Mst::unary(ops::TANH, self)
    }

    pub fn exp(self) -> Self {
        Mst::unary(ops::EXP, self)
    }

    pub fn ln(self) -> Self {
        Mst::unary(ops::LN, self)
    }

    /// True when the tree references no free variables
    pub fn is_constant(&self) -> bool {
        self.fold_shared(&mut HashMap::new(), &|node, children: &[bool]| {
            !matches!(node, Mst::Symbolic(_)) && children.iter().all(|&constant| constant)
        })
    }

    /// Free variables referenced by the tree, in name order
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut HashSet::new(), &mut symbols);
        symbols
    }

    fn collect_symbols(&self, seen: &mut HashSet<*const Mst>, symbols: &mut BTreeSet<Symbol>) {
        if !seen.insert(self as *const Mst) {
            return;
        }
        match self {
            Mst::Numeric(_) => {}
            Mst::Symbolic(symbol) => {
                symbols.insert(symbol.clone());
            }
            Mst::Unary(_, operand) => operand.collect_symbols(seen, symbols),
            Mst::Binary(_, left, right) => {
                left.collect_symbols(seen, symbols);
                right.collect_symbols(seen, symbols);
            }
        }
    }

    /// Length of the longest root-to-leaf path, counting nodes
    pub fn depth(&self) -> usize {
        self.fold_shared(&mut HashMap::new(), &|_, children: &[usize]| {
            1 + children.iter().copied().max().unwrap_or(0)
        })
    }

    /// Number of nodes, counting shared subtrees once per reference
    ///
    /// Saturates at `usize::MAX` for heavily shared trees.
    pub fn node_count(&self) -> usize {
        self.fold_shared(&mut HashMap::new(), &|_, children: &[usize]| {
            children.iter().fold(1usize, |total, &count| total.saturating_add(count))
        })
    }

    /// Bottom-up fold that computes each distinct node (by address) once
    fn fold_shared<R, F>(&self, seen: &mut HashMap<*const Mst, R>, combine: &F) -> R
    where
        R: Copy,
        F: Fn(&Mst, &[R]) -> R,
    {
        let key = self as *const Mst;
        if let Some(&result) = seen.get(&key) {
            return result;
        }
        let result = match self {
            Mst::Numeric(_) | Mst::Symbolic(_) => combine(self, &[]),
            Mst::Unary(_, operand) => {
                let operand = operand.fold_shared(seen, combine);
                combine(self, &[operand])
            }
            Mst::Binary(_, left, right) => {
                let left = left.fold_shared(seen, combine);
                let right = right.fold_shared(seen, combine);
                combine(self, &[left, right])
            }
        };
        seen.insert(key, result);
        result
    }
}

impl From<Number> for Mst {
    fn from(value: Number) -> Self {
        Mst::Numeric(value)
    }
}

impl From<f64> for Mst {
    fn from(value: f64) -> Self {
        Mst::number(value)
    }
}

impl From<i64> for Mst {
    fn from(value: i64) -> Self {
        Mst::number(value)
    }
}

impl From<i32> for Mst {
    fn from(value: i32) -> Self {
        Mst::number(value)
    }
}

impl From<&Mst> for Mst {
    fn from(node: &Mst) -> Self {
        node.clone()
    }
}

impl From<Symbol> for Mst {
    fn from(symbol: Symbol) -> Self {
        Mst::Symbolic(symbol)
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $name:expr) => {
        impl<R: Into<Mst>> $trait<R> for Mst {
            type Output = Mst;

            fn $method(self, rhs: R) -> Mst {
                Mst::binary($name, self, rhs.into())
            }
        }

        impl<R: Into<Mst>> $trait<R> for &Mst {
            type Output = Mst;

            fn $method(self, rhs: R) -> Mst {
                Mst::binary($name, self.clone(), rhs.into())
            }
        }

        impl $trait<Mst> for f64 {
            type Output = Mst;

            fn $method(self, rhs: Mst) -> Mst {
                Mst::binary($name, Mst::number(self), rhs)
            }
        }

        impl $trait<Mst> for i64 {
            type Output = Mst;

            fn $method(self, rhs: Mst) -> Mst {
                Mst::binary($name, Mst::number(self), rhs)
            }
        }
    };
}

binary_operator!(Add, add, ops::PLUS);
binary_operator!(Sub, sub, ops::MINUS);
binary_operator!(Mul, mul, ops::TIMES);
binary_operator!(Div, div, ops::DIV);

impl Neg for Mst {
    type Output = Mst;

    fn neg(self) -> Mst {
        Mst::unary(ops::MINUS, self)
    }
}

impl Neg for &Mst {
    type Output = Mst;

    fn neg(self) -> Mst {
        Mst::unary(ops::MINUS, self.clone())
    }
}

// Binding strength used when printing; mirrors the textual grammar.
const PREC_SUM: u8 = 1;
const PREC_PRODUCT: u8 = 2;
const PREC_UNARY: u8 = 3;
const PREC_POWER: u8 = 4;
const PREC_ATOM: u8 = 5;

fn precedence(node: &Mst) -> u8 {
    match node {
        Mst::Numeric(n) if n.is_negative() => PREC_UNARY,
        Mst::Numeric(_) | Mst::Symbolic(_) => PREC_ATOM,
        Mst::Unary(op, _) if op == ops::PLUS || op == ops::MINUS => PREC_UNARY,
        Mst::Unary(_, _) => PREC_ATOM,
        Mst::Binary(op, _, _) => match op.as_str() {
            ops::PLUS | ops::MINUS => PREC_SUM,
            ops::TIMES | ops::DIV => PREC_PRODUCT,
            ops::POW => PREC_POWER,
            _ => PREC_ATOM,
        },
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &Mst, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

/// Infix rendering that the parser reads back into an equivalent tree
///
/// The grammar has no negative literals, so `Numeric(-2.0)` prints as `-2.0`
/// and reads back as a negation of `2.0`. Trees without negative literals
/// read back unchanged.
impl fmt::Display for Mst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mst::Numeric(n) => write!(f, "{}", n),
            Mst::Symbolic(s) => write!(f, "{}", s),
            Mst::Unary(op, operand) if op == ops::PLUS || op == ops::MINUS => {
                write!(f, "{}", op)?;
                write_operand(f, operand, precedence(operand) < PREC_UNARY)
            }
            Mst::Unary(op, operand) => write!(f, "{}({})", op, operand),
            Mst::Binary(op, left, right) => {
                let own = precedence(self);
                match own {
                    PREC_SUM | PREC_PRODUCT => {
                        write_operand(f, left, precedence(left) < own)?;
                        write!(f, " {} ", op)?;
                        // Operators are left-associative: an equal-strength right operand needs parentheses
                        write_operand(f, right, precedence(right) <= own)
                    }
                    PREC_POWER => {
                        write_operand(f, left, precedence(left) < PREC_ATOM)?;
                        write!(f, " ^ ")?;
                        write_operand(f, right, precedence(right) < PREC_UNARY)
                    }
                    _ => write!(f, "{}({}, {})", op, left, right),
                }
            }
        }
    }
}
