//! Arithmetic unit: fixed-width 32-bit integer and 64-bit float operations.
//!
//! Integer results wrap modulo 2^32 and never trap, except division and
//! modulo by zero which report `None` so the executor can raise a fault.
//! Unsigned-flavoured operations reinterpret both operands as `u32`; the
//! bit patterns of add, sub and mul do not depend on signedness, so those
//! have no unsigned variant.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use std::fmt;

/// Binary integer operations available to R- and I-shape instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum IntOp {
    Add,
    Sub,
    Mul,
    Div,
    DivU,
    Mod,
    ModU,
    And,
    Or,
    Xor,
    Shl,
    Slr,
    Sar,
    Eq,
    Ne,
    Lt,
    LtU,
    Gt,
    GtU,
    Le,
    LeU,
    Ge,
    GeU,
}

impl IntOp {
    /// Assembler name of the register-register form.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::DivU => "divu",
            Self::Mod => "mod",
            Self::ModU => "modu",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Slr => "slr",
            Self::Sar => "sar",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::LtU => "ltu",
            Self::Gt => "gt",
            Self::GtU => "gtu",
            Self::Le => "le",
            Self::LeU => "leu",
            Self::Ge => "ge",
            Self::GeU => "geu",
        }
    }

    /// Returns true for operations that reject a zero right operand.
    #[must_use]
    pub const fn divides(self) -> bool {
        matches!(self, Self::Div | Self::DivU | Self::Mod | Self::ModU)
    }
}

impl fmt::Display for IntOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Evaluates a binary integer operation.
///
/// Returns `None` only when a dividing operation is given a zero divisor.
#[must_use]
pub const fn eval_int(op: IntOp, a: i32, b: i32) -> Option<i32> {
    let value = match op {
        IntOp::Add => a.wrapping_add(b),
        IntOp::Sub => a.wrapping_sub(b),
        IntOp::Mul => a.wrapping_mul(b),
        IntOp::Div => return floor_div(a, b),
        IntOp::DivU => return div_unsigned(a, b),
        IntOp::Mod => return rem(a, b),
        IntOp::ModU => return rem_unsigned(a, b),
        IntOp::And => a & b,
        IntOp::Or => a | b,
        IntOp::Xor => a ^ b,
        IntOp::Shl => shift_left(a, b),
        IntOp::Slr => shift_right_logical(a, b),
        IntOp::Sar => shift_right_arithmetic(a, b),
        IntOp::Eq => flag(a == b),
        IntOp::Ne => flag(a != b),
        IntOp::Lt => flag(a < b),
        IntOp::LtU => flag((a as u32) < (b as u32)),
        IntOp::Gt => flag(a > b),
        IntOp::GtU => flag((a as u32) > (b as u32)),
        IntOp::Le => flag(a <= b),
        IntOp::LeU => flag((a as u32) <= (b as u32)),
        IntOp::Ge => flag(a >= b),
        IntOp::GeU => flag((a as u32) >= (b as u32)),
    };
    Some(value)
}

/// Division rounding toward negative infinity.
#[must_use]
pub const fn floor_div(a: i32, b: i32) -> Option<i32> {
    if b == 0 {
        return None;
    }
    let quotient = a.wrapping_div(b);
    let remainder = a.wrapping_rem(b);
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        Some(quotient.wrapping_sub(1))
    } else {
        Some(quotient)
    }
}

/// Unsigned division of the operands' bit patterns.
#[must_use]
pub const fn div_unsigned(a: i32, b: i32) -> Option<i32> {
    match (a as u32).checked_div(b as u32) {
        Some(q) => Some(q as i32),
        None => None,
    }
}

/// Truncating remainder; the sign follows the dividend.
#[must_use]
pub const fn rem(a: i32, b: i32) -> Option<i32> {
    if b == 0 {
        return None;
    }
    Some(a.wrapping_rem(b))
}

/// Unsigned remainder of the operands' bit patterns.
#[must_use]
pub const fn rem_unsigned(a: i32, b: i32) -> Option<i32> {
    match (a as u32).checked_rem(b as u32) {
        Some(r) => Some(r as i32),
        None => None,
    }
}

/// Logical left shift by the low 5 bits of `count`.
#[must_use]
pub const fn shift_left(a: i32, count: i32) -> i32 {
    a.wrapping_shl(count as u32)
}

/// Zero-filling right shift by the low 5 bits of `count`.
#[must_use]
pub const fn shift_right_logical(a: i32, count: i32) -> i32 {
    (a as u32).wrapping_shr(count as u32) as i32
}

/// Sign-extending right shift by the low 5 bits of `count`.
#[must_use]
pub const fn shift_right_arithmetic(a: i32, count: i32) -> i32 {
    a.wrapping_shr(count as u32)
}

const fn flag(condition: bool) -> i32 {
    if condition {
        1
    } else {
        0
    }
}

/// Binary double-precision operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl FloatOp {
    /// Assembler name.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "addf",
            Self::Sub => "subf",
            Self::Mul => "mulf",
            Self::Div => "divf",
            Self::Mod => "modf",
        }
    }
}

/// Double-precision comparisons yielding 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FloatCmp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl FloatCmp {
    /// Assembler name.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Eq => "eqf",
            Self::Ne => "nef",
            Self::Lt => "ltf",
            Self::Gt => "gtf",
            Self::Le => "lef",
            Self::Ge => "gef",
        }
    }
}

/// Rounding of a double to an integral double.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FloatRound {
    Floor,
    Ceil,
}

/// Evaluates a binary float operation with plain IEEE-754 semantics.
#[must_use]
pub fn eval_float(op: FloatOp, a: f64, b: f64) -> f64 {
    match op {
        FloatOp::Add => a + b,
        FloatOp::Sub => a - b,
        FloatOp::Mul => a * b,
        FloatOp::Div => a / b,
        FloatOp::Mod => a % b,
    }
}

/// Compares two doubles. Any comparison against NaN is false except `Ne`.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn compare_float(op: FloatCmp, a: f64, b: f64) -> i32 {
    flag(match op {
        FloatCmp::Eq => a == b,
        FloatCmp::Ne => a != b,
        FloatCmp::Lt => a < b,
        FloatCmp::Gt => a > b,
        FloatCmp::Le => a <= b,
        FloatCmp::Ge => a >= b,
    })
}

/// Rounds a double toward negative or positive infinity.
#[must_use]
pub fn round_float(op: FloatRound, value: f64) -> f64 {
    match op {
        FloatRound::Floor => value.floor(),
        FloatRound::Ceil => value.ceil(),
    }
}

/// Converts a signed integer to a double. Exact for every `i32`.
#[must_use]
pub fn int_to_float(value: i32) -> f64 {
    f64::from(value)
}

/// Converts the unsigned reinterpretation of `value` to a double.
#[must_use]
pub fn uint_to_float(value: i32) -> f64 {
    f64::from(value as u32)
}

/// Truncates toward zero, saturating at the `i32` range; NaN becomes 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn float_to_int(value: f64) -> i32 {
    value as i32
}
