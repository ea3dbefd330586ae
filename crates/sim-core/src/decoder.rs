//! Operand extraction for the three instruction shapes.
//!
//! Field extraction never fails: register fields are 4 bits wide and every
//! value names a register. Only the opcode lookup can miss.

#![allow(clippy::cast_possible_truncation)]

use crate::encoding::{lookup, opcode_of, OpcodeDescriptor, Shape};
use crate::state::GeneralRegister;

/// Operand fields of a decoded instruction.
///
/// Fields a shape does not use are left at `R0` / `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operands {
    /// Bits 23..20.
    pub ra: GeneralRegister,
    /// Bits 19..16.
    pub rb: GeneralRegister,
    /// Bits 15..12 (R-shape only).
    pub rc: GeneralRegister,
    /// Extended immediate (I-shape) or raw 24-bit immediate (J-shape).
    pub imm: i32,
}

impl Operands {
    /// Extracts the operand fields of `word` for `shape`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn extract(word: u32, shape: Shape) -> Self {
        let ra = GeneralRegister::from_u4((word >> 20) as u8);
        let rb = GeneralRegister::from_u4((word >> 16) as u8);
        match shape {
            Shape::R => Self {
                ra,
                rb,
                rc: GeneralRegister::from_u4((word >> 12) as u8),
                imm: 0,
            },
            Shape::I(extension) => Self {
                ra,
                rb,
                rc: GeneralRegister::R0,
                imm: extension.apply(word as u16),
            },
            Shape::J => Self {
                ra: GeneralRegister::R0,
                rb: GeneralRegister::R0,
                rc: GeneralRegister::R0,
                imm: (word & 0x00FF_FFFF) as i32,
            },
        }
    }
}

/// An instruction word paired with its dispatch entry and operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Raw 32-bit word as fetched.
    pub word: u32,
    /// Dispatch entry selected by the opcode.
    pub descriptor: &'static OpcodeDescriptor,
    /// Operand fields.
    pub operands: Operands,
}

/// Decodes an instruction word. Returns `None` when the opcode is unmapped.
#[must_use]
pub fn decode(word: u32) -> Option<DecodedInstruction> {
    let descriptor = lookup(opcode_of(word))?;
    Some(DecodedInstruction {
        word,
        descriptor,
        operands: Operands::extract(word, descriptor.shape),
    })
}
