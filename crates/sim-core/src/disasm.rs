//! Instruction disassembly.
//!
//! Rows render as `"oo rr iiii  mnemonic\toperands"`: the opcode byte, the
//! register byte (bits 23..16) and the low halfword in hex, followed by the
//! assembler text. Registers print with their conventional names and a `$`
//! prefix.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::{self, Write as _};

use crate::decoder::{decode, DecodedInstruction};
use crate::encoding::{BranchCond, Extension, Operation, Shape};
use crate::execute::HALT_SENTINEL;
use crate::state::MachineState;

/// A single disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassemblyRow {
    /// Address the word was read from.
    pub addr: u32,
    /// Raw instruction word.
    pub word: u32,
    /// Bits 31..24.
    pub opcode: u8,
    /// Bits 23..16 (the `ra` and `rb` fields).
    pub registers: u8,
    /// Bits 15..0.
    pub imm: u16,
    /// Mnemonic, `halt` for the sentinel, or `unknown`.
    pub mnemonic: &'static str,
    /// Formatted operands; empty when the instruction takes none.
    pub operands: String,
}

impl DisassemblyRow {
    /// Returns `true` when the opcode is not in the dispatch table.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.mnemonic == "unknown"
    }
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x} {:02x} {:04x}  {}",
            self.opcode, self.registers, self.imm, self.mnemonic
        )?;
        if !self.operands.is_empty() {
            write!(f, "\t{}", self.operands)?;
        }
        Ok(())
    }
}

/// Disassembles one word as if fetched from address 0.
#[must_use]
pub fn disassemble(word: u32) -> DisassemblyRow {
    disassemble_at(0, word)
}

/// Disassembles one word fetched from `addr`.
#[must_use]
pub fn disassemble_at(addr: u32, word: u32) -> DisassemblyRow {
    let (mnemonic, operands) = if word == HALT_SENTINEL {
        ("halt", String::new())
    } else {
        decode(word).map_or_else(
            || ("unknown", String::new()),
            |instr| (instr.descriptor.mnemonic, format_operands(&instr)),
        )
    };
    DisassemblyRow {
        addr,
        word,
        opcode: (word >> 24) as u8,
        registers: (word >> 16) as u8,
        imm: word as u16,
        mnemonic,
        operands,
    }
}

/// Disassembles `before` words ahead of `center`, the word at `center`, and
/// `after` words following it. Memory is read with `peek`, so inspecting
/// never records diagnostics.
#[must_use]
pub fn disassemble_window(
    state: &MachineState,
    center: u32,
    before: u32,
    after: u32,
) -> Vec<DisassemblyRow> {
    let start = center.wrapping_sub(before.wrapping_mul(4));
    (0..=before.saturating_add(after))
        .map(|index| {
            let addr = start.wrapping_add(index.wrapping_mul(4));
            disassemble_at(addr, state.peek_u32(addr))
        })
        .collect()
}

fn format_operands(instr: &DecodedInstruction) -> String {
    let ops = instr.operands;
    let (ra, rb, rc) = (ops.ra.name(), ops.rb.name(), ops.rc.name());
    let raw = instr.word as u16;
    let imm = match instr.descriptor.shape {
        Shape::I(Extension::Zero) => format!("0x{raw:04x}"),
        _ => (raw as i16).to_string(),
    };

    let mut text = String::new();
    // Writing into a String cannot fail.
    let _ = match instr.descriptor.operation {
        Operation::Int(_) if matches!(instr.descriptor.shape, Shape::I(_)) => {
            write!(text, "${ra}, ${rb}, {imm}")
        }
        Operation::Branch(BranchCond::Always) => write!(text, "{imm}"),
        Operation::Branch(_) | Operation::Load(_) | Operation::Store(_) => {
            write!(text, "${ra}, ${rb}, {imm}")
        }
        Operation::Int(_) | Operation::Float(_) | Operation::FloatCompare(_) => {
            write!(text, "${ra}, ${rb}, ${rc}")
        }
        Operation::Not
        | Operation::ByteIn
        | Operation::ByteOut
        | Operation::IntToFloat
        | Operation::UintToFloat
        | Operation::FloatToInt
        | Operation::FloatRound(_) => write!(text, "${ra}, ${rb}"),
        Operation::LoadImmediate | Operation::LoadUpper | Operation::SetFlag => {
            write!(text, "${ra}, {imm}")
        }
        Operation::JumpRegister
        | Operation::Call
        | Operation::Push(_)
        | Operation::Pop(_)
        | Operation::PushFloat
        | Operation::PopFloat
        | Operation::MoveFromIvec
        | Operation::MoveToIvec
        | Operation::MoveFromPtbr
        | Operation::MoveToPtbr
        | Operation::LoadFlags => write!(text, "${ra}"),
        Operation::JumpAbsolute => write!(text, "0x{:06x}", ops.imm),
        Operation::Nop | Operation::Ret | Operation::Halt => Ok(()),
    };
    text
}
