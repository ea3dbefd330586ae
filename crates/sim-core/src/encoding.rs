//! Opcode dispatch table.
//!
//! Every assigned opcode maps to one [`OpcodeDescriptor`]: how its operands
//! are decoded, what it does, and how the next program counter is chosen.
//! [`OPCODE_TABLE`] is a 256-entry array built at compile time from
//! [`OPCODE_DESCRIPTORS`]; an empty slot means the opcode is unsupported.

use crate::alu::{FloatCmp, FloatOp, FloatRound, IntOp};

use Extension::{Sign, Zero};
use Operation::{Int, Load, Pop, Push, Store};

/// How a 16-bit immediate widens to 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Two's-complement sign extension.
    Sign,
    /// Zero extension.
    Zero,
    /// Sign extension followed by a multiply by 4 (word-addressed branch offsets).
    Offset,
}

impl Extension {
    /// Applies this policy to a raw 16-bit immediate.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn apply(self, raw: u16) -> i32 {
        match self {
            Self::Sign => raw as i16 as i32,
            Self::Zero => raw as i32,
            Self::Offset => (raw as i16 as i32).wrapping_mul(4),
        }
    }
}

/// Operand layout of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Three 4-bit register fields.
    R,
    /// Two register fields and a 16-bit immediate.
    I(Extension),
    /// A single 24-bit immediate.
    J,
}

/// Access width for loads, stores and stack transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Width {
    Word,
    Half,
    Byte,
}

impl Width {
    /// Size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Word => 4,
            Self::Half => 2,
            Self::Byte => 1,
        }
    }
}

/// Predicate evaluated by conditional branches on `ra` and `rb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BranchCond {
    Always,
    Eq,
    Ne,
    Lt,
    Gt,
}

impl BranchCond {
    /// Evaluates the predicate on two signed register values.
    #[must_use]
    pub const fn holds(self, a: i32, b: i32) -> bool {
        match self {
            Self::Always => true,
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Lt => a < b,
            Self::Gt => a > b,
        }
    }
}

/// Semantic action of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// No effect.
    Nop,
    /// `ra <- rb op rc` or `ra <- rb op imm`.
    Int(IntOp),
    /// `ra <- !rb`.
    Not,
    /// PC-relative branch when the predicate holds.
    Branch(BranchCond),
    /// `pc <- (pc & 0xFC00_0000) | (imm24 << 2)`.
    JumpAbsolute,
    /// `pc <- ra`.
    JumpRegister,
    /// Push the return address, then `pc <- ra`.
    Call,
    /// Pop the return address into `pc`.
    Ret,
    /// Zero-extending load `ra <- mem[rb + imm]`.
    Load(Width),
    /// `mem[rb + imm] <- ra`, truncated to the width.
    Store(Width),
    /// `ra <- imm`.
    LoadImmediate,
    /// `ra <- (imm << 16) | (ra & 0xFFFF)`.
    LoadUpper,
    /// Pre-decrement `sp` and store `ra`.
    Push(Width),
    /// Load `ra` and post-increment `sp`.
    Pop(Width),
    /// Push the 8-byte float register `f[ra]`.
    PushFloat,
    /// Pop 8 bytes into `f[ra]`.
    PopFloat,
    /// `f[ra] <- r[rb]` as signed.
    IntToFloat,
    /// `f[ra] <- r[rb]` as unsigned.
    UintToFloat,
    /// `r[ra] <- trunc(f[rb])`.
    FloatToInt,
    /// `f[ra] <- f[rb] op f[rc]`.
    Float(FloatOp),
    /// `r[ra] <- f[rb] cmp f[rc]`.
    FloatCompare(FloatCmp),
    /// `f[ra] <- round(f[rb])`.
    FloatRound(FloatRound),
    /// Byte input. No device is attached, so it does nothing.
    ByteIn,
    /// Emit the low byte of `ra`.
    ByteOut,
    /// `ra <- IVEC`.
    MoveFromIvec,
    /// `IVEC <- ra`.
    MoveToIvec,
    /// `ra <- PTBR`.
    MoveFromPtbr,
    /// `PTBR <- ra`.
    MoveToPtbr,
    /// `ra <- FLGS`.
    LoadFlags,
    /// Set `FLGS` bit `imm & 31` when `ra != 0`, clear it otherwise.
    SetFlag,
    /// Stop the execution loop.
    Halt,
}

/// Next-PC policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextPc {
    /// `pc <- pc + 4`.
    Sequential,
    /// `pc <- target` produced by the action.
    Jump,
}

/// Dispatch entry for one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeDescriptor {
    /// Leading 8 bits of the instruction word.
    pub opcode: u8,
    /// Assembler mnemonic.
    pub mnemonic: &'static str,
    /// Operand layout.
    pub shape: Shape,
    /// Semantic action.
    pub operation: Operation,
    /// Next-PC policy.
    pub next_pc: NextPc,
}

const fn r(opcode: u8, mnemonic: &'static str, operation: Operation) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode,
        mnemonic,
        shape: Shape::R,
        operation,
        next_pc: NextPc::Sequential,
    }
}

const fn i(
    opcode: u8,
    mnemonic: &'static str,
    extension: Extension,
    operation: Operation,
) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode,
        mnemonic,
        shape: Shape::I(extension),
        operation,
        next_pc: NextPc::Sequential,
    }
}

const fn jump(
    opcode: u8,
    mnemonic: &'static str,
    shape: Shape,
    operation: Operation,
) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode,
        mnemonic,
        shape,
        operation,
        next_pc: NextPc::Jump,
    }
}

const fn branch(opcode: u8, mnemonic: &'static str, cond: BranchCond) -> OpcodeDescriptor {
    jump(
        opcode,
        mnemonic,
        Shape::I(Extension::Offset),
        Operation::Branch(cond),
    )
}

/// Every assigned opcode, in opcode order.
pub const OPCODE_DESCRIPTORS: &[OpcodeDescriptor] = &[
    r(0x00, "nop", Operation::Nop),
    r(0x01, "add", Int(IntOp::Add)),
    i(0x02, "addi", Sign, Int(IntOp::Add)),
    i(0x03, "addiu", Zero, Int(IntOp::Add)),
    r(0x04, "sub", Int(IntOp::Sub)),
    i(0x05, "subi", Sign, Int(IntOp::Sub)),
    i(0x06, "subiu", Zero, Int(IntOp::Sub)),
    r(0x07, "mul", Int(IntOp::Mul)),
    i(0x08, "muli", Sign, Int(IntOp::Mul)),
    i(0x09, "muliu", Zero, Int(IntOp::Mul)),
    r(0x0A, "div", Int(IntOp::Div)),
    i(0x0B, "divi", Sign, Int(IntOp::Div)),
    i(0x0C, "diviu", Zero, Int(IntOp::DivU)),
    r(0x0D, "mod", Int(IntOp::Mod)),
    i(0x0E, "modi", Sign, Int(IntOp::Mod)),
    i(0x0F, "modiu", Zero, Int(IntOp::ModU)),
    r(0x10, "shl", Int(IntOp::Shl)),
    i(0x11, "shli", Zero, Int(IntOp::Shl)),
    r(0x12, "slr", Int(IntOp::Slr)),
    i(0x13, "slri", Zero, Int(IntOp::Slr)),
    r(0x14, "sar", Int(IntOp::Sar)),
    i(0x15, "sari", Zero, Int(IntOp::Sar)),
    r(0x16, "and", Int(IntOp::And)),
    r(0x17, "or", Int(IntOp::Or)),
    r(0x18, "xor", Int(IntOp::Xor)),
    r(0x19, "not", Operation::Not),
    r(0x1A, "eq", Int(IntOp::Eq)),
    r(0x1B, "ne", Int(IntOp::Ne)),
    r(0x1C, "lt", Int(IntOp::Lt)),
    r(0x1D, "ltu", Int(IntOp::LtU)),
    r(0x1E, "gt", Int(IntOp::Gt)),
    r(0x1F, "gtu", Int(IntOp::GtU)),
    r(0x20, "le", Int(IntOp::Le)),
    r(0x21, "leu", Int(IntOp::LeU)),
    r(0x22, "ge", Int(IntOp::Ge)),
    r(0x23, "geu", Int(IntOp::GeU)),
    branch(0x24, "b", BranchCond::Always),
    branch(0x25, "beq", BranchCond::Eq),
    branch(0x26, "bne", BranchCond::Ne),
    branch(0x27, "blt", BranchCond::Lt),
    branch(0x28, "bgt", BranchCond::Gt),
    jump(0x29, "j", Shape::J, Operation::JumpAbsolute),
    jump(0x2A, "jr", Shape::R, Operation::JumpRegister),
    jump(0x2B, "call", Shape::R, Operation::Call),
    jump(0x2C, "ret", Shape::R, Operation::Ret),
    i(0x2D, "lw", Sign, Load(Width::Word)),
    i(0x2E, "lh", Sign, Load(Width::Half)),
    i(0x2F, "lb", Sign, Load(Width::Byte)),
    i(0x31, "li", Sign, Operation::LoadImmediate),
    i(0x32, "liu", Zero, Operation::LoadImmediate),
    i(0x33, "lih", Zero, Operation::LoadUpper),
    i(0x34, "sw", Sign, Store(Width::Word)),
    i(0x35, "sh", Sign, Store(Width::Half)),
    i(0x36, "sb", Sign, Store(Width::Byte)),
    r(0x38, "popw", Pop(Width::Word)),
    r(0x39, "poph", Pop(Width::Half)),
    r(0x3A, "popb", Pop(Width::Byte)),
    r(0x3C, "popa", Operation::PopFloat),
    r(0x3D, "pshw", Push(Width::Word)),
    r(0x3E, "pshh", Push(Width::Half)),
    r(0x3F, "pshb", Push(Width::Byte)),
    r(0x41, "psha", Operation::PushFloat),
    i(0x42, "ori", Zero, Int(IntOp::Or)),
    r(0x43, "divu", Int(IntOp::DivU)),
    r(0x44, "modu", Int(IntOp::ModU)),
    r(0x45, "itof", Operation::IntToFloat),
    r(0x46, "itofu", Operation::UintToFloat),
    r(0x47, "ftoi", Operation::FloatToInt),
    r(0x48, "addf", Operation::Float(FloatOp::Add)),
    r(0x49, "subf", Operation::Float(FloatOp::Sub)),
    r(0x4A, "mulf", Operation::Float(FloatOp::Mul)),
    r(0x4B, "divf", Operation::Float(FloatOp::Div)),
    r(0x4C, "modf", Operation::Float(FloatOp::Mod)),
    r(0x4D, "eqf", Operation::FloatCompare(FloatCmp::Eq)),
    r(0x4E, "nef", Operation::FloatCompare(FloatCmp::Ne)),
    r(0x4F, "ltf", Operation::FloatCompare(FloatCmp::Lt)),
    r(0x50, "gtf", Operation::FloatCompare(FloatCmp::Gt)),
    r(0x51, "lef", Operation::FloatCompare(FloatCmp::Le)),
    r(0x52, "gef", Operation::FloatCompare(FloatCmp::Ge)),
    r(0x53, "floor", Operation::FloatRound(FloatRound::Floor)),
    r(0x54, "ceil", Operation::FloatRound(FloatRound::Ceil)),
    r(0x80, "bin", Operation::ByteIn),
    r(0x81, "bout", Operation::ByteOut),
    r(0x82, "mfiv", Operation::MoveFromIvec),
    r(0x83, "mtiv", Operation::MoveToIvec),
    r(0x84, "mfpt", Operation::MoveFromPtbr),
    r(0x85, "mtpt", Operation::MoveToPtbr),
    r(0x86, "lflg", Operation::LoadFlags),
    i(0x87, "sflg", Zero, Operation::SetFlag),
    r(0xFF, "halt", Operation::Halt),
];

const fn build_table() -> [Option<OpcodeDescriptor>; 256] {
    let mut table = [None; 256];
    let mut index = 0;
    while index < OPCODE_DESCRIPTORS.len() {
        let descriptor = OPCODE_DESCRIPTORS[index];
        table[descriptor.opcode as usize] = Some(descriptor);
        index += 1;
    }
    table
}

/// Opcode-indexed dispatch table.
pub static OPCODE_TABLE: [Option<OpcodeDescriptor>; 256] = build_table();

/// Looks up the descriptor for an opcode.
#[must_use]
pub fn lookup(opcode: u8) -> Option<&'static OpcodeDescriptor> {
    OPCODE_TABLE[opcode as usize].as_ref()
}

/// Returns the leading 8 bits of an instruction word.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn opcode_of(word: u32) -> u8 {
    (word >> 24) as u8
}
