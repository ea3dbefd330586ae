use thiserror::Error;

use crate::alu::IntOp;

/// Fault classes used for postmortem reporting and diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Fetched word has no entry in the dispatch table.
    Decode,
    /// Integer unit rejected its operands.
    Arithmetic,
}

/// Fatal execution conditions. Any of these aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// Opcode not present in the dispatch table.
    #[error("unsupported instruction 0x{word:08x} (opcode 0x{opcode:02x}) at pc 0x{pc:08x}")]
    UnsupportedInstruction {
        /// Address the word was fetched from.
        pc: u32,
        /// Raw instruction word.
        word: u32,
        /// Leading 8 bits of `word`.
        opcode: u8,
    },
    /// Integer division or modulo with a zero divisor.
    #[error("{op} by zero at pc 0x{pc:08x}")]
    ArithmeticFault {
        /// Address of the faulting instruction.
        pc: u32,
        /// Operation that faulted.
        op: IntOp,
    },
}

impl Fault {
    /// Stable numeric code for this fault, used in exit reporting.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::UnsupportedInstruction { .. } => 0x01,
            Self::ArithmeticFault { .. } => 0x02,
        }
    }

    /// Returns the reporting class for this fault.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::UnsupportedInstruction { .. } => FaultClass::Decode,
            Self::ArithmeticFault { .. } => FaultClass::Arithmetic,
        }
    }

    /// Program counter of the instruction that raised the fault.
    #[must_use]
    pub const fn pc(self) -> u32 {
        match self {
            Self::UnsupportedInstruction { pc, .. } | Self::ArithmeticFault { pc, .. } => pc,
        }
    }
}

/// Non-fatal conditions. They are logged and counted, and execution continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Diagnostic {
    /// Byte address read before anything was stored there. Reads as zero.
    #[error("memory at 0x{addr:08x} read before initialization")]
    UninitializedMemoryRead {
        /// Byte address that was read.
        addr: u32,
    },
    /// Write targeting `r0`. The value is discarded.
    #[error("write of 0x{value:08x} to read-only register r0 discarded")]
    ReadOnlyRegisterWrite {
        /// Value that was discarded.
        value: i32,
    },
}
