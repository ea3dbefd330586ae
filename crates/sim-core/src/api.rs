//! Host-facing configuration, outcomes and the seams a host plugs into.

use std::io::{self, Write};

use crate::debugger::StepMode;
use crate::state::MachineState;

/// Default initial stack pointer: a 200 KiB stack above `0x07C0_0000`.
pub const DEFAULT_STACK_TOP: u32 = 0x07C0_0000 + 200 * 1024;

/// Run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimConfig {
    /// Address execution starts at.
    pub entry: u32,
    /// Initial value of `sp`.
    pub stack_top: u32,
    /// Stop normally after this many retired instructions.
    pub max_instructions: Option<u64>,
    /// Initial debugger stepping mode.
    pub step_mode: StepMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            entry: 0,
            stack_top: DEFAULT_STACK_TOP,
            max_instructions: None,
            step_mode: StepMode::NoStep,
        }
    }
}

/// Result of one retired step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// The instruction retired and the loop keeps running.
    Retired {
        /// Address the instruction was fetched from.
        pc: u32,
        /// Raw instruction word.
        word: u32,
    },
    /// The halt sentinel or `halt` opcode was reached. `pc` stays on it.
    Halted {
        /// Address of the halting word.
        pc: u32,
    },
}

/// Why a run stopped normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// Halt sentinel or `halt` opcode.
    Halted {
        /// Address of the halting word.
        pc: u32,
        /// Instructions retired, not counting the halt.
        instructions: u64,
    },
    /// The instruction budget ran out.
    BudgetExhausted {
        /// Address of the next instruction that would have run.
        pc: u32,
        /// Instructions retired.
        instructions: u64,
    },
}

impl RunOutcome {
    /// Final program counter.
    #[must_use]
    pub const fn pc(self) -> u32 {
        match self {
            Self::Halted { pc, .. } | Self::BudgetExhausted { pc, .. } => pc,
        }
    }

    /// Instructions retired during the run.
    #[must_use]
    pub const fn instructions(self) -> u64 {
        match self {
            Self::Halted { instructions, .. } | Self::BudgetExhausted { instructions, .. } => {
                instructions
            }
        }
    }
}

/// Called at every instruction boundary before fetch.
///
/// Implementations may block (an interactive console) and may mutate state.
pub trait DebugHook {
    /// Runs before the instruction at `state.pc()` is fetched.
    fn before_instruction(&mut self, state: &mut MachineState);
}

impl<H: DebugHook + ?Sized> DebugHook for &mut H {
    fn before_instruction(&mut self, state: &mut MachineState) {
        (**self).before_instruction(state);
    }
}

/// Hook that never stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl DebugHook for NoopHook {
    fn before_instruction(&mut self, _state: &mut MachineState) {}
}

/// Sink for the `bout` byte stream.
pub trait ByteOutput {
    /// Receives one byte.
    fn emit(&mut self, byte: u8);
}

impl ByteOutput for Vec<u8> {
    fn emit(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl<O: ByteOutput + ?Sized> ByteOutput for &mut O {
    fn emit(&mut self, byte: u8) {
        (**self).emit(byte);
    }
}

/// Forwards bytes to a writer, flushing after each one so program output
/// interleaves correctly with the debugger console.
///
/// The first I/O error is kept and later bytes are dropped.
#[derive(Debug)]
pub struct WriterOutput<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> WriterOutput<W> {
    /// Wraps a writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Takes the first write error, if one happened.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ByteOutput for WriterOutput<W> {
    fn emit(&mut self, byte: u8) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self
            .writer
            .write_all(&[byte])
            .and_then(|()| self.writer.flush())
        {
            tracing::warn!(error = %err, "program output failed; dropping further bytes");
            self.error = Some(err);
        }
    }
}
