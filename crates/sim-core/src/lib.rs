//! Core simulator crate for the Alex Machine.

/// Sparse byte-addressable memory.
pub mod memory;
pub use memory::{SparseMemory, PAGE_SHIFT, PAGE_SIZE};

/// Non-fatal diagnostic counters.
pub mod diag;
pub use diag::Diagnostics;

/// Host-facing configuration, outcomes and integration seams.
pub mod api;
pub use api::{
    ByteOutput, DebugHook, NoopHook, RunOutcome, SimConfig, StepOutcome, WriterOutput,
    DEFAULT_STACK_TOP,
};

/// Architectural machine state.
pub mod state;
pub use state::{
    GeneralRegister, MachineSnapshot, MachineState, RegisterFile, RunState,
    FLOAT_REGISTER_COUNT, GENERAL_REGISTER_COUNT, REGISTER_NAMES,
};

/// Integer and floating-point arithmetic semantics.
pub mod alu;
pub use alu::{FloatCmp, FloatOp, FloatRound, IntOp};

/// Opcode descriptors and the dispatch table.
pub mod encoding;
pub use encoding::{
    lookup, opcode_of, BranchCond, Extension, NextPc, OpcodeDescriptor, Operation, Shape, Width,
    OPCODE_DESCRIPTORS, OPCODE_TABLE,
};

/// Instruction word decoding.
pub mod decoder;
pub use decoder::{decode, DecodedInstruction, Operands};

/// Fault taxonomy and non-fatal diagnostics.
pub mod fault;
pub use fault::{Diagnostic, Fault, FaultClass};

/// Instruction execution pipeline and the run loop.
pub mod execute;
pub use execute::{
    execute_instruction, step_one, ExecuteOutcome, Simulator, HALT_SENTINEL,
};

/// Disassembly rendering.
pub mod disasm;
pub use disasm::{disassemble, disassemble_at, disassemble_window, DisassemblyRow};

/// Machine context captured on faults and on request.
pub mod context;
pub use context::{ContextDump, RunError};

/// Breakpoints, stepping and the interactive console.
pub mod debugger;
pub use debugger::{
    Command, ConsoleAction, ConsoleError, DebugInfo, Debugger, LocalVariable, SourceLocation,
    StaticDebugInfo, StepMode, StopReason, Target, VariableLocation, CONSOLE_PROMPT, USAGE_TEXT,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
