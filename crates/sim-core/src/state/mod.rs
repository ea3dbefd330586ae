//! Machine state: registers, program counter and sparse memory.

/// Integer, float and privileged register storage.
pub mod registers;
/// Execution-loop run state.
pub mod run_state;

pub use registers::{
    GeneralRegister, RegisterFile, FLOAT_REGISTER_COUNT, GENERAL_REGISTER_COUNT, REGISTER_NAMES,
};
pub use run_state::RunState;

use tracing::warn;

use crate::diag::Diagnostics;
use crate::fault::Diagnostic;
use crate::memory::SparseMemory;

/// Complete architectural state of one machine.
///
/// Reads through the `read_*` family are execution-path reads: touching a
/// byte that was never written records an
/// [`Diagnostic::UninitializedMemoryRead`] once and materializes the byte as
/// zero. The `peek_*` family is for inspection and has no side effects.
#[derive(Debug, Clone, Default)]
pub struct MachineState {
    regs: RegisterFile,
    pc: u32,
    memory: SparseMemory,
    diagnostics: Diagnostics,
}

impl MachineState {
    /// Creates a zeroed machine with empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears registers, memory, diagnostics and the program counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    /// Reads an integer register. `R0` always reads 0.
    #[must_use]
    pub const fn register(&self, reg: GeneralRegister) -> i32 {
        self.regs.gpr(reg)
    }

    /// Writes an integer register. A write to `R0` is discarded and recorded
    /// as [`Diagnostic::ReadOnlyRegisterWrite`].
    pub fn set_register(&mut self, reg: GeneralRegister, value: i32) {
        if !self.regs.set_gpr(reg, value) {
            self.record(Diagnostic::ReadOnlyRegisterWrite { value });
        }
    }

    /// Reads a float register.
    #[must_use]
    pub const fn float_register(&self, reg: GeneralRegister) -> f64 {
        self.regs.fpr(reg)
    }

    /// Writes a float register.
    pub const fn set_float_register(&mut self, reg: GeneralRegister, value: f64) {
        self.regs.set_fpr(reg, value);
    }

    /// Borrows the whole register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Reads `IVEC`.
    #[must_use]
    pub const fn ivec(&self) -> u32 {
        self.regs.ivec()
    }

    /// Writes `IVEC`.
    pub const fn set_ivec(&mut self, value: u32) {
        self.regs.set_ivec(value);
    }

    /// Reads `PTBR`.
    #[must_use]
    pub const fn ptbr(&self) -> u32 {
        self.regs.ptbr()
    }

    /// Writes `PTBR`.
    pub const fn set_ptbr(&mut self, value: u32) {
        self.regs.set_ptbr(value);
    }

    /// Reads `FLGS`.
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.regs.flags()
    }

    /// Sets or clears one bit of `FLGS`.
    pub const fn set_flag_bit(&mut self, index: u8, enabled: bool) {
        self.regs.set_flag_bit(index, enabled);
    }

    /// Borrows memory for inspection.
    #[must_use]
    pub const fn memory(&self) -> &SparseMemory {
        &self.memory
    }

    /// Diagnostic counters accumulated since the last reset.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Reads a byte without recording diagnostics. Unwritten bytes read as 0.
    #[must_use]
    pub fn peek_u8(&self, addr: u32) -> u8 {
        self.memory.get(addr).unwrap_or(0)
    }

    /// Reads a little-endian word without recording diagnostics.
    #[must_use]
    pub fn peek_u32(&self, addr: u32) -> u32 {
        self.memory.peek_u32(addr)
    }

    /// Execution-path byte read.
    pub fn read_u8(&mut self, addr: u32) -> u8 {
        if let Some(byte) = self.memory.get(addr) {
            return byte;
        }
        self.record(Diagnostic::UninitializedMemoryRead { addr });
        self.memory.write_u8(addr, 0);
        0
    }

    /// Execution-path little-endian halfword read.
    pub fn read_u16(&mut self, addr: u32) -> u16 {
        u16::from_le_bytes(self.read_array(addr))
    }

    /// Execution-path little-endian word read.
    pub fn read_u32(&mut self, addr: u32) -> u32 {
        u32::from_le_bytes(self.read_array(addr))
    }

    /// Execution-path little-endian double read.
    pub fn read_f64(&mut self, addr: u32) -> f64 {
        f64::from_le_bytes(self.read_array(addr))
    }

    /// Stores one byte.
    pub fn write_u8(&mut self, addr: u32, value: u8) {
        self.memory.write_u8(addr, value);
    }

    /// Stores a halfword little-endian.
    pub fn write_u16(&mut self, addr: u32, value: u16) {
        self.memory.write_bytes(addr, &value.to_le_bytes());
    }

    /// Stores a word little-endian.
    pub fn write_u32(&mut self, addr: u32, value: u32) {
        self.memory.write_bytes(addr, &value.to_le_bytes());
    }

    /// Stores a double little-endian.
    pub fn write_f64(&mut self, addr: u32, value: f64) {
        self.memory.write_bytes(addr, &value.to_le_bytes());
    }

    /// Copies a program or data image into memory at `addr`.
    pub fn load_image(&mut self, addr: u32, bytes: &[u8]) {
        self.memory.write_bytes(addr, bytes);
    }

    /// Marks `len` bytes at `addr` as initialized zeros (e.g. `.bss`).
    pub fn zero_fill(&mut self, addr: u32, len: u32) {
        self.memory.zero_fill(addr, len);
    }

    /// Deep copy of registers and memory. Walks every allocated page, so keep
    /// it off the per-instruction path.
    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            pc: self.pc,
            registers: self.regs.clone(),
            memory: self.memory.clone(),
            diagnostics: self.diagnostics,
        }
    }

    fn read_array<const N: usize>(&mut self, addr: u32) -> [u8; N] {
        let mut bytes = [0_u8; N];
        for (offset, slot) in (0_u32..).zip(bytes.iter_mut()) {
            *slot = self.read_u8(addr.wrapping_add(offset));
        }
        bytes
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::UninitializedMemoryRead { addr } => {
                warn!(pc = self.pc, addr, "{diagnostic}");
            }
            Diagnostic::ReadOnlyRegisterWrite { .. } => {
                warn!(pc = self.pc, register = "r0", "{diagnostic}");
            }
        }
        self.diagnostics.record(diagnostic, self.pc);
    }
}

/// Immutable deep copy of a [`MachineState`].
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    /// Program counter at capture time.
    pub pc: u32,
    /// Register file at capture time.
    pub registers: RegisterFile,
    /// Memory at capture time.
    pub memory: SparseMemory,
    /// Diagnostic counters at capture time.
    pub diagnostics: Diagnostics,
}

impl MachineSnapshot {
    /// Reads an integer register from the snapshot.
    #[must_use]
    pub const fn register(&self, reg: GeneralRegister) -> i32 {
        self.registers.gpr(reg)
    }

    /// Reads a word from the snapshot. Unwritten bytes read as 0.
    #[must_use]
    pub fn peek_u32(&self, addr: u32) -> u32 {
        self.memory.peek_u32(addr)
    }
}
