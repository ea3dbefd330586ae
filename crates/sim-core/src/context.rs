//! Post-mortem machine context, printed when a run aborts and by the
//! debugger's `p` command.

use std::fmt;

use thiserror::Error;

use crate::diag::Diagnostics;
use crate::disasm::{disassemble_window, DisassemblyRow};
use crate::fault::Fault;
use crate::state::{GeneralRegister, MachineState, GENERAL_REGISTER_COUNT};

/// Instructions shown on each side of `pc`.
pub const DISASSEMBLY_RADIUS: u32 = 4;
/// Words shown from `sp` upward.
pub const STACK_WORDS: u32 = 8;

/// Read-only capture of the state needed to diagnose a stopped machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDump {
    /// Program counter.
    pub pc: u32,
    /// Integer registers in index order.
    pub registers: [i32; GENERAL_REGISTER_COUNT],
    /// Float registers holding something other than `+0.0`, as `(index, value)`.
    pub float_registers: Vec<(usize, f64)>,
    /// `IVEC`.
    pub ivec: u32,
    /// `PTBR`.
    pub ptbr: u32,
    /// `FLGS`.
    pub flags: u32,
    /// Disassembly around `pc`.
    pub disassembly: Vec<DisassemblyRow>,
    /// `(address, word)` pairs starting at `sp`.
    pub stack: Vec<(u32, u32)>,
    /// Instructions retired before the capture.
    pub instructions_retired: u64,
    /// Diagnostic counters.
    pub diagnostics: Diagnostics,
}

impl ContextDump {
    /// Captures `state` using side-effect-free reads.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn capture(state: &MachineState, instructions_retired: u64) -> Self {
        let regs = state.registers();
        let float_registers = regs
            .fprs()
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, value)| value.to_bits() != 0)
            .collect();
        let sp = state.register(GeneralRegister::SP) as u32;
        let stack = (0..STACK_WORDS)
            .map(|index| {
                let addr = sp.wrapping_add(index * 4);
                (addr, state.peek_u32(addr))
            })
            .collect();

        Self {
            pc: state.pc(),
            registers: *regs.gprs(),
            float_registers,
            ivec: state.ivec(),
            ptbr: state.ptbr(),
            flags: state.flags(),
            disassembly: disassemble_window(
                state,
                state.pc(),
                DISASSEMBLY_RADIUS,
                DISASSEMBLY_RADIUS,
            ),
            stack,
            instructions_retired,
            diagnostics: *state.diagnostics(),
        }
    }
}

impl fmt::Display for ContextDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PC: 0x{:08x}", self.pc)?;
        writeln!(f, "Registers:")?;
        for (reg, value) in GeneralRegister::ALL.iter().zip(self.registers) {
            let end = if reg.index() % 4 == 3 { "\n" } else { "  " };
            write!(f, "  {:>2}: 0x{value:08x}{end}", reg.name())?;
        }
        if !self.float_registers.is_empty() {
            writeln!(f, "Float registers:")?;
            for (index, value) in &self.float_registers {
                writeln!(f, "  f{index}: {value}")?;
            }
        }
        writeln!(
            f,
            "IVEC: 0x{:08x}  PTBR: 0x{:08x}  FLGS: 0x{:08x}",
            self.ivec, self.ptbr, self.flags
        )?;
        writeln!(f, "Disassembly:")?;
        for row in &self.disassembly {
            let marker = if row.addr == self.pc { "=>" } else { "  " };
            writeln!(f, "{marker} 0x{:08x}: {row}", row.addr)?;
        }
        writeln!(f, "Stack:")?;
        for (addr, word) in &self.stack {
            writeln!(f, "  0x{addr:08x}: 0x{word:08x}")?;
        }
        write!(
            f,
            "Retired: {}  Uninitialized reads: {}  r0 writes: {}",
            self.instructions_retired,
            self.diagnostics.uninitialized_reads,
            self.diagnostics.read_only_writes
        )
    }
}

/// A fault that aborted a run, with the machine context at the time.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("execution aborted: {fault}")]
pub struct RunError {
    /// The fault.
    pub fault: Fault,
    /// Machine context captured when the fault was raised.
    pub context: Box<ContextDump>,
}

impl RunError {
    /// Pairs a fault with its captured context.
    #[must_use]
    pub fn new(fault: Fault, context: ContextDump) -> Self {
        Self {
            fault,
            context: Box::new(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextDump, RunError, DISASSEMBLY_RADIUS, STACK_WORDS};
    use crate::alu::IntOp;
    use crate::fault::Fault;
    use crate::state::{GeneralRegister, MachineState};

    fn sample_state() -> MachineState {
        let mut state = MachineState::new();
        state.set_pc(0x100);
        state.write_u32(0x100, 0x0112_3000);
        state.set_register(GeneralRegister::R1, -1);
        state.set_register(GeneralRegister::SP, 0x2000);
        state.write_u32(0x2000, 0xCAFE_F00D);
        state.set_float_register(GeneralRegister::R3, 2.5);
        state
    }

    #[test]
    fn capture_collects_all_sections() {
        let dump = ContextDump::capture(&sample_state(), 7);
        assert_eq!(dump.pc, 0x100);
        assert_eq!(dump.registers[1], -1);
        assert_eq!(dump.float_registers, vec![(3, 2.5)]);
        assert_eq!(dump.disassembly.len(), (DISASSEMBLY_RADIUS * 2 + 1) as usize);
        assert_eq!(dump.stack.len(), STACK_WORDS as usize);
        assert_eq!(dump.stack[0], (0x2000, 0xCAFE_F00D));
        assert_eq!(dump.instructions_retired, 7);
    }

    #[test]
    fn capture_does_not_record_diagnostics() {
        let state = sample_state();
        let dump = ContextDump::capture(&state, 0);
        assert_eq!(dump.diagnostics.total(), 0);
        assert_eq!(state.diagnostics().total(), 0);
    }

    #[test]
    fn display_marks_current_instruction() {
        let text = ContextDump::capture(&sample_state(), 0).to_string();
        assert!(text.starts_with("PC: 0x00000100\n"));
        assert!(text.contains("=> 0x00000100: 01 12 3000  add\t$s0, $s1, $s2"));
        assert!(text.contains("s0: 0xffffffff"));
        assert!(text.contains("f3: 2.5"));
        assert!(text.contains("0x00002000: 0xcafef00d"));
    }

    #[test]
    fn run_error_message_names_fault() {
        let err = RunError::new(
            Fault::ArithmeticFault {
                pc: 0x100,
                op: IntOp::Div,
            },
            ContextDump::capture(&sample_state(), 0),
        );
        assert_eq!(
            err.to_string(),
            "execution aborted: div by zero at pc 0x00000100"
        );
    }
}
