//! Fetch, decode, execute and advance.
//!
//! Each step reads the word at `pc`, looks its opcode up in the dispatch
//! table, runs the semantic action against [`MachineState`], then applies
//! the descriptor's next-PC policy. Faults are precise: an instruction that
//! faults leaves registers, memory and `pc` untouched.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

mod helpers;

pub use helpers::{effective_address, load, pop, pop_f64, push, push_f64, store};

use tracing::{debug, error, trace};

use crate::alu::{
    compare_float, eval_float, eval_int, float_to_int, int_to_float, round_float, uint_to_float,
};
use crate::api::{ByteOutput, DebugHook, RunOutcome, SimConfig, StepOutcome};
use crate::context::{ContextDump, RunError};
use crate::decoder::{decode, DecodedInstruction};
use crate::encoding::{opcode_of, NextPc, Operation, Shape, Width};
use crate::fault::Fault;
use crate::state::{GeneralRegister, MachineState, RunState};

/// Fetched word that stops the loop regardless of the dispatch table.
pub const HALT_SENTINEL: u32 = 0xFFFF_FFFF;

/// Outcome of a semantic action, before the next-PC policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The action completed. `target` is set by control-flow actions.
    Retired {
        /// Jump target chosen by the action.
        target: Option<u32>,
    },
    /// The action requested a halt.
    Halted,
}

const fn retired() -> Result<ExecuteOutcome, Fault> {
    Ok(ExecuteOutcome::Retired { target: None })
}

const fn jump_to(target: u32) -> Result<ExecuteOutcome, Fault> {
    Ok(ExecuteOutcome::Retired {
        target: Some(target),
    })
}

/// Runs the semantic action of a decoded instruction fetched from `pc`.
///
/// # Errors
///
/// Returns [`Fault::ArithmeticFault`] for an integer division or modulo by
/// zero. Nothing is written in that case.
#[allow(clippy::too_many_lines)]
pub fn execute_instruction<O: ByteOutput + ?Sized>(
    instr: &DecodedInstruction,
    pc: u32,
    state: &mut MachineState,
    out: &mut O,
) -> Result<ExecuteOutcome, Fault> {
    let ops = instr.operands;
    let (ra, rb, rc) = (ops.ra, ops.rb, ops.rc);

    match instr.descriptor.operation {
        Operation::Nop | Operation::ByteIn => retired(),
        Operation::Int(op) => {
            let rhs = match instr.descriptor.shape {
                Shape::R => state.register(rc),
                Shape::I(_) | Shape::J => ops.imm,
            };
            let value =
                eval_int(op, state.register(rb), rhs).ok_or(Fault::ArithmeticFault { pc, op })?;
            state.set_register(ra, value);
            retired()
        }
        Operation::Not => {
            state.set_register(ra, !state.register(rb));
            retired()
        }
        Operation::Branch(cond) => {
            if cond.holds(state.register(ra), state.register(rb)) {
                jump_to(pc.wrapping_add(ops.imm as u32))
            } else {
                jump_to(pc.wrapping_add(4))
            }
        }
        Operation::JumpAbsolute => jump_to((pc & 0xFC00_0000) | ((ops.imm as u32) << 2)),
        Operation::JumpRegister => jump_to(state.register(ra) as u32),
        Operation::Call => {
            let target = state.register(ra) as u32;
            push(state, pc.wrapping_add(4), Width::Word);
            jump_to(target)
        }
        Operation::Ret => {
            let target = pop(state, Width::Word);
            jump_to(target)
        }
        Operation::Load(width) => {
            let addr = effective_address(state, rb, ops.imm);
            let value = load(state, addr, width);
            state.set_register(ra, value as i32);
            retired()
        }
        Operation::Store(width) => {
            let addr = effective_address(state, rb, ops.imm);
            let value = state.register(ra) as u32;
            store(state, addr, value, width);
            retired()
        }
        Operation::LoadImmediate => {
            state.set_register(ra, ops.imm);
            retired()
        }
        Operation::LoadUpper => {
            let low = (state.register(ra) as u32) & 0xFFFF;
            state.set_register(ra, (((ops.imm as u32) << 16) | low) as i32);
            retired()
        }
        Operation::Push(width) => {
            let value = state.register(ra) as u32;
            push(state, value, width);
            retired()
        }
        Operation::Pop(width) => {
            let value = pop(state, width);
            state.set_register(ra, value as i32);
            retired()
        }
        Operation::PushFloat => {
            let value = state.float_register(ra);
            push_f64(state, value);
            retired()
        }
        Operation::PopFloat => {
            let value = pop_f64(state);
            state.set_float_register(ra, value);
            retired()
        }
        Operation::IntToFloat => {
            state.set_float_register(ra, int_to_float(state.register(rb)));
            retired()
        }
        Operation::UintToFloat => {
            state.set_float_register(ra, uint_to_float(state.register(rb)));
            retired()
        }
        Operation::FloatToInt => {
            state.set_register(ra, float_to_int(state.float_register(rb)));
            retired()
        }
        Operation::Float(op) => {
            let value = eval_float(op, state.float_register(rb), state.float_register(rc));
            state.set_float_register(ra, value);
            retired()
        }
        Operation::FloatCompare(cmp) => {
            let value = compare_float(cmp, state.float_register(rb), state.float_register(rc));
            state.set_register(ra, value);
            retired()
        }
        Operation::FloatRound(mode) => {
            state.set_float_register(ra, round_float(mode, state.float_register(rb)));
            retired()
        }
        Operation::ByteOut => {
            out.emit(state.register(ra) as u8);
            retired()
        }
        Operation::MoveFromIvec => {
            state.set_register(ra, state.ivec() as i32);
            retired()
        }
        Operation::MoveToIvec => {
            state.set_ivec(state.register(ra) as u32);
            retired()
        }
        Operation::MoveFromPtbr => {
            state.set_register(ra, state.ptbr() as i32);
            retired()
        }
        Operation::MoveToPtbr => {
            state.set_ptbr(state.register(ra) as u32);
            retired()
        }
        Operation::LoadFlags => {
            state.set_register(ra, state.flags() as i32);
            retired()
        }
        Operation::SetFlag => {
            state.set_flag_bit((ops.imm & 31) as u8, state.register(ra) != 0);
            retired()
        }
        Operation::Halt => Ok(ExecuteOutcome::Halted),
    }
}

/// Applies a next-PC policy to a retired action.
#[must_use]
pub const fn next_pc(policy: NextPc, pc: u32, target: Option<u32>) -> u32 {
    match (policy, target) {
        (NextPc::Jump, Some(target)) => target,
        _ => pc.wrapping_add(4),
    }
}

/// Executes exactly one instruction with no debugger involvement.
///
/// A fetched [`HALT_SENTINEL`] or `halt` opcode reports
/// [`StepOutcome::Halted`] and leaves `pc` on the halting word.
///
/// # Errors
///
/// Returns [`Fault::UnsupportedInstruction`] for an unmapped opcode and
/// [`Fault::ArithmeticFault`] for integer division by zero.
pub fn step_one<O: ByteOutput + ?Sized>(
    state: &mut MachineState,
    out: &mut O,
) -> Result<StepOutcome, Fault> {
    let pc = state.pc();
    let word = state.read_u32(pc);
    if word == HALT_SENTINEL {
        return Ok(StepOutcome::Halted { pc });
    }

    let instr = decode(word).ok_or(Fault::UnsupportedInstruction {
        pc,
        word,
        opcode: opcode_of(word),
    })?;
    trace!(pc, word, mnemonic = instr.descriptor.mnemonic, "execute");

    match execute_instruction(&instr, pc, state, out)? {
        ExecuteOutcome::Halted => Ok(StepOutcome::Halted { pc }),
        ExecuteOutcome::Retired { target } => {
            state.set_pc(next_pc(instr.descriptor.next_pc, pc, target));
            Ok(StepOutcome::Retired { pc, word })
        }
    }
}

/// The execution loop: owns the machine and drives it through a debug hook.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimConfig,
    state: MachineState,
    run_state: RunState,
    retired: u64,
}

impl Simulator {
    /// Creates a machine with `pc = entry` and `sp = stack_top`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let mut sim = Self {
            config,
            state: MachineState::new(),
            run_state: RunState::Running,
            retired: 0,
        };
        sim.apply_boot_registers();
        sim
    }

    /// Clears memory and registers and returns to the entry point.
    pub fn reset(&mut self) {
        self.state.reset();
        self.run_state = RunState::Running;
        self.retired = 0;
        self.apply_boot_registers();
    }

    fn apply_boot_registers(&mut self) {
        self.state.set_pc(self.config.entry);
        self.state
            .set_register(GeneralRegister::SP, self.config.stack_top as i32);
    }

    /// The configuration this simulator was built with.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Borrows the machine state.
    #[must_use]
    pub const fn state(&self) -> &MachineState {
        &self.state
    }

    /// Mutably borrows the machine state, e.g. to load a program.
    pub const fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// Current loop state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Instructions retired since creation or the last reset.
    #[must_use]
    pub const fn instructions_retired(&self) -> u64 {
        self.retired
    }

    /// Runs the hook, then one instruction.
    ///
    /// Once halted, further calls return [`StepOutcome::Halted`] without
    /// invoking the hook.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] carrying the fault and a context dump captured
    /// before anything else touched the state. The loop is halted afterwards.
    pub fn step<H, O>(&mut self, hook: &mut H, out: &mut O) -> Result<StepOutcome, RunError>
    where
        H: DebugHook + ?Sized,
        O: ByteOutput + ?Sized,
    {
        if self.run_state.is_halted() {
            return Ok(StepOutcome::Halted {
                pc: self.state.pc(),
            });
        }

        hook.before_instruction(&mut self.state);

        match step_one(&mut self.state, out) {
            Ok(outcome @ StepOutcome::Retired { .. }) => {
                self.retired = self.retired.saturating_add(1);
                Ok(outcome)
            }
            Ok(outcome @ StepOutcome::Halted { pc }) => {
                debug!(pc, instructions = self.retired, "halted");
                self.run_state = RunState::Halted;
                Ok(outcome)
            }
            Err(fault) => {
                error!(pc = fault.pc(), code = fault.as_u8(), "{fault}");
                self.run_state = RunState::Halted;
                Err(RunError::new(
                    fault,
                    ContextDump::capture(&self.state, self.retired),
                ))
            }
        }
    }

    /// Steps until halt, budget exhaustion or a fault.
    ///
    /// A fresh simulator starts at `config.entry`; otherwise the run resumes
    /// from the current `pc`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] on the first fatal fault.
    pub fn run<H, O>(&mut self, hook: &mut H, out: &mut O) -> Result<RunOutcome, RunError>
    where
        H: DebugHook + ?Sized,
        O: ByteOutput + ?Sized,
    {
        debug!(
            pc = self.state.pc(),
            budget = ?self.config.max_instructions,
            "run started"
        );
        loop {
            if let Some(max) = self.config.max_instructions {
                if self.retired >= max {
                    self.run_state = RunState::Halted;
                    debug!(pc = self.state.pc(), instructions = self.retired, "budget exhausted");
                    return Ok(RunOutcome::BudgetExhausted {
                        pc: self.state.pc(),
                        instructions: self.retired,
                    });
                }
            }
            if let StepOutcome::Halted { pc } = self.step(hook, out)? {
                return Ok(RunOutcome::Halted {
                    pc,
                    instructions: self.retired,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{next_pc, step_one, Simulator, HALT_SENTINEL};
    use crate::alu::IntOp;
    use crate::api::{NoopHook, RunOutcome, SimConfig, StepOutcome};
    use crate::encoding::NextPc;
    use crate::fault::Fault;
    use crate::state::{GeneralRegister, MachineState, RunState};

    const fn encode_r(opcode: u8, ra: u8, rb: u8, rc: u8) -> u32 {
        ((opcode as u32) << 24) | ((ra as u32) << 20) | ((rb as u32) << 16) | ((rc as u32) << 12)
    }

    const fn encode_i(opcode: u8, ra: u8, rb: u8, imm: u16) -> u32 {
        ((opcode as u32) << 24) | ((ra as u32) << 20) | ((rb as u32) << 16) | imm as u32
    }

    fn load_program(state: &mut MachineState, base: u32, words: &[u32]) {
        for (offset, word) in (0_u32..).zip(words) {
            state.write_u32(base + offset * 4, *word);
        }
    }

    #[test]
    fn next_pc_policy() {
        assert_eq!(next_pc(NextPc::Sequential, 0x10, Some(0x40)), 0x14);
        assert_eq!(next_pc(NextPc::Jump, 0x10, Some(0x40)), 0x40);
        assert_eq!(next_pc(NextPc::Jump, 0xFFFF_FFFC, None), 0);
    }

    #[test]
    fn sentinel_halts_without_advancing() {
        let mut state = MachineState::new();
        state.write_u32(0, HALT_SENTINEL);
        let outcome = step_one(&mut state, &mut Vec::new()).expect("sentinel is not a fault");
        assert_eq!(outcome, StepOutcome::Halted { pc: 0 });
        assert_eq!(state.pc(), 0);
    }

    #[test]
    fn unsupported_opcode_is_precise() {
        let mut state = MachineState::new();
        state.write_u32(0x20, 0x3012_0000);
        state.set_pc(0x20);
        let fault = step_one(&mut state, &mut Vec::new()).expect_err("0x30 is unmapped");
        assert_eq!(
            fault,
            Fault::UnsupportedInstruction {
                pc: 0x20,
                word: 0x3012_0000,
                opcode: 0x30
            }
        );
        assert_eq!(state.pc(), 0x20);
    }

    #[test]
    fn division_by_zero_faults_before_writeback() {
        let mut state = MachineState::new();
        state.set_register(GeneralRegister::R1, 77);
        state.set_register(GeneralRegister::R2, 5);
        state.write_u32(0, encode_r(0x0A, 1, 2, 3));
        let fault = step_one(&mut state, &mut Vec::new()).expect_err("divisor is zero");
        assert_eq!(
            fault,
            Fault::ArithmeticFault {
                pc: 0,
                op: IntOp::Div
            }
        );
        assert_eq!(state.register(GeneralRegister::R1), 77);
        assert_eq!(state.pc(), 0);
    }

    #[test]
    fn simulator_boots_with_entry_and_stack() {
        let sim = Simulator::new(SimConfig {
            entry: 0x400,
            stack_top: 0x8000,
            ..SimConfig::default()
        });
        assert_eq!(sim.state().pc(), 0x400);
        assert_eq!(sim.state().register(GeneralRegister::SP), 0x8000);
        assert_eq!(sim.run_state(), RunState::Running);
    }

    #[test]
    fn run_prints_and_halts() {
        let mut sim = Simulator::new(SimConfig::default());
        load_program(
            sim.state_mut(),
            0,
            &[
                encode_i(0x31, 1, 0, u16::from(b'o')),
                encode_r(0x81, 1, 0, 0),
                encode_i(0x31, 1, 0, u16::from(b'k')),
                encode_r(0x81, 1, 0, 0),
                HALT_SENTINEL,
            ],
        );
        let mut out = Vec::new();
        let outcome = sim.run(&mut NoopHook, &mut out).expect("program halts");
        assert_eq!(
            outcome,
            RunOutcome::Halted {
                pc: 16,
                instructions: 4
            }
        );
        assert_eq!(out, b"ok");
        assert_eq!(sim.run_state(), RunState::Halted);
        assert_eq!(
            sim.step(&mut NoopHook, &mut out).expect("halted step is benign"),
            StepOutcome::Halted { pc: 16 }
        );
    }

    #[test]
    fn budget_stops_infinite_loop() {
        let mut sim = Simulator::new(SimConfig {
            max_instructions: Some(10),
            ..SimConfig::default()
        });
        // `b 0` branches to itself.
        load_program(sim.state_mut(), 0, &[encode_i(0x24, 0, 0, 0)]);
        let outcome = sim.run(&mut NoopHook, &mut Vec::new()).expect("budget is normal");
        assert_eq!(
            outcome,
            RunOutcome::BudgetExhausted {
                pc: 0,
                instructions: 10
            }
        );
    }

    #[test]
    fn fault_carries_context_dump() {
        let mut sim = Simulator::new(SimConfig::default());
        load_program(sim.state_mut(), 0, &[encode_i(0x31, 1, 0, 9), 0x5500_0000]);
        let err = sim
            .run(&mut NoopHook, &mut Vec::new())
            .expect_err("0x55 is unmapped");
        assert_eq!(err.fault.pc(), 4);
        assert_eq!(err.context.pc, 4);
        assert_eq!(err.context.instructions_retired, 1);
        assert_eq!(sim.run_state(), RunState::Halted);
    }
}
