//! Debugger stepping and breakpoint state machine.
//!
//! At every instruction boundary the debugger decides whether to stop, in
//! this order:
//!
//! 1. `pc` is a breakpoint: stop, whatever the stepping mode.
//! 2. Mode is [`StepMode::AsmStep`]: stop.
//! 3. Mode is [`StepMode::SourceStep`] and `pc` maps to a source line: stop.
//!    Addresses without a line mapping are skipped silently.
//! 4. Otherwise keep running.
//!
//! Stopping enters a blocking console that reads commands from the input
//! until `c` or an empty line.

mod console;
mod info;

pub use console::{Command, ConsoleAction, ConsoleError, Target, CONSOLE_PROMPT, USAGE_TEXT};
pub use info::{DebugInfo, LocalVariable, SourceLocation, StaticDebugInfo, VariableLocation};

use std::collections::BTreeSet;
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::api::DebugHook;
use crate::state::MachineState;

/// Granularity at which the debugger pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepMode {
    /// Only breakpoints stop.
    #[default]
    NoStep,
    /// Stop before every instruction.
    AsmStep,
    /// Stop before every instruction that maps to a source line.
    SourceStep,
}

impl StepMode {
    /// Console spelling: `no`, `asm` or `src`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoStep => "no",
            Self::AsmStep => "asm",
            Self::SourceStep => "src",
        }
    }
}

impl fmt::Display for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepMode {
    type Err = ConsoleError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "no" | "none" => Ok(Self::NoStep),
            "asm" => Ok(Self::AsmStep),
            "src" | "source" => Ok(Self::SourceStep),
            other => Err(ConsoleError::UnknownStepMode(other.to_owned())),
        }
    }
}

/// Why the debugger stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// `pc` is in the breakpoint set.
    Breakpoint,
    /// Instruction stepping.
    AsmStep,
    /// Source stepping reached a mapped line.
    SourceStep(SourceLocation),
}

/// Interactive debugger over a lookup service, an operator input and an
/// output stream.
#[derive(Debug)]
pub struct Debugger<I, R, W> {
    info: I,
    input: R,
    output: W,
    breakpoints: BTreeSet<u32>,
    step_mode: StepMode,
    boundaries: u64,
}

impl<I: DebugInfo, R: BufRead, W: Write> Debugger<I, R, W> {
    /// Creates a debugger with no breakpoints in [`StepMode::NoStep`].
    pub fn new(info: I, input: R, output: W) -> Self {
        Self {
            info,
            input,
            output,
            breakpoints: BTreeSet::new(),
            step_mode: StepMode::NoStep,
            boundaries: 0,
        }
    }

    /// Sets the initial stepping mode.
    #[must_use]
    pub fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }

    /// Adds a breakpoint. Returns `false` when it already existed.
    pub fn add_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.insert(addr)
    }

    /// Removes a breakpoint. Returns `false` when there was none.
    pub fn remove_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.remove(&addr)
    }

    /// The breakpoint set, in address order.
    #[must_use]
    pub const fn breakpoints(&self) -> &BTreeSet<u32> {
        &self.breakpoints
    }

    /// Current stepping mode.
    #[must_use]
    pub const fn step_mode(&self) -> StepMode {
        self.step_mode
    }

    /// Changes the stepping mode.
    pub fn set_step_mode(&mut self, mode: StepMode) {
        debug!(from = %self.step_mode, to = %mode, "step mode changed");
        self.step_mode = mode;
    }

    /// The lookup service.
    pub const fn info(&self) -> &I {
        &self.info
    }

    /// The console output stream.
    pub const fn output(&self) -> &W {
        &self.output
    }

    /// Consumes the debugger, returning its output stream.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Instruction boundaries observed so far.
    #[must_use]
    pub const fn boundaries(&self) -> u64 {
        self.boundaries
    }

    /// Decides whether execution should stop at `pc`. Has no side effects.
    #[must_use]
    pub fn should_stop(&self, pc: u32) -> Option<StopReason> {
        if self.breakpoints.contains(&pc) {
            return Some(StopReason::Breakpoint);
        }
        match self.step_mode {
            StepMode::AsmStep => Some(StopReason::AsmStep),
            StepMode::SourceStep => self.info.address_to_line(pc).map(StopReason::SourceStep),
            StepMode::NoStep => None,
        }
    }

    /// Runs the console loop until the operator continues.
    ///
    /// End of input counts as continue, so a closed terminal never wedges
    /// the run.
    pub fn enter_console(&mut self, state: &mut MachineState, reason: &StopReason) {
        if let Err(err) = self.print_banner(state, reason) {
            warn!(error = %err, "debugger output failed; resuming");
            return;
        }
        let mut line = String::new();
        loop {
            let prompted =
                write!(self.output, "{CONSOLE_PROMPT}").and_then(|()| self.output.flush());
            if let Err(err) = prompted {
                warn!(error = %err, "debugger output failed; resuming");
                return;
            }
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => return,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "debugger input failed; resuming");
                    return;
                }
            }
            if self.execute_command(line.trim(), state) == ConsoleAction::Continue {
                return;
            }
        }
    }

    fn print_banner(&mut self, state: &MachineState, reason: &StopReason) -> std::io::Result<()> {
        let pc = state.pc();
        if *reason == StopReason::Breakpoint {
            writeln!(self.output, "Breakpoint hit at 0x{pc:08x}")?;
        }
        let row = crate::disasm::disassemble_at(pc, state.peek_u32(pc));
        writeln!(self.output, "PC: 0x{pc:08x}\tIns: 0x{:08x}\t{row}", row.word)?;
        let location = match reason {
            StopReason::SourceStep(location) => Some(location.clone()),
            StopReason::Breakpoint | StopReason::AsmStep => self.info.address_to_line(pc),
        };
        if let Some(location) = location {
            writeln!(self.output, "{location}")?;
            if let Some(text) = self.info.source_text(&location) {
                writeln!(self.output, "    {text}")?;
            }
        }
        Ok(())
    }
}

impl<I: DebugInfo, R: BufRead, W: Write> DebugHook for Debugger<I, R, W> {
    fn before_instruction(&mut self, state: &mut MachineState) {
        self.boundaries = self.boundaries.saturating_add(1);
        if let Some(reason) = self.should_stop(state.pc()) {
            debug!(pc = state.pc(), ?reason, "debugger stop");
            self.enter_console(state, &reason);
        }
    }
}
