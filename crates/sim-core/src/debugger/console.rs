//! Console command grammar and execution.

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::warn;

use super::{DebugInfo, Debugger, StepMode};
use crate::context::{ContextDump, DISASSEMBLY_RADIUS};
use crate::disasm::disassemble_window;
use crate::state::MachineState;

/// Prompt printed before each command is read.
pub const CONSOLE_PROMPT: &str = "AlexDbg => ";

/// Help text listing every command.
pub const USAGE_TEXT: &str = "\
Commands:
  c | <enter>        continue
  p | p d            print registers, disassembly and stack
  p l                print local variables
  p m <addr>         print the word at an address
  x <symbol|addr>    print a symbol's address and the word stored there
  b <symbol|addr>    add a breakpoint
  d <symbol|addr>    delete a breakpoint
  bps                list breakpoints
  dis [addr]         disassemble around an address (default: pc)
  s [no|asm|src]     show or set the stepping mode
  help               show this text";

/// Operator mistakes. Reported on the console; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// First word is not a command.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    /// A command that needs an argument got none.
    #[error("`{command}` needs an argument")]
    MissingArgument {
        /// The command as typed.
        command: &'static str,
    },
    /// Argument starting with a digit that does not parse as an address.
    #[error("malformed address `{0}`")]
    MalformedAddress(String),
    /// Name absent from the symbol table.
    #[error("symbol {0} not found!")]
    SymbolNotFound(String),
    /// Argument to `s` is not a stepping mode.
    #[error("unknown step mode `{0}` (expected no, asm or src)")]
    UnknownStepMode(String),
}

/// What a command refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Numeric address, hex with `0x` or decimal.
    Address(u32),
    /// Symbol name to look up.
    Symbol(String),
}

impl Target {
    /// Parses a command argument. Text starting with a digit must be an
    /// address; anything else is taken as a symbol name.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::MalformedAddress`] for digit-led text that is
    /// not a valid 32-bit number.
    pub fn parse(text: &str) -> Result<Self, ConsoleError> {
        if !text.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(Self::Symbol(text.to_owned()));
        }
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => text.parse(),
        };
        parsed
            .map(Self::Address)
            .map_err(|_| ConsoleError::MalformedAddress(text.to_owned()))
    }

    fn resolve(&self, info: &impl DebugInfo) -> Result<u32, ConsoleError> {
        match self {
            Self::Address(addr) => Ok(*addr),
            Self::Symbol(name) => info
                .symbol_address(name)
                .ok_or_else(|| ConsoleError::SymbolNotFound(name.clone())),
        }
    }
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// `c` or an empty line.
    Continue,
    /// `p` or `p d`.
    PrintContext,
    /// `p l`.
    PrintLocals,
    /// `p m <addr>`.
    PrintMemory(Target),
    /// `x <symbol>`.
    Examine(Target),
    /// `b <addr>`.
    Break(Target),
    /// `d <addr>`.
    Delete(Target),
    /// `bps`.
    ListBreakpoints,
    /// `dis [addr]`.
    Disassemble(Option<Target>),
    /// `s [mode]`.
    Step(Option<StepMode>),
    /// `help`.
    Help,
}

impl Command {
    /// Parses one whitespace-tokenized input line.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsoleError`] describing what was wrong with the line.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Self::Continue);
        };
        let arg = words.next();
        let needs = |command: &'static str| {
            arg.ok_or(ConsoleError::MissingArgument { command })
                .and_then(Target::parse)
        };

        match head {
            "c" => Ok(Self::Continue),
            "p" => match arg {
                None | Some("d") => Ok(Self::PrintContext),
                Some("l") => Ok(Self::PrintLocals),
                Some("m") => words
                    .next()
                    .ok_or(ConsoleError::MissingArgument { command: "p m" })
                    .and_then(Target::parse)
                    .map(Self::PrintMemory),
                Some(other) => Err(ConsoleError::UnknownCommand(format!("p {other}"))),
            },
            "x" => needs("x").map(Self::Examine),
            "b" => needs("b").map(Self::Break),
            "d" => needs("d").map(Self::Delete),
            "bps" => Ok(Self::ListBreakpoints),
            "dis" => arg.map(Target::parse).transpose().map(Self::Disassemble),
            "s" => arg
                .map(str::parse::<StepMode>)
                .transpose()
                .map(Self::Step),
            "help" => Ok(Self::Help),
            other => Err(ConsoleError::UnknownCommand(other.to_owned())),
        }
    }
}

/// Whether the console should keep prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleAction {
    /// Leave the console and resume execution.
    Continue,
    /// Prompt again.
    Stay,
}

impl<I: DebugInfo, R: BufRead, W: Write> Debugger<I, R, W> {
    /// Parses and runs one console line against `state`.
    ///
    /// Operator errors are printed along with the usage text and the console
    /// stays open. If the output stream fails, the console gives up and
    /// execution continues.
    pub fn execute_command(&mut self, line: &str, state: &mut MachineState) -> ConsoleAction {
        let result = match Command::parse(line) {
            Ok(command) => self.run(&command, state),
            Err(err) => self.report(&err, true),
        };
        result.unwrap_or_else(|err| {
            warn!(error = %err, "debugger output failed; resuming");
            ConsoleAction::Continue
        })
    }

    fn report(&mut self, err: &ConsoleError, with_usage: bool) -> io::Result<ConsoleAction> {
        writeln!(self.output, "error: {err}")?;
        if with_usage {
            writeln!(self.output, "{USAGE_TEXT}")?;
        }
        Ok(ConsoleAction::Stay)
    }

    fn resolve(&mut self, target: &Target) -> io::Result<Option<u32>> {
        match target.resolve(&self.info) {
            Ok(addr) => Ok(Some(addr)),
            Err(err) => self.report(&err, false).map(|_| None),
        }
    }

    fn run(&mut self, command: &Command, state: &MachineState) -> io::Result<ConsoleAction> {
        match command {
            Command::Continue => return Ok(ConsoleAction::Continue),
            Command::PrintContext => {
                let dump = ContextDump::capture(state, self.boundaries.saturating_sub(1));
                writeln!(self.output, "{dump}")?;
            }
            Command::PrintLocals => self.print_locals(state)?,
            Command::PrintMemory(target) => {
                if let Some(addr) = self.resolve(target)? {
                    writeln!(self.output, "0x{addr:08x}: 0x{:08x}", state.peek_u32(addr))?;
                }
            }
            Command::Examine(target) => {
                if let Some(addr) = self.resolve(target)? {
                    let name = match target {
                        Target::Symbol(name) => name.clone(),
                        Target::Address(addr) => format!("0x{addr:08x}"),
                    };
                    writeln!(self.output, "{name} = 0x{addr:08x}")?;
                    writeln!(
                        self.output,
                        "*((uint32_t*){name}) = 0x{:08x}",
                        state.peek_u32(addr)
                    )?;
                }
            }
            Command::Break(target) => {
                if let Some(addr) = self.resolve(target)? {
                    if self.add_breakpoint(addr) {
                        writeln!(self.output, "breakpoint set at 0x{addr:08x}")?;
                    } else {
                        writeln!(self.output, "breakpoint already set at 0x{addr:08x}")?;
                    }
                }
            }
            Command::Delete(target) => {
                if let Some(addr) = self.resolve(target)? {
                    if self.remove_breakpoint(addr) {
                        writeln!(self.output, "breakpoint removed at 0x{addr:08x}")?;
                    } else {
                        writeln!(self.output, "no breakpoint at 0x{addr:08x}")?;
                    }
                }
            }
            Command::ListBreakpoints => {
                if self.breakpoints.is_empty() {
                    writeln!(self.output, "no breakpoints")?;
                }
                for addr in &self.breakpoints {
                    writeln!(self.output, "  0x{addr:08x}")?;
                }
            }
            Command::Disassemble(target) => {
                let center = match target {
                    None => Some(state.pc()),
                    Some(target) => self.resolve(target)?,
                };
                if let Some(center) = center {
                    let rows =
                        disassemble_window(state, center, DISASSEMBLY_RADIUS, DISASSEMBLY_RADIUS);
                    for row in rows {
                        let marker = if row.addr == state.pc() { "=>" } else { "  " };
                        writeln!(self.output, "{marker} 0x{:08x}: {row}", row.addr)?;
                    }
                }
            }
            Command::Step(None) => writeln!(self.output, "step mode: {}", self.step_mode)?,
            Command::Step(Some(mode)) => {
                self.set_step_mode(*mode);
                writeln!(self.output, "step mode: {mode}")?;
            }
            Command::Help => writeln!(self.output, "{USAGE_TEXT}")?,
        }
        Ok(ConsoleAction::Stay)
    }

    fn print_locals(&mut self, state: &MachineState) -> io::Result<()> {
        let locals = self.info.locals_at(state.pc());
        if locals.is_empty() {
            return writeln!(self.output, "no local variables");
        }
        for var in locals {
            let addr = var.location.resolve(state);
            writeln!(
                self.output,
                "{} {} = 0x{:08x}",
                var.type_name,
                var.name,
                state.peek_u32(addr)
            )?;
        }
        Ok(())
    }
}
