//! Wires a loaded program, its debug info and the host streams into one run.

use std::io::{BufRead, Write};

use alex_sim_core::{
    DebugInfo, Debugger, RunError, RunOutcome, SimConfig, Simulator, StepMode, Target,
    WriterOutput, DEFAULT_STACK_TOP,
};
use tracing::info;

use crate::debug_info::ProgramDebugInfo;
use crate::error::CliError;
use crate::loader::Program;

/// Run options gathered from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Initial stepping mode.
    pub step_mode: StepMode,
    /// Breakpoints to install before the first instruction.
    pub breakpoints: Vec<Target>,
    /// Stop normally after this many retired instructions.
    pub max_instructions: Option<u64>,
    /// Initial stack pointer.
    pub stack_top: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            step_mode: StepMode::NoStep,
            breakpoints: Vec::new(),
            max_instructions: None,
            stack_top: DEFAULT_STACK_TOP,
        }
    }
}

/// How the program finished.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Halted or ran out of budget.
    Finished(RunOutcome),
    /// A fault aborted the run.
    Faulted(RunError),
}

/// Loads `program`, runs it under a debugger reading commands from `input`
/// and writing console text to `console`, and sends the program's byte
/// output to `output`.
///
/// # Errors
///
/// Returns [`CliError::Usage`] for a breakpoint symbol the debug info does
/// not know and [`CliError::Io`] if writing program output failed.
pub fn run_session<R, C, O>(
    program: &Program,
    info: ProgramDebugInfo,
    config: &SessionConfig,
    input: R,
    console: C,
    output: O,
) -> Result<SessionOutcome, CliError>
where
    R: BufRead,
    C: Write,
    O: Write,
{
    let breakpoints = config
        .breakpoints
        .iter()
        .map(|target| resolve(&info, target))
        .collect::<Result<Vec<_>, _>>()?;

    let mut sim = Simulator::new(SimConfig {
        entry: program.entry,
        stack_top: config.stack_top,
        max_instructions: config.max_instructions,
        step_mode: config.step_mode,
    });
    program.install(sim.state_mut());

    let mut debugger = Debugger::new(info, input, console).with_step_mode(config.step_mode);
    for addr in breakpoints {
        debugger.add_breakpoint(addr);
    }

    let mut out = WriterOutput::new(output);
    let result = sim.run(&mut debugger, &mut out);
    if let Some(err) = out.take_error() {
        return Err(CliError::Io(err));
    }

    Ok(match result {
        Ok(outcome) => {
            info!(
                pc = outcome.pc(),
                instructions = outcome.instructions(),
                "run finished"
            );
            SessionOutcome::Finished(outcome)
        }
        Err(err) => SessionOutcome::Faulted(err),
    })
}

fn resolve(info: &impl DebugInfo, target: &Target) -> Result<u32, CliError> {
    match target {
        Target::Address(addr) => Ok(*addr),
        Target::Symbol(name) => info
            .symbol_address(name)
            .ok_or_else(|| CliError::Usage(format!("unknown breakpoint symbol `{name}`"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use alex_sim_core::{Fault, RunOutcome, StepMode, Target};

    use super::{run_session, SessionConfig, SessionOutcome};
    use crate::debug_info::ProgramDebugInfo;
    use crate::error::CliError;
    use crate::loader::Program;

    const fn encode_i(opcode: u8, ra: u8, rb: u8, imm: u16) -> u32 {
        ((opcode as u32) << 24) | ((ra as u32) << 20) | ((rb as u32) << 16) | imm as u32
    }

    fn image(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    fn hello() -> Program {
        Program::raw(
            image(&[
                encode_i(0x31, 1, 0, u16::from(b'o')),
                encode_i(0x81, 1, 0, 0),
                encode_i(0x81, 1, 0, 0),
                0xFFFF_FFFF,
            ]),
            0x100,
        )
    }

    fn run(
        program: &Program,
        symbols: BTreeMap<String, u32>,
        config: &SessionConfig,
        script: &str,
    ) -> (Result<SessionOutcome, CliError>, String, Vec<u8>) {
        let mut console = Vec::new();
        let mut output = Vec::new();
        let result = run_session(
            program,
            ProgramDebugInfo::from_symbols(symbols),
            config,
            Cursor::new(script.as_bytes().to_vec()),
            &mut console,
            &mut output,
        );
        let console = String::from_utf8(console).expect("utf-8 console");
        (result, console, output)
    }

    #[test]
    fn runs_program_to_halt() {
        let (result, console, output) = run(&hello(), BTreeMap::new(), &SessionConfig::default(), "");
        assert!(matches!(
            result,
            Ok(SessionOutcome::Finished(RunOutcome::Halted { pc: 0x10C, instructions: 3 }))
        ));
        assert!(console.is_empty());
        assert_eq!(output, b"oo");
    }

    #[test]
    fn symbol_breakpoints_resolve_before_the_run() {
        let mut symbols = BTreeMap::new();
        symbols.insert("second_out".to_owned(), 0x108);
        let config = SessionConfig {
            breakpoints: vec![Target::Symbol("second_out".into())],
            ..SessionConfig::default()
        };
        let (result, console, _) = run(&hello(), symbols, &config, "c\n");
        assert!(matches!(result, Ok(SessionOutcome::Finished(_))));
        assert!(console.starts_with("Breakpoint hit at 0x00000108\n"));

        let config = SessionConfig {
            breakpoints: vec![Target::Symbol("missing".into())],
            ..SessionConfig::default()
        };
        let (result, _, _) = run(&hello(), BTreeMap::new(), &config, "");
        assert!(matches!(result, Err(CliError::Usage(_))));
    }

    #[test]
    fn budget_and_step_mode_are_applied() {
        let config = SessionConfig {
            step_mode: StepMode::AsmStep,
            max_instructions: Some(2),
            ..SessionConfig::default()
        };
        let (result, console, output) = run(&hello(), BTreeMap::new(), &config, "");
        assert!(matches!(
            result,
            Ok(SessionOutcome::Finished(RunOutcome::BudgetExhausted { instructions: 2, .. }))
        ));
        assert_eq!(console.matches("PC: 0x").count(), 2);
        assert_eq!(output, b"o");
    }

    #[test]
    fn faults_are_returned_with_context() {
        let program = Program::raw(image(&[encode_i(0x0B, 1, 0, 0)]), 0);
        let (result, _, _) = run(&program, BTreeMap::new(), &SessionConfig::default(), "");
        match result {
            Ok(SessionOutcome::Faulted(err)) => {
                assert!(matches!(err.fault, Fault::ArithmeticFault { pc: 0, .. }));
                assert_eq!(err.context.pc, 0);
            }
            other => panic!("expected a fault, got {other:?}"),
        }
    }
}
