//! CLI entry point for the Alex Machine simulator binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use alex_sim::{
    init_logging, run_session, CliError, Program, ProgramDebugInfo, SessionConfig, SessionOutcome,
};
use alex_sim_core::{StepMode, Target, DEFAULT_STACK_TOP};
use object as _;
use serde as _;
use serde_json as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

const USAGE_TEXT: &str = "\
Usage: alex-sim [options] <program>

Runs an Alex Machine executable. Program output goes to stdout; the
debugger console shares the terminal.

Options:
  -p, --program <file>          Program image (ELF32 unless --raw is given)
  -s, --step <no|asm|src>       Initial stepping mode (default: no)
  -d, --debug-info <file>       JSON debug info (default: <program>.json if present)
  -b, --break <addr|symbol>     Add a breakpoint; may be repeated
  -n, --max-instructions <n>    Stop after n retired instructions
      --raw <base>              Load a flat binary at base and start there
      --stack-top <addr>        Initial stack pointer (default: 0x07c32000)
  -h, --help                    Show this help message

Environment:
  RUST_LOG                      Log filter for stderr diagnostics (default: warn)

Exit status: 0 on halt or budget exhaustion, 1 on usage or load errors,
2 when the program faults.

Examples:
  alex-sim a.out
  alex-sim -s src -b main a.out
  alex-sim --raw 0x1000 -n 10000 image.bin
";

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    program: PathBuf,
    step_mode: StepMode,
    debug_info: Option<PathBuf>,
    breakpoints: Vec<Target>,
    max_instructions: Option<u64>,
    raw_base: Option<u32>,
    stack_top: u32,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

fn parse_address(flag: &str, value: &str) -> Result<u32, String> {
    match Target::parse(value) {
        Ok(Target::Address(addr)) => Ok(addr),
        _ => Err(format!("invalid address for {flag}: {value}")),
    }
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().into_owned())
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut program: Option<PathBuf> = None;
    let mut step_mode = StepMode::NoStep;
    let mut debug_info: Option<PathBuf> = None;
    let mut breakpoints = Vec::new();
    let mut max_instructions = None;
    let mut raw_base = None;
    let mut stack_top = DEFAULT_STACK_TOP;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().into_owned();
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "-p" | "--program" => {
                if program.is_some() {
                    return Err("multiple program paths provided".to_string());
                }
                program = Some(PathBuf::from(next_value(&mut args, &flag)?));
            }
            "-s" | "--step" => {
                let value = next_value(&mut args, &flag)?;
                step_mode = value.parse().map_err(|err| format!("{err}"))?;
            }
            "-d" | "--debug-info" => {
                debug_info = Some(PathBuf::from(next_value(&mut args, &flag)?));
            }
            "-b" | "--break" => {
                let value = next_value(&mut args, &flag)?;
                breakpoints.push(Target::parse(&value).map_err(|err| format!("{err}"))?);
            }
            "-n" | "--max-instructions" => {
                let value = next_value(&mut args, &flag)?;
                let count = value
                    .parse()
                    .map_err(|_| format!("invalid instruction count: {value}"))?;
                max_instructions = Some(count);
            }
            "--raw" => raw_base = Some(parse_address(&flag, &next_value(&mut args, &flag)?)?),
            "--stack-top" => stack_top = parse_address(&flag, &next_value(&mut args, &flag)?)?,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => {
                if program.is_some() {
                    return Err("multiple program paths provided".to_string());
                }
                program = Some(PathBuf::from(arg));
            }
        }
    }

    let program = program.ok_or_else(|| "missing program path".to_string())?;
    Ok(ParseResult::Run(RunArgs {
        program,
        step_mode,
        debug_info,
        breakpoints,
        max_instructions,
        raw_base,
        stack_top,
    }))
}

fn default_debug_info_path(program: &Path) -> PathBuf {
    let mut name = program.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

fn load_debug_info(args: &RunArgs, program: &Program) -> Result<ProgramDebugInfo, CliError> {
    let path = match &args.debug_info {
        Some(path) => path.clone(),
        None => {
            let path = default_debug_info_path(&args.program);
            if !path.is_file() {
                return Ok(ProgramDebugInfo::from_symbols(program.symbols.clone()));
            }
            path
        }
    };
    ProgramDebugInfo::load(&path, program.symbols.clone())
}

fn run(args: RunArgs) -> Result<i32, CliError> {
    let bytes = fs::read(&args.program).map_err(|err| CliError::read(&args.program, err))?;
    let program = match args.raw_base {
        Some(base) => Program::raw(bytes, base),
        None => Program::parse_elf(&bytes)?,
    };
    let info = load_debug_info(&args, &program)?;
    let config = SessionConfig {
        step_mode: args.step_mode,
        breakpoints: args.breakpoints,
        max_instructions: args.max_instructions,
        stack_top: args.stack_top,
    };

    let stdin = io::stdin();
    let outcome = run_session(&program, info, &config, stdin.lock(), io::stdout(), io::stdout())?;
    io::stdout().flush()?;
    match outcome {
        SessionOutcome::Finished(_) => Ok(0),
        SessionOutcome::Faulted(err) => {
            eprintln!("error: {err}");
            eprintln!("{}", err.context);
            Ok(2)
        }
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => {
            init_logging();
            match run(args) {
                Ok(code) => code,
                Err(error) => {
                    eprintln!("error: {error}");
                    1
                }
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}
