//! Instruction semantics driven through the public stepping API.

#![allow(clippy::cast_sign_loss)]

use proptest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

use alex_sim_core::{
    step_one, Fault, GeneralRegister, IntOp, MachineState, NoopHook, RunOutcome, SimConfig,
    Simulator, StepOutcome, HALT_SENTINEL,
};
use rstest::rstest;

use GeneralRegister::{R0, R1, R2, R3, R4};

const fn encode_r(opcode: u8, ra: u8, rb: u8, rc: u8) -> u32 {
    ((opcode as u32) << 24) | ((ra as u32) << 20) | ((rb as u32) << 16) | ((rc as u32) << 12)
}

const fn encode_i(opcode: u8, ra: u8, rb: u8, imm: u16) -> u32 {
    ((opcode as u32) << 24) | ((ra as u32) << 20) | ((rb as u32) << 16) | imm as u32
}

fn run_word(state: &mut MachineState, word: u32) -> Result<StepOutcome, Fault> {
    let pc = state.pc();
    state.write_u32(pc, word);
    step_one(state, &mut Vec::new())
}

fn load_program(state: &mut MachineState, base: u32, words: &[u32]) {
    for (offset, word) in (0_u32..).zip(words) {
        state.write_u32(base + offset * 4, *word);
    }
}

#[rstest]
#[case::add(0x01, -1, 1, -2)]
#[case::sub(0x04, 3, 1, -2)]
#[case::mul(0x07, -2, 1, -2)]
#[case::div(0x0A, -1, 1, -2)]
#[case::modulo(0x0D, 1, 5, 2)]
#[case::shl(0x10, -16_777_216, 0xFF00, 16)]
#[case::slr(0x12, 0x00FF_FFFF, -1, 8)]
#[case::sar(0x14, -1, -1, 8)]
#[case::and(0x16, 0xFFF, 0xFFFF, 0xFFF)]
#[case::or(0x17, 0xF_FFFF, 0xF_0FFF, 0xFF00)]
#[case::xor(0x18, 0xFF00, 0xF0F0, 0x0FF0)]
#[case::not(0x19, -1, 0, 0)]
#[case::eq(0x1A, 1, -1, -1)]
#[case::ne(0x1B, 0, -1, -1)]
#[case::lt(0x1C, 1, -1, 1)]
#[case::ltu(0x1D, 0, -1, 1)]
#[case::gt(0x1E, 0, -1, 1)]
#[case::gtu(0x1F, 1, -1, 1)]
#[case::le(0x20, 1, -1, 1)]
#[case::leu(0x21, 0, -1, 1)]
#[case::ge(0x22, 0, -1, 1)]
#[case::geu(0x23, 1, -1, 1)]
fn r_shape_arithmetic(#[case] opcode: u8, #[case] expected: i32, #[case] rb: i32, #[case] rc: i32) {
    let mut state = MachineState::new();
    state.set_register(R2, rb);
    state.set_register(R3, rc);
    run_word(&mut state, encode_r(opcode, 1, 2, 3)).expect("retires");
    assert_eq!(state.register(R1), expected);
}

#[rstest]
#[case::addi(0x02, 1, 2, 0xFFFF)]
#[case::addiu(0x03, 0x10001, 2, 0xFFFF)]
#[case::subi(0x05, 3, 2, 0xFFFF)]
#[case::subiu(0x06, -65_533, 2, 0xFFFF)]
#[case::muli(0x08, -2, 2, 0xFFFF)]
#[case::muliu(0x09, 131_070, 2, 0xFFFF)]
#[case::divi(0x0B, -2, 2, 0xFFFF)]
#[case::diviu(0x0C, 0, 2, 0xFFFF)]
#[case::modi(0x0E, 0, 2, 0xFFFF)]
#[case::modiu(0x0F, 2, 2, 0xFFFF)]
#[case::shli(0x11, -16_777_216, 0xFF00, 16)]
#[case::slri(0x13, 0x00FF_FFFF, -1, 8)]
#[case::sari(0x15, -1, -1, 8)]
#[case::ori(0x42, -1, -65_536, 0xFFFF)]
fn i_shape_arithmetic(#[case] opcode: u8, #[case] expected: i32, #[case] rb: i32, #[case] imm: u16) {
    let mut state = MachineState::new();
    state.set_register(R2, rb);
    run_word(&mut state, encode_i(opcode, 1, 2, imm)).expect("retires");
    assert_eq!(state.register(R1), expected);
}

#[test]
fn taken_beq_moves_by_scaled_offset() {
    let mut state = MachineState::new();
    state.set_pc(0x100);
    state.set_register(R1, 1);
    state.set_register(R2, 1);
    run_word(&mut state, encode_i(0x25, 1, 2, 3)).expect("retires");
    assert_eq!(state.pc(), 0x10C);

    state.set_pc(0x100);
    state.set_register(R2, 2);
    run_word(&mut state, encode_i(0x25, 1, 2, 3)).expect("retires");
    assert_eq!(state.pc(), 0x104);
}

#[test]
fn backward_branch_and_absolute_jump() {
    let mut state = MachineState::new();
    state.set_pc(0x100);
    run_word(&mut state, encode_i(0x24, 0, 0, 0xFFFE)).expect("retires");
    assert_eq!(state.pc(), 0xF8);

    state.set_pc(0x0400_0010);
    run_word(&mut state, 0x2900_0040).expect("retires");
    assert_eq!(state.pc(), 0x0400_0100);
}

#[test]
fn byte_store_then_byte_load_zero_extends() {
    let mut state = MachineState::new();
    state.set_register(R1, -3);
    run_word(&mut state, encode_i(0x36, 1, 0, 0x100)).expect("sb");
    run_word(&mut state, encode_i(0x2F, 2, 0, 0x100)).expect("lb");
    assert_eq!(state.register(R2), 0xFD);
}

#[test]
fn word_store_then_partial_loads() {
    let mut state = MachineState::new();
    state.set_register(R1, -1);
    state.set_register(R4, 0x200);
    run_word(&mut state, encode_i(0x34, 1, 4, 0)).expect("sw");
    run_word(&mut state, encode_i(0x2F, 2, 4, 0)).expect("lb");
    run_word(&mut state, encode_i(0x2E, 3, 4, 0)).expect("lh");
    assert_eq!(state.register(R2), 0xFF);
    assert_eq!(state.register(R3), 0xFFFF);
    assert_eq!(state.peek_u32(0x200), 0xFFFF_FFFF);
}

#[test]
fn negative_load_offset() {
    let mut state = MachineState::new();
    state.write_u32(0x1FC, 0x1234_5678);
    state.set_register(R2, 0x200);
    run_word(&mut state, encode_i(0x2D, 1, 2, 0xFFFC)).expect("lw");
    assert_eq!(state.register(R1), 0x1234_5678);
}

#[test]
fn call_then_ret_returns_past_call() {
    let mut state = MachineState::new();
    state.set_register(GeneralRegister::SP, 0x8000);
    state.set_register(R3, 0x40);
    load_program(&mut state, 0x10, &[encode_r(0x2B, 3, 0, 0)]);
    load_program(&mut state, 0x40, &[encode_r(0x2C, 0, 0, 0)]);
    state.set_pc(0x10);

    step_one(&mut state, &mut Vec::new()).expect("call");
    assert_eq!(state.pc(), 0x40);
    assert_eq!(state.register(GeneralRegister::SP), 0x7FFC);
    assert_eq!(state.peek_u32(0x7FFC), 0x14);

    step_one(&mut state, &mut Vec::new()).expect("ret");
    assert_eq!(state.pc(), 0x14);
    assert_eq!(state.register(GeneralRegister::SP), 0x8000);
}

#[test]
fn push_and_pop_each_width() {
    let mut state = MachineState::new();
    state.set_register(GeneralRegister::SP, 0x8000);
    state.set_register(R1, 0x1234_5678);
    run_word(&mut state, encode_r(0x3E, 1, 0, 0)).expect("pshh");
    assert_eq!(state.register(GeneralRegister::SP), 0x7FFE);
    run_word(&mut state, encode_r(0x39, 2, 0, 0)).expect("poph");
    assert_eq!(state.register(R2), 0x5678);
    assert_eq!(state.register(GeneralRegister::SP), 0x8000);

    run_word(&mut state, encode_r(0x3F, 1, 0, 0)).expect("pshb");
    assert_eq!(state.register(GeneralRegister::SP), 0x7FFF);
    run_word(&mut state, encode_r(0x3A, 3, 0, 0)).expect("popb");
    assert_eq!(state.register(R3), 0x78);
}

#[test]
fn float_pipeline() {
    let mut state = MachineState::new();
    state.set_register(GeneralRegister::SP, 0x8000);
    state.set_register(R2, 7);
    state.set_register(R3, -2);
    run_word(&mut state, encode_r(0x45, 1, 2, 0)).expect("itof");
    run_word(&mut state, encode_r(0x45, 2, 3, 0)).expect("itof");
    run_word(&mut state, encode_r(0x4B, 3, 1, 2)).expect("divf");
    assert!((state.float_register(R3) - -3.5).abs() < f64::EPSILON);

    run_word(&mut state, encode_r(0x53, 4, 3, 0)).expect("floor");
    run_word(&mut state, encode_r(0x47, 4, 4, 0)).expect("ftoi");
    assert_eq!(state.register(R4), -4);

    run_word(&mut state, encode_r(0x4F, 1, 3, 1)).expect("ltf");
    assert_eq!(state.register(R1), 1);

    run_word(&mut state, encode_r(0x41, 3, 0, 0)).expect("psha");
    assert_eq!(state.register(GeneralRegister::SP), 0x7FF8);
    run_word(&mut state, encode_r(0x3C, 5, 0, 0)).expect("popa");
    assert!((state.float_register(GeneralRegister::R5) - -3.5).abs() < f64::EPSILON);
}

#[test]
fn unsigned_int_to_float() {
    let mut state = MachineState::new();
    state.set_register(R2, -1);
    run_word(&mut state, encode_r(0x46, 1, 2, 0)).expect("itofu");
    assert!((state.float_register(R1) - 4_294_967_295.0).abs() < f64::EPSILON);
}

#[test]
fn load_upper_preserves_low_half() {
    let mut state = MachineState::new();
    run_word(&mut state, encode_i(0x32, 1, 0, 0x1234)).expect("liu");
    run_word(&mut state, encode_i(0x33, 1, 0, 0xABCD)).expect("lih");
    assert_eq!(state.register(R1) as u32, 0xABCD_1234);
    run_word(&mut state, encode_i(0x31, 2, 0, 0xFFFF)).expect("li");
    assert_eq!(state.register(R2), -1);
}

#[test]
fn privileged_registers_and_flags() {
    let mut state = MachineState::new();
    state.set_register(R1, 0x4000);
    run_word(&mut state, encode_r(0x83, 1, 0, 0)).expect("mtiv");
    run_word(&mut state, encode_r(0x85, 1, 0, 0)).expect("mtpt");
    run_word(&mut state, encode_r(0x82, 2, 0, 0)).expect("mfiv");
    run_word(&mut state, encode_r(0x84, 3, 0, 0)).expect("mfpt");
    assert_eq!(state.ivec(), 0x4000);
    assert_eq!(state.register(R2), 0x4000);
    assert_eq!(state.register(R3), 0x4000);

    state.set_register(R1, 1);
    run_word(&mut state, encode_i(0x87, 1, 0, 3)).expect("sflg");
    run_word(&mut state, encode_r(0x86, 4, 0, 0)).expect("lflg");
    assert_eq!(state.register(R4), 0b1000);

    state.set_register(R1, 0);
    run_word(&mut state, encode_i(0x87, 1, 0, 35)).expect("sflg");
    assert_eq!(state.flags(), 0);
}

#[test]
fn division_by_zero_faults_without_writeback() {
    let mut state = MachineState::new();
    state.set_pc(0x20);
    state.set_register(R1, 99);
    state.set_register(R2, 5);
    let fault = run_word(&mut state, encode_r(0x0A, 1, 2, 3)).expect_err("faults");
    assert_eq!(fault, Fault::ArithmeticFault { pc: 0x20, op: IntOp::Div });
    assert_eq!(state.register(R1), 99);
    assert_eq!(state.pc(), 0x20);

    let fault = run_word(&mut state, encode_i(0x0F, 1, 2, 0)).expect_err("faults");
    assert_eq!(fault, Fault::ArithmeticFault { pc: 0x20, op: IntOp::ModU });
}

#[test]
fn unmapped_opcode_is_unsupported() {
    let mut state = MachineState::new();
    let fault = run_word(&mut state, 0x3012_3456).expect_err("faults");
    assert_eq!(
        fault,
        Fault::UnsupportedInstruction {
            pc: 0,
            word: 0x3012_3456,
            opcode: 0x30,
        }
    );
}

#[test]
fn register_zero_writes_are_discarded_and_counted() {
    let mut state = MachineState::new();
    state.set_register(R2, 5);
    run_word(&mut state, encode_i(0x02, 0, 2, 1)).expect("addi");
    assert_eq!(state.register(R0), 0);
    assert_eq!(state.diagnostics().read_only_writes, 1);
}

#[test]
fn uninitialized_reads_warn_once_per_byte() {
    let mut state = MachineState::new();
    run_word(&mut state, encode_i(0x2D, 1, 0, 0x500)).expect("lw");
    assert_eq!(state.register(R1), 0);
    assert_eq!(state.diagnostics().uninitialized_reads, 4);
    state.set_pc(4);
    run_word(&mut state, encode_i(0x2D, 1, 0, 0x500)).expect("lw");
    assert_eq!(state.diagnostics().uninitialized_reads, 4);
}

#[test]
fn halt_opcode_and_sentinel_keep_pc() {
    let mut state = MachineState::new();
    state.set_pc(0x30);
    assert_eq!(
        run_word(&mut state, 0xFF00_0000),
        Ok(StepOutcome::Halted { pc: 0x30 })
    );
    assert_eq!(
        run_word(&mut state, HALT_SENTINEL),
        Ok(StepOutcome::Halted { pc: 0x30 })
    );
    assert_eq!(state.pc(), 0x30);
}

#[test]
fn simulator_prints_and_halts() {
    let mut sim = Simulator::new(SimConfig {
        entry: 0x1000,
        ..SimConfig::default()
    });
    load_program(
        sim.state_mut(),
        0x1000,
        &[
            encode_i(0x31, 1, 0, u16::from(b'H')),
            encode_r(0x81, 1, 0, 0),
            encode_i(0x31, 1, 0, u16::from(b'i')),
            encode_r(0x81, 1, 0, 0),
            HALT_SENTINEL,
        ],
    );
    let mut out = Vec::new();
    let outcome = sim.run(&mut NoopHook, &mut out).expect("runs");
    assert_eq!(
        outcome,
        RunOutcome::Halted {
            pc: 0x1010,
            instructions: 4,
        }
    );
    assert_eq!(out, b"Hi");
    assert!(sim.run_state().is_halted());
}

#[test]
fn simulator_fault_carries_context() {
    let mut sim = Simulator::new(SimConfig::default());
    load_program(
        sim.state_mut(),
        0,
        &[encode_i(0x31, 2, 0, 7), encode_r(0x0D, 1, 2, 3)],
    );
    let err = sim.run(&mut NoopHook, &mut Vec::new()).expect_err("faults");
    assert_eq!(err.fault, Fault::ArithmeticFault { pc: 4, op: IntOp::Mod });
    assert_eq!(err.context.pc, 4);
    assert_eq!(err.context.registers[2], 7);
    assert_eq!(err.context.instructions_retired, 1);
    assert!(err.context.to_string().contains("=> 0x00000004"));
}
