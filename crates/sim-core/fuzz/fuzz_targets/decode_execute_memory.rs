#![no_main]

use alex_sim_core::{decode, disassemble, step_one, GeneralRegister, MachineState};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let _ = decode(word);
    let _ = disassemble(word).to_string();

    let mut state = MachineState::new();
    state.load_image(0, data);
    let sp = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    state.set_register(GeneralRegister::SP, sp as i32);

    let mut out = Vec::new();
    for _ in 0..64 {
        match step_one(&mut state, &mut out) {
            Ok(alex_sim_core::StepOutcome::Retired { .. }) => {}
            Ok(alex_sim_core::StepOutcome::Halted { .. }) | Err(_) => break,
        }
    }
    assert_eq!(state.register(GeneralRegister::R0), 0);
});
