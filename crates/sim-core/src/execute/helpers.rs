//! Address arithmetic and stack transfers shared by the executors.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

use crate::encoding::Width;
use crate::state::{GeneralRegister, MachineState};

/// `reg[base] + offset`, wrapping at 2^32.
#[must_use]
pub const fn effective_address(state: &MachineState, base: GeneralRegister, offset: i32) -> u32 {
    (state.register(base) as u32).wrapping_add(offset as u32)
}

/// Zero-extending load of `width` bytes.
pub fn load(state: &mut MachineState, addr: u32, width: Width) -> u32 {
    match width {
        Width::Word => state.read_u32(addr),
        Width::Half => u32::from(state.read_u16(addr)),
        Width::Byte => u32::from(state.read_u8(addr)),
    }
}

/// Stores the low `width` bytes of `value`.
pub fn store(state: &mut MachineState, addr: u32, value: u32, width: Width) {
    match width {
        Width::Word => state.write_u32(addr, value),
        Width::Half => state.write_u16(addr, value as u16),
        Width::Byte => state.write_u8(addr, value as u8),
    }
}

fn stack_pointer(state: &MachineState) -> u32 {
    state.register(GeneralRegister::SP) as u32
}

fn set_stack_pointer(state: &mut MachineState, value: u32) {
    state.set_register(GeneralRegister::SP, value as i32);
}

/// Decrements `sp` by the width, then stores `value` at the new `sp`.
pub fn push(state: &mut MachineState, value: u32, width: Width) {
    let sp = stack_pointer(state).wrapping_sub(width.bytes());
    set_stack_pointer(state, sp);
    store(state, sp, value, width);
}

/// Loads from `sp`, then increments `sp` by the width.
pub fn pop(state: &mut MachineState, width: Width) -> u32 {
    let sp = stack_pointer(state);
    let value = load(state, sp, width);
    set_stack_pointer(state, sp.wrapping_add(width.bytes()));
    value
}

/// Pushes an 8-byte double.
pub fn push_f64(state: &mut MachineState, value: f64) {
    let sp = stack_pointer(state).wrapping_sub(8);
    set_stack_pointer(state, sp);
    state.write_f64(sp, value);
}

/// Pops an 8-byte double.
pub fn pop_f64(state: &mut MachineState) -> f64 {
    let sp = stack_pointer(state);
    let value = state.read_f64(sp);
    set_stack_pointer(state, sp.wrapping_add(8));
    value
}
