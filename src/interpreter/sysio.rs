use crate::codec::{Instruction, Operand, Reg};
use crate::error::VmError;
use crate::state::MachineState;

use super::{resolve, write_reg, ScheduleHint, StepOutcome};

pub(super) fn op_halt(state: &MachineState) -> Result<StepOutcome, VmError> {
    Ok(StepOutcome {
        next_pc: state.pc,
        hint: ScheduleHint::Idle,
        output: None,
    })
}

pub(super) fn op_set(state: &mut MachineState, dst: Reg, a: Operand) -> Result<StepOutcome, VmError> {
    let value = resolve(state, a);
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::Set(dst, a).len()))
}

pub(super) fn op_noop(state: &MachineState) -> Result<StepOutcome, VmError> {
    Ok(StepOutcome::advance(state, Instruction::Noop.len()))
}

pub(super) fn op_out(state: &mut MachineState, a: Operand) -> Result<StepOutcome, VmError> {
    let byte = (resolve(state, a) % 256) as u8;
    let mut outcome = StepOutcome::advance(state, Instruction::Out(a).len());
    outcome.output = Some(byte);
    Ok(outcome)
}

/// If the input buffer is empty, re-executes this instruction next time
/// (the controller parks on [`ScheduleHint::WaitForInput`] instead of
/// advancing the PC) rather than treating an empty buffer as an error.
pub(super) fn op_in(state: &mut MachineState, dst: Reg) -> Result<StepOutcome, VmError> {
    match state.input.pop_front() {
        Some(byte) => {
            write_reg(state, dst, byte as u16);
            Ok(StepOutcome::advance(state, Instruction::In(dst).len()))
        }
        None => Ok(StepOutcome {
            next_pc: state.pc,
            hint: ScheduleHint::WaitForInput,
            output: None,
        }),
    }
}
