use crate::codec::{Instruction, Operand};
use crate::error::VmError;
use crate::state::MachineState;

use super::{resolve, StepOutcome};

pub(super) fn op_jmp(state: &mut MachineState, a: Operand) -> Result<StepOutcome, VmError> {
    Ok(StepOutcome::jump(resolve(state, a)))
}

pub(super) fn op_jt(state: &mut MachineState, a: Operand, b: Operand) -> Result<StepOutcome, VmError> {
    if resolve(state, a) != 0 {
        Ok(StepOutcome::jump(resolve(state, b)))
    } else {
        Ok(StepOutcome::advance(state, Instruction::Jt(a, b).len()))
    }
}

pub(super) fn op_jf(state: &mut MachineState, a: Operand, b: Operand) -> Result<StepOutcome, VmError> {
    if resolve(state, a) == 0 {
        Ok(StepOutcome::jump(resolve(state, b)))
    } else {
        Ok(StepOutcome::advance(state, Instruction::Jf(a, b).len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;

    #[test]
    fn jmp_sets_pc_to_the_resolved_target() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        let outcome = op_jmp(&mut state, Operand::Literal(900)).unwrap();
        assert_eq!(outcome.next_pc, 900);
    }

    #[test]
    fn jt_jumps_only_when_nonzero() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        state.pc = 10;
        state.registers[0] = 0;
        let outcome = op_jt(&mut state, Operand::Register(0), Operand::Literal(900)).unwrap();
        assert_eq!(outcome.next_pc, 13); // jt has len 3

        state.registers[0] = 1;
        let outcome = op_jt(&mut state, Operand::Register(0), Operand::Literal(900)).unwrap();
        assert_eq!(outcome.next_pc, 900);
    }

    #[test]
    fn jf_jumps_only_when_zero() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        state.pc = 10;
        state.registers[0] = 1;
        let outcome = op_jf(&mut state, Operand::Register(0), Operand::Literal(900)).unwrap();
        assert_eq!(outcome.next_pc, 13);

        state.registers[0] = 0;
        let outcome = op_jf(&mut state, Operand::Register(0), Operand::Literal(900)).unwrap();
        assert_eq!(outcome.next_pc, 900);
    }
}
