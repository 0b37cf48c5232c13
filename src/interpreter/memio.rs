use crate::codec::{Instruction, Operand, Reg};
use crate::error::VmError;
use crate::state::MachineState;

use super::{check_address, resolve, write_reg, StepOutcome};

pub(super) fn op_rmem(state: &mut MachineState, dst: Reg, a: Operand) -> Result<StepOutcome, VmError> {
    let addr = check_address(resolve(state, a))?;
    let value = state.memory[addr];
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::RMem(dst, a).len()))
}

pub(super) fn op_wmem(state: &mut MachineState, a: Operand, b: Operand) -> Result<StepOutcome, VmError> {
    let addr = check_address(resolve(state, a))?;
    let value = resolve(state, b);
    state.memory[addr] = value;
    Ok(StepOutcome::advance(state, Instruction::WMem(a, b).len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;

    #[test]
    fn rmem_reads_from_memory() {
        let mut state = MachineState::from_image(&[0, 0, 0, 42], Mode::Step);
        op_rmem(&mut state, Reg(0), Operand::Literal(3)).unwrap();
        assert_eq!(state.registers[0], 42);
    }

    #[test]
    fn wmem_writes_to_memory_and_is_visible_to_the_next_fetch() {
        let mut state = MachineState::from_image(&[0, 0, 0, 0], Mode::Step);
        op_wmem(&mut state, Operand::Literal(3), Operand::Literal(99)).unwrap();
        assert_eq!(state.memory[3], 99);
    }
}
