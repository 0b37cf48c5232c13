use crate::codec::{Instruction, Operand, Reg, MODULUS};
use crate::error::VmError;
use crate::state::MachineState;

use super::{resolve, write_reg, StepOutcome};

pub(super) fn op_add(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let sum = resolve(state, a) as u32 + resolve(state, b) as u32;
    write_reg(state, dst, (sum % MODULUS) as u16);
    Ok(StepOutcome::advance(state, Instruction::Add(dst, a, b).len()))
}

pub(super) fn op_mult(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let product = resolve(state, a) as u32 * resolve(state, b) as u32;
    write_reg(state, dst, (product % MODULUS) as u16);
    Ok(StepOutcome::advance(
        state,
        Instruction::Mult(dst, a, b).len(),
    ))
}

pub(super) fn op_mod(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let divisor = resolve(state, b);
    if divisor == 0 {
        return Err(VmError::DivisionByZero);
    }
    let remainder = resolve(state, a) % divisor;
    write_reg(state, dst, remainder);
    Ok(StepOutcome::advance(state, Instruction::Mod(dst, a, b).len()))
}

pub(super) fn op_and(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let value = resolve(state, a) & resolve(state, b);
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::And(dst, a, b).len()))
}

pub(super) fn op_or(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let value = resolve(state, a) | resolve(state, b);
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::Or(dst, a, b).len()))
}

pub(super) fn op_not(state: &mut MachineState, dst: Reg, a: Operand) -> Result<StepOutcome, VmError> {
    let value = (!resolve(state, a)) & 0x7FFF;
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::Not(dst, a).len()))
}

pub(super) fn op_eq(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let value = (resolve(state, a) == resolve(state, b)) as u16;
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::Eq(dst, a, b).len()))
}

pub(super) fn op_gt(
    state: &mut MachineState,
    dst: Reg,
    a: Operand,
    b: Operand,
) -> Result<StepOutcome, VmError> {
    let value = (resolve(state, a) > resolve(state, b)) as u16;
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::Gt(dst, a, b).len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;

    fn state() -> MachineState {
        MachineState::from_image(&[], Mode::Step)
    }

    #[test]
    fn add_wraps_modulo_32768() {
        let mut s = state();
        op_add(&mut s, Reg(0), Operand::Literal(32767), Operand::Literal(2)).unwrap();
        assert_eq!(s.registers[0], 1);
    }

    #[test]
    fn mult_wraps_modulo_32768() {
        let mut s = state();
        op_mult(&mut s, Reg(0), Operand::Literal(20000), Operand::Literal(20000)).unwrap();
        assert_eq!(s.registers[0], ((20000u32 * 20000u32) % 32768) as u16);
    }

    #[test]
    fn mod_by_zero_is_division_by_zero() {
        let mut s = state();
        assert_eq!(
            op_mod(&mut s, Reg(0), Operand::Literal(5), Operand::Literal(0)),
            Err(VmError::DivisionByZero)
        );
    }

    #[test]
    fn decrypt_idiom_matches_reference_formula() {
        // r2 = r0 & r1; r2 = ~r2; r0 = r0 | r1; r0 = r0 & r2.
        // Net effect: r0 = (r0 | r1) & ~(r0 & r1), all masked to 15 bits.
        let mut s = state();
        s.registers[0] = 12345;
        s.registers[1] = 6789;

        op_and(&mut s, Reg(2), Operand::Register(0), Operand::Register(1)).unwrap();
        op_not(&mut s, Reg(2), Operand::Register(2)).unwrap();
        op_or(&mut s, Reg(0), Operand::Register(0), Operand::Register(1)).unwrap();
        op_and(&mut s, Reg(0), Operand::Register(0), Operand::Register(2)).unwrap();

        let expected = ((12345u16 | 6789u16) & !(12345u16 & 6789u16)) & 0x7FFF;
        assert_eq!(s.registers[0], expected);
    }

    #[test]
    fn eq_and_gt_produce_booleans() {
        let mut s = state();
        op_eq(&mut s, Reg(0), Operand::Literal(4), Operand::Literal(4)).unwrap();
        assert_eq!(s.registers[0], 1);
        op_gt(&mut s, Reg(1), Operand::Literal(5), Operand::Literal(4)).unwrap();
        assert_eq!(s.registers[1], 1);
        op_gt(&mut s, Reg(1), Operand::Literal(3), Operand::Literal(4)).unwrap();
        assert_eq!(s.registers[1], 0);
    }
}
