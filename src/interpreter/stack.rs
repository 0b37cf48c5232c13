use crate::codec::{Instruction, Operand, Reg};
use crate::error::VmError;
use crate::state::{CallTraceEntry, MachineState};

use super::{resolve, write_reg, ScheduleHint, StepOutcome};

pub(super) fn op_push(state: &mut MachineState, a: Operand) -> Result<StepOutcome, VmError> {
    let value = resolve(state, a);
    state.stack.push(value);
    Ok(StepOutcome::advance(state, Instruction::Push(a).len()))
}

pub(super) fn op_pop(state: &mut MachineState, dst: Reg) -> Result<StepOutcome, VmError> {
    let value = state.stack.pop().ok_or(VmError::StackUnderflow)?;
    write_reg(state, dst, value);
    Ok(StepOutcome::advance(state, Instruction::Pop(dst).len()))
}

/// Pushes the return address (the instruction after this `call`) onto
/// the data stack and mirrors the call site onto the diagnostic call
/// trace, then jumps to the resolved target.
pub(super) fn op_call(state: &mut MachineState, a: Operand) -> Result<StepOutcome, VmError> {
    let target = resolve(state, a);
    let return_addr = state.pc.wrapping_add(Instruction::Call(a).len());
    state.stack.push(return_addr);
    state.call_trace.push(CallTraceEntry {
        call_site: state.pc,
        annotation: state.annotations.get(&state.pc).cloned(),
    });
    Ok(StepOutcome::jump(target))
}

/// Pops the return address off the data stack and jumps to it, popping
/// the diagnostic call trace in lock-step. An empty stack halts the
/// machine rather than erroring — this is the program's own way of
/// terminating when it `ret`s past its outermost call.
pub(super) fn op_ret(state: &mut MachineState) -> Result<StepOutcome, VmError> {
    match state.stack.pop() {
        Some(target) => {
            state.call_trace.pop();
            Ok(StepOutcome::jump(target))
        }
        None => Ok(StepOutcome {
            next_pc: state.pc,
            hint: ScheduleHint::Idle,
            output: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;

    #[test]
    fn push_then_pop_round_trips_and_leaves_stack_empty() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        op_push(&mut state, Operand::Literal(777)).unwrap();
        assert_eq!(state.stack, vec![777]);
        let outcome = op_pop(&mut state, Reg(0)).unwrap();
        assert_eq!(state.registers[0], 777);
        assert!(state.stack.is_empty());
        assert_eq!(outcome.hint, ScheduleHint::Continue);
    }

    #[test]
    fn pop_on_empty_stack_is_an_error() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        assert_eq!(op_pop(&mut state, Reg(0)), Err(VmError::StackUnderflow));
    }

    #[test]
    fn call_pushes_return_address_and_records_call_trace() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        state.pc = 100;
        state.annotations.insert(100, "jump table".to_string());
        let outcome = op_call(&mut state, Operand::Literal(500)).unwrap();
        assert_eq!(outcome.next_pc, 500);
        assert_eq!(state.stack, vec![102]);
        assert_eq!(state.call_trace.len(), 1);
        assert_eq!(state.call_trace[0].call_site, 100);
        assert_eq!(
            state.call_trace[0].annotation.as_deref(),
            Some("jump table")
        );
    }

    #[test]
    fn call_then_ret_returns_to_the_instruction_after_call() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        state.pc = 100;
        let after_call = op_call(&mut state, Operand::Literal(500)).unwrap();
        state.pc = after_call.next_pc;
        let after_ret = op_ret(&mut state).unwrap();
        assert_eq!(after_ret.next_pc, 102);
        assert!(state.call_trace.is_empty());
    }

    #[test]
    fn ret_on_empty_stack_halts_instead_of_erroring() {
        let mut state = MachineState::from_image(&[], Mode::Step);
        let outcome = op_ret(&mut state).unwrap();
        assert_eq!(outcome.hint, ScheduleHint::Idle);
    }
}
