//! The single-threaded owner of a running machine: drives the
//! interpreter instruction by instruction, services breakpoints and the
//! run modes, and forwards emitted bytes to its terminal collaborator.
//!
//! Nothing outside this module ever calls [`crate::interpreter::evaluate`]
//! directly against a live, owned [`MachineState`] — everything else goes
//! through a [`Command`].

use std::path::PathBuf;

use tracing::{debug, info};

use crate::boundary::{Inspectable, Terminal};
use crate::codec::{decode, Instruction, Word};
use crate::error::VmError;
use crate::interpreter::{check_address, evaluate, ScheduleHint};
use crate::state::{MachineState, Mode};

fn check_register(reg: u8) -> Result<usize, VmError> {
    if (reg as usize) < 8 {
        Ok(reg as usize)
    } else {
        Err(VmError::InvalidRegister(reg))
    }
}

/// One unit of work the controller can be asked to perform. Modeled as a
/// tagged enum (rather than a grab-bag of methods) so a front end can
/// queue commands without holding a borrow on the controller.
#[derive(Debug, Clone)]
pub enum Command {
    Input(Vec<u8>),
    Evaluate(Instruction),
    GetState,
    SetState(Box<MachineState>),
    SetRegister(u8, Word),
    Peek(Word),
    Poke(Word, Word),
    Save(PathBuf),
    Load(PathBuf),
    Annotate(Option<Word>, String),
    AddBreak(Word),
    ClearBreak,
    Break,
    Step,
    Next,
    Up,
    Continue,
    Ret,
    Shutdown,
}

/// What came back from dispatching a [`Command`].
#[derive(Debug)]
pub enum CommandResult {
    Ok,
    State(Box<MachineState>),
    Peeked { value: Word, annotation: Option<String> },
    Register(Word),
    Err(VmError),
}

/// How far a single call to [`Controller::tick`] got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickResult {
    /// A breakpoint, `RunTo` target, or `Ret`-mode return suspended
    /// execution back to `Mode::Step`.
    Suspended,
    /// The machine halted (instruction `halt`, a `ret` with an empty
    /// stack, or a decode/runtime error).
    Halted,
    /// `in` found an empty input buffer.
    WaitingForInput,
    /// Keep dispatching; nothing stopped us.
    Continuing,
}

pub struct Controller {
    state: MachineState,
    terminal: Box<dyn Terminal>,
    /// The address of a breakpoint we most recently suspended at, so the
    /// very next `continue` steps past it instead of re-triggering
    /// immediately. Cleared once that one instruction executes.
    paused_breakpoint: Option<Word>,
    shutdown: bool,
}

impl Controller {
    pub fn new(state: MachineState, terminal: Box<dyn Terminal>) -> Self {
        Controller {
            state,
            terminal,
            paused_breakpoint: None,
            shutdown: false,
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn has_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Executes exactly one instruction at the current PC, ignoring
    /// breakpoints and mode transitions entirely. Used both by the
    /// explicit `step` command and to step past a breakpoint we just
    /// paused at.
    fn execute_one(&mut self) -> TickResult {
        if self.state.halt {
            return TickResult::Halted;
        }

        let pc = self.state.pc;
        let (instr, _) = match decode(&*self.state.memory, pc) {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };

        match evaluate(instr, &mut self.state) {
            Err(e) => self.fail(e),
            Ok(outcome) => {
                self.state.pc = outcome.next_pc;
                if let Some(byte) = outcome.output {
                    self.terminal.emit(byte);
                }
                match outcome.hint {
                    ScheduleHint::Idle => {
                        self.state.halt = true;
                        TickResult::Halted
                    }
                    ScheduleHint::WaitForInput => TickResult::WaitingForInput,
                    ScheduleHint::Continue => TickResult::Continuing,
                }
            }
        }
    }

    fn fail(&mut self, error: VmError) -> TickResult {
        debug!(?error, pc = self.state.pc, "halting on error");
        self.state.last_error = Some(error);
        self.state.halt = true;
        TickResult::Halted
    }

    /// One iteration of the autorun loop: checks breakpoints and the
    /// current mode before dispatching, then applies any mode
    /// transition the just-executed instruction triggers.
    fn tick(&mut self) -> TickResult {
        if self.state.halt {
            return TickResult::Halted;
        }
        if self.state.mode == Mode::Step {
            return TickResult::Suspended;
        }
        if self.state.breakpoints.contains(&self.state.pc) {
            info!(pc = self.state.pc, "breakpoint hit");
            self.state.mode = Mode::Step;
            self.paused_breakpoint = Some(self.state.pc);
            return TickResult::Suspended;
        }

        let pc = self.state.pc;
        let (instr, _) = match decode(&*self.state.memory, pc) {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        let is_ret = matches!(instr, Instruction::Ret);

        match evaluate(instr, &mut self.state) {
            Err(e) => self.fail(e),
            Ok(outcome) => {
                self.state.pc = outcome.next_pc;
                if let Some(byte) = outcome.output {
                    self.terminal.emit(byte);
                }

                let mut suspend_next = false;
                if self.state.mode == Mode::Ret && is_ret {
                    self.state.mode = Mode::Step;
                    suspend_next = true;
                }
                if let Mode::RunTo(target) = self.state.mode {
                    if self.state.pc == target {
                        self.state.mode = Mode::Step;
                        suspend_next = true;
                    }
                }

                match outcome.hint {
                    ScheduleHint::Idle => {
                        self.state.halt = true;
                        TickResult::Halted
                    }
                    ScheduleHint::WaitForInput => TickResult::WaitingForInput,
                    ScheduleHint::Continue if suspend_next => {
                        info!(pc = self.state.pc, mode = ?self.state.mode, "suspended");
                        TickResult::Suspended
                    }
                    ScheduleHint::Continue => TickResult::Continuing,
                }
            }
        }
    }

    fn drive_until_suspended(&mut self) -> TickResult {
        loop {
            match self.tick() {
                TickResult::Continuing => continue,
                other => return other,
            }
        }
    }

    /// Runs to natural completion under the current mode, stepping past
    /// a just-hit breakpoint first if that's what we're resuming from.
    fn resume(&mut self, mode: Mode) -> TickResult {
        self.state.mode = mode;
        if let Some(bp) = self.paused_breakpoint.take() {
            if bp == self.state.pc {
                match self.execute_one() {
                    TickResult::Continuing => {}
                    other => return other,
                }
            }
        }
        self.drive_until_suspended()
    }

    pub fn dispatch(&mut self, cmd: Command) -> CommandResult {
        match cmd {
            Command::Input(bytes) => {
                self.state.push_input(bytes);
                CommandResult::Ok
            }

            Command::Evaluate(instr) => match evaluate(instr, &mut self.state) {
                Ok(outcome) => {
                    if let Some(byte) = outcome.output {
                        self.terminal.emit(byte);
                    }
                    CommandResult::Ok
                }
                Err(e) => CommandResult::Err(e),
            },

            Command::GetState => CommandResult::State(Box::new(self.state.clone())),

            Command::SetState(replacement) => {
                self.state.restore(*replacement);
                CommandResult::Ok
            }

            Command::SetRegister(reg, value) => match self.set_register(reg, value) {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Err(e),
            },

            Command::Peek(addr) => match self.peek(addr) {
                Ok((value, annotation)) => CommandResult::Peeked { value, annotation },
                Err(e) => CommandResult::Err(e),
            },

            Command::Poke(addr, value) => match self.poke(addr, value) {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Err(e),
            },

            Command::Save(path) => match self.save(&path) {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Err(e),
            },

            Command::Load(path) => match self.load(&path) {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Err(e),
            },

            Command::Annotate(addr, text) => {
                let addr = addr.unwrap_or(self.state.pc);
                self.state.annotations.insert(addr, text);
                CommandResult::Ok
            }

            Command::AddBreak(addr) => {
                self.state.breakpoints.insert(addr);
                CommandResult::Ok
            }

            Command::ClearBreak => {
                self.state.breakpoints.clear();
                CommandResult::Ok
            }

            Command::Break => {
                self.state.mode = Mode::Step;
                CommandResult::Ok
            }

            Command::Step => {
                self.execute_one();
                CommandResult::Ok
            }

            Command::Next => {
                self.next();
                CommandResult::Ok
            }

            Command::Up => {
                self.up();
                CommandResult::Ok
            }

            Command::Continue => {
                self.resume(Mode::Run);
                CommandResult::Ok
            }

            Command::Ret => {
                self.resume(Mode::Ret);
                CommandResult::Ok
            }

            Command::Shutdown => {
                self.shutdown = true;
                CommandResult::Ok
            }
        }
    }

    /// Steps over a `call` at the current PC (runs to the instruction
    /// right after it); any other instruction just executes once.
    fn next(&mut self) {
        let pc = self.state.pc;
        let call_len = match decode(&*self.state.memory, pc) {
            Ok((Instruction::Call(_), len)) => Some(len),
            _ => None,
        };

        match call_len {
            Some(len) => {
                let target = pc.wrapping_add(len);
                self.resume(Mode::RunTo(target));
            }
            None => {
                self.execute_one();
            }
        }
    }

    /// Runs until the caller of the current frame regains control, using
    /// the top of the call trace to compute the landing address.
    fn up(&mut self) {
        let Some(entry) = self.state.call_trace.last() else {
            return;
        };
        let call_site = entry.call_site;
        let len = match decode(&*self.state.memory, call_site) {
            Ok((_, len)) => len,
            Err(_) => return,
        };
        let target = call_site.wrapping_add(len);
        self.resume(Mode::RunTo(target));
    }

    fn save(&self, path: &std::path::Path) -> Result<(), VmError> {
        let bytes = sonic_rs::to_vec(&self.state).map_err(|e| VmError::Serde(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn load(&mut self, path: &std::path::Path) -> Result<(), VmError> {
        let bytes = std::fs::read(path)?;
        let loaded: MachineState =
            sonic_rs::from_slice(&bytes).map_err(|e| VmError::Serde(e.to_string()))?;
        self.state.restore(loaded);
        self.paused_breakpoint = None;
        Ok(())
    }
}

impl Inspectable for Controller {
    fn peek(&self, addr: Word) -> Result<(Word, Option<String>), VmError> {
        let idx = check_address(addr)?;
        let value = self.state.memory[idx];
        let annotation = self.state.annotations.get(&addr).cloned();
        Ok((value, annotation))
    }

    fn poke(&mut self, addr: Word, value: Word) -> Result<(), VmError> {
        let idx = check_address(addr)?;
        self.state.memory[idx] = value & 0x7FFF;
        Ok(())
    }

    fn get_register(&self, reg: u8) -> Result<Word, VmError> {
        let idx = check_register(reg)?;
        Ok(self.state.registers[idx])
    }

    fn set_register(&mut self, reg: u8, value: Word) -> Result<(), VmError> {
        let idx = check_register(reg)?;
        self.state.registers[idx] = value & 0x7FFF;
        Ok(())
    }

    fn evaluate(&mut self, instr: Instruction) -> Result<(), VmError> {
        match self.dispatch(Command::Evaluate(instr)) {
            CommandResult::Ok => Ok(()),
            CommandResult::Err(e) => Err(e),
            _ => unreachable!("Command::Evaluate always yields Ok or Err"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{RecordingTerminal, SharedRecordingTerminal};
    use crate::codec::{Operand, Reg};

    fn controller(image: &[Word]) -> Controller {
        let state = MachineState::from_image(image, Mode::Run);
        Controller::new(state, Box::new(RecordingTerminal::default()))
    }

    #[test]
    fn continue_runs_a_straight_line_program_to_halt() {
        // out 72 ('H'); out 105 ('i'); halt
        let image = [19u16, 72, 19, 105, 0];
        let mut c = controller(&image);
        c.dispatch(Command::Continue);
        assert!(c.state.halt);
        assert_eq!(c.state.pc, 4);
    }

    /// Scenario 1 from spec.md §8: run the tiny program to natural halt
    /// and confirm both the register result and the one byte the
    /// terminal actually observed, in order.
    #[test]
    fn tiny_program_runs_to_halt_and_emits_one_byte() {
        // add r0, r1, 4; out r0; end of stream (implicit halt)
        let image = [9u16, 32768, 32769, 4, 19, 32768];
        let terminal = SharedRecordingTerminal::new();
        let state = MachineState::from_image(&image, Mode::Run);
        let mut c = Controller::new(state, Box::new(terminal.clone()));

        c.dispatch(Command::Continue);

        assert!(c.state().halt);
        assert_eq!(c.state().registers[0], 4);
        assert_eq!(terminal.bytes(), vec![4]);
    }

    #[test]
    fn breakpoint_pauses_once_then_continue_steps_past_it() {
        // noop; noop; halt  -- breakpoint on the second noop
        let image = [21u16, 21, 0];
        let mut c = controller(&image);
        c.dispatch(Command::AddBreak(1));
        c.dispatch(Command::Continue);
        assert_eq!(c.state.pc, 1);
        assert_eq!(c.state.mode, Mode::Step);
        assert!(!c.state.halt);

        c.dispatch(Command::Continue);
        assert!(c.state.halt);
        assert_eq!(c.state.pc, 2);
    }

    #[test]
    fn breakpoint_retriggers_on_a_later_visit() {
        // jmp back to a breakpointed address until a counter in r0 hits 3.
        // 0: jt r0 6      (if r0 != 0, fall into the loop body at label below is skipped for brevity)
        // We use a simpler program: a two-instruction loop decremented via add,
        // with a breakpoint at its head, run three times manually.
        let image = [
            9u16, 32768, 32768, 1, // 0: add r0 r0 1          (breakpoint here)
            7, 32768, 0,           // 4: jt r0 0              -> loops forever while r0 != 0
        ];
        let mut c = controller(&image);
        c.dispatch(Command::AddBreak(0));

        c.dispatch(Command::Continue);
        assert_eq!(c.state.pc, 0);
        assert_eq!(c.state.registers[0], 0);

        c.dispatch(Command::Continue);
        assert_eq!(c.state.pc, 0);
        assert_eq!(c.state.registers[0], 1);

        c.dispatch(Command::Continue);
        assert_eq!(c.state.pc, 0);
        assert_eq!(c.state.registers[0], 2);
    }

    #[test]
    fn step_executes_one_instruction_and_stays_in_step_mode() {
        let image = [21u16, 21, 0];
        let mut c = controller(&image);
        c.dispatch(Command::SetState(Box::new(MachineState::from_image(
            &image,
            Mode::Step,
        ))));
        c.dispatch(Command::Step);
        assert_eq!(c.state.pc, 1);
        assert_eq!(c.state.mode, Mode::Step);
    }

    #[test]
    fn next_steps_over_a_call_without_entering_it() {
        // 0: call 4   1: halt   4: ret
        let image = [17u16, 4, 0, 0, 18];
        let mut c = controller(&image);
        c.dispatch(Command::SetState(Box::new(MachineState::from_image(
            &image,
            Mode::Step,
        ))));
        c.dispatch(Command::Next);
        assert_eq!(c.state.pc, 2);
        assert_eq!(c.state.mode, Mode::Step);
        assert!(c.state.call_trace.is_empty());
    }

    #[test]
    fn evaluate_command_applies_effects_without_moving_pc() {
        let mut c = controller(&[]);
        c.state.pc = 50;
        c.dispatch(Command::Evaluate(Instruction::Add(
            Reg(0),
            Operand::Literal(2),
            Operand::Literal(3),
        )));
        assert_eq!(c.state.registers[0], 5);
        assert_eq!(c.state.pc, 50);
    }

    #[test]
    fn peek_reports_annotation_and_poke_round_trips() {
        let mut c = controller(&[0, 0, 0]);
        c.dispatch(Command::Annotate(Some(2), "flag cell".to_string()));
        c.dispatch(Command::Poke(2, 999));
        let (value, annotation) = c.peek(2).unwrap();
        assert_eq!(value, 999);
        assert_eq!(annotation.as_deref(), Some("flag cell"));
    }

    #[test]
    fn peek_and_poke_reject_out_of_range_addresses() {
        let mut c = controller(&[0]);
        assert_eq!(
            c.peek(40_000).unwrap_err(),
            VmError::AddressOutOfRange(40_000)
        );
        assert_eq!(
            c.poke(40_000, 1).unwrap_err(),
            VmError::AddressOutOfRange(40_000)
        );
        assert!(matches!(
            c.dispatch(Command::Peek(40_000)),
            CommandResult::Err(VmError::AddressOutOfRange(40_000))
        ));
    }

    #[test]
    fn get_and_set_register_reject_out_of_range_indices() {
        let mut c = controller(&[0]);
        assert_eq!(c.get_register(200).unwrap_err(), VmError::InvalidRegister(200));
        assert_eq!(
            c.set_register(200, 1).unwrap_err(),
            VmError::InvalidRegister(200)
        );
        assert!(matches!(
            c.dispatch(Command::SetRegister(200, 1)),
            CommandResult::Err(VmError::InvalidRegister(200))
        ));
    }

    #[test]
    fn save_then_load_round_trips_and_forces_step_mode() {
        // Scenario 6 from spec.md §8: load(save(S)) == S except mode=Step.
        let dir = std::env::temp_dir();
        let path = dir.join(format!("svm-controller-test-{}.json", std::process::id()));

        let mut c = controller(&[9, 32768, 32769, 4]);
        c.state.mode = Mode::Run;
        c.state.registers[1] = 41;
        c.state.pc = 3;
        c.state.stack = vec![10, 20];
        c.state.annotations.insert(0, "entry".to_string());
        c.state.breakpoints.insert(3);
        c.dispatch(Command::Save(path.clone()));

        let mut expected = c.state.clone();
        expected.mode = Mode::Step;

        let mut fresh = controller(&[]);
        fresh.dispatch(Command::Load(path.clone()));
        assert_eq!(fresh.state, expected);

        let _ = std::fs::remove_file(&path);
    }
}
