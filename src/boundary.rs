//! The message-passing surface between the controller and its two
//! external collaborators: a terminal front end, and the domain analysis
//! utilities used to solve the embedded puzzles. Both collaborators are
//! out of scope for this crate — only the narrow interfaces they need
//! are defined here.

use crate::codec::{Instruction, Word};
use crate::error::VmError;

/// Receives bytes emitted by the `out` opcode, one at a time, in program
/// order. A full terminal front end would implement this to forward
/// bytes into a UI; it is not part of this crate.
pub trait Terminal {
    fn emit(&mut self, byte: u8);
}

/// Writes emitted bytes straight to process stdout.
#[derive(Debug, Default)]
pub struct StdoutTerminal;

impl Terminal for StdoutTerminal {
    fn emit(&mut self, byte: u8) {
        use std::io::Write;
        let _ = std::io::stdout().write_all(&[byte]);
        let _ = std::io::stdout().flush();
    }
}

/// Collects emitted bytes in memory. Used by tests and by any caller
/// that wants to inspect program output without a real terminal.
#[derive(Debug, Default, Clone)]
pub struct RecordingTerminal {
    pub bytes: Vec<u8>,
}

impl Terminal for RecordingTerminal {
    fn emit(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
}

impl RecordingTerminal {
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A [`RecordingTerminal`] whose buffer is shared with the caller, so a
/// test can hand the terminal to a `Controller` (which takes ownership
/// via `Box<dyn Terminal>`) and still read back what it emitted.
#[derive(Debug, Default, Clone)]
pub struct SharedRecordingTerminal(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl SharedRecordingTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Terminal for SharedRecordingTerminal {
    fn emit(&mut self, byte: u8) {
        self.0.borrow_mut().push(byte);
    }
}

/// The primitives the out-of-scope domain analysis utilities (recurrence
/// search, door-coin solving, vault graph search, room/item extraction,
/// Graphviz export) need from a live controller. None of those utilities
/// live in this crate; this trait is the seam they would plug into.
///
/// `addr` and `reg` arrive unchecked from outside the decoder, so every
/// method here validates them the same way the interpreter's own
/// `rmem`/`wmem`/register writes do, instead of trusting the caller.
pub trait Inspectable {
    fn peek(&self, addr: Word) -> Result<(Word, Option<String>), VmError>;
    fn poke(&mut self, addr: Word, value: Word) -> Result<(), VmError>;
    fn get_register(&self, reg: u8) -> Result<Word, VmError>;
    fn set_register(&mut self, reg: u8, value: Word) -> Result<(), VmError>;
    fn evaluate(&mut self, instr: Instruction) -> Result<(), VmError>;
}
