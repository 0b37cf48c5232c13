//! A Synacor Challenge virtual machine: a pure codec/interpreter core
//! plus a single-threaded controller that adds breakpoints, run modes,
//! save states, and a disassembly view on top of it.

pub mod boundary;
pub mod codec;
pub mod controller;
pub mod disasm;
pub mod error;
pub mod interpreter;
pub mod state;

pub use controller::{Command, CommandResult, Controller};
pub use error::VmError;
pub use state::{MachineState, Mode};
