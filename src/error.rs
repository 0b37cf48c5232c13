use thiserror::Error;

use crate::codec::Word;

/// Everything that can go wrong while decoding or executing a program.
///
/// Decode failures and runtime failures share one enum because both are
/// handled identically by the controller: the offending error is attached
/// to the halted machine for inspection, nothing unwinds the Rust stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("malformed operand at address {0}")]
    Malformed(Word),

    #[error("unknown opcode {word} at address {addr}")]
    UnknownOpcode { addr: Word, word: Word },

    #[error("stack underflow")]
    StackUnderflow,

    #[error("address out of range: {0}")]
    AddressOutOfRange(u32),

    #[error("invalid register index: {0}")]
    InvalidRegister(u8),

    #[error("division by zero")]
    DivisionByZero,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for VmError {
    fn from(e: std::io::Error) -> Self {
        VmError::Io(e.to_string())
    }
}
