//! Pure mapping between a flat 16-bit little-endian memory image and
//! structured instructions.
//!
//! | Opcode | Name  | Argc |
//! | ---    | ---   | ---  |
//! | 0      | halt  | 0    |
//! | 1      | set   | 2    |
//! | 2      | push  | 1    |
//! | 3      | pop   | 1    |
//! | 4      | eq    | 3    |
//! | 5      | gt    | 3    |
//! | 6      | jmp   | 1    |
//! | 7      | jt    | 2    |
//! | 8      | jf    | 2    |
//! | 9      | add   | 3    |
//! | 10     | mult  | 3    |
//! | 11     | mod   | 3    |
//! | 12     | and   | 3    |
//! | 13     | or    | 3    |
//! | 14     | not   | 2    |
//! | 15     | rmem  | 2    |
//! | 16     | wmem  | 2    |
//! | 17     | call  | 1    |
//! | 18     | ret   | 0    |
//! | 19     | out   | 1    |
//! | 20     | in    | 1    |
//! | 21     | noop  | 0    |

use std::fmt;

use crate::error::VmError;

pub type Word = u16;

/// Total addressable memory, in words.
pub const MEM_SIZE: usize = 32768;

/// All arithmetic wraps at this modulus.
pub const MODULUS: u32 = 32768;

/// First raw value that denotes a register reference rather than a literal.
const REGISTER_BASE: Word = 32768;

/// One past the last valid register reference.
const REGISTER_LIMIT: Word = 32776;

/// A decoded operand: either a raw literal value or a register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Literal(Word),
    Register(u8),
}

impl Operand {
    /// Decodes a raw memory word at `addr` into an operand. Accepts either
    /// a literal (0..=32767) or a register reference (32768..=32775).
    pub fn decode(raw: Word, addr: Word) -> Result<Operand, VmError> {
        match raw {
            0..=32767 => Ok(Operand::Literal(raw)),
            REGISTER_BASE..=32775 => Ok(Operand::Register((raw - REGISTER_BASE) as u8)),
            _ => Err(VmError::Malformed(addr)),
        }
    }

    /// Encodes the operand back into its raw word form.
    pub fn encode(self) -> Word {
        match self {
            Operand::Literal(w) => w,
            Operand::Register(r) => REGISTER_BASE + r as Word,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(w) => write!(f, "{w}"),
            Operand::Register(r) => write!(f, "r{r}"),
        }
    }
}

/// A register reference. Distinct from [`Operand`] because some operand
/// slots (write destinations) are constrained to be register-valued — a
/// literal in that slot is malformed, not merely a different kind of
/// operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(pub u8);

impl Reg {
    pub fn decode(raw: Word, addr: Word) -> Result<Reg, VmError> {
        match raw {
            REGISTER_BASE..=32775 => Ok(Reg((raw - REGISTER_BASE) as u8)),
            _ => Err(VmError::Malformed(addr)),
        }
    }

    pub fn encode(self) -> Word {
        REGISTER_BASE + self.0 as Word
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A decoded instruction: an opcode plus 0–3 operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Halt,
    Set(Reg, Operand),
    Push(Operand),
    Pop(Reg),
    Eq(Reg, Operand, Operand),
    Gt(Reg, Operand, Operand),
    Jmp(Operand),
    Jt(Operand, Operand),
    Jf(Operand, Operand),
    Add(Reg, Operand, Operand),
    Mult(Reg, Operand, Operand),
    Mod(Reg, Operand, Operand),
    And(Reg, Operand, Operand),
    Or(Reg, Operand, Operand),
    Not(Reg, Operand),
    RMem(Reg, Operand),
    WMem(Operand, Operand),
    Call(Operand),
    Ret,
    Out(Operand),
    In(Reg),
    Noop,
    /// An opcode word outside 0..=21. Rendered but never executed —
    /// the controller halts the moment this is decoded.
    Unknown(Word),
}

impl Instruction {
    /// Number of operand words following the opcode word.
    pub fn argc(&self) -> u16 {
        use Instruction::*;
        match self {
            Halt | Ret | Noop | Unknown(_) => 0,
            Push(_) | Pop(_) | Jmp(_) | Call(_) | Out(_) | In(_) => 1,
            Set(_, _) | Jt(_, _) | Jf(_, _) | Not(_, _) | RMem(_, _) | WMem(_, _) => 2,
            Eq(_, _, _) | Gt(_, _, _) | Add(_, _, _) | Mult(_, _, _) | Mod(_, _, _)
            | And(_, _, _) | Or(_, _, _) => 3,
        }
    }

    /// Total words consumed by this instruction, including the opcode.
    pub fn len(&self) -> u16 {
        1 + self.argc()
    }

    /// Re-encodes the instruction back into its raw word form. Used by
    /// the `decode(encode(i)) == i` round-trip property and by `poke`
    /// style patching helpers.
    pub fn encode(&self) -> Vec<Word> {
        use Instruction::*;
        match *self {
            Halt => vec![0],
            Set(dst, a) => vec![1, dst.encode(), a.encode()],
            Push(a) => vec![2, a.encode()],
            Pop(dst) => vec![3, dst.encode()],
            Eq(dst, a, b) => vec![4, dst.encode(), a.encode(), b.encode()],
            Gt(dst, a, b) => vec![5, dst.encode(), a.encode(), b.encode()],
            Jmp(a) => vec![6, a.encode()],
            Jt(a, b) => vec![7, a.encode(), b.encode()],
            Jf(a, b) => vec![8, a.encode(), b.encode()],
            Add(dst, a, b) => vec![9, dst.encode(), a.encode(), b.encode()],
            Mult(dst, a, b) => vec![10, dst.encode(), a.encode(), b.encode()],
            Mod(dst, a, b) => vec![11, dst.encode(), a.encode(), b.encode()],
            And(dst, a, b) => vec![12, dst.encode(), a.encode(), b.encode()],
            Or(dst, a, b) => vec![13, dst.encode(), a.encode(), b.encode()],
            Not(dst, a) => vec![14, dst.encode(), a.encode()],
            RMem(dst, a) => vec![15, dst.encode(), a.encode()],
            WMem(a, b) => vec![16, a.encode(), b.encode()],
            Call(a) => vec![17, a.encode()],
            Ret => vec![18],
            Out(a) => vec![19, a.encode()],
            In(dst) => vec![20, dst.encode()],
            Noop => vec![21],
            Unknown(word) => vec![word],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Halt => write!(f, "halt"),
            Set(dst, a) => write!(f, "set {dst} {a}"),
            Push(a) => write!(f, "push {a}"),
            Pop(dst) => write!(f, "pop {dst}"),
            Eq(dst, a, b) => write!(f, "eq {dst} {a} {b}"),
            Gt(dst, a, b) => write!(f, "gt {dst} {a} {b}"),
            Jmp(a) => write!(f, "jmp {a}"),
            Jt(a, b) => write!(f, "jt {a} {b}"),
            Jf(a, b) => write!(f, "jf {a} {b}"),
            Add(dst, a, b) => write!(f, "add {dst} {a} {b}"),
            Mult(dst, a, b) => write!(f, "mult {dst} {a} {b}"),
            Mod(dst, a, b) => write!(f, "mod {dst} {a} {b}"),
            And(dst, a, b) => write!(f, "and {dst} {a} {b}"),
            Or(dst, a, b) => write!(f, "or {dst} {a} {b}"),
            Not(dst, a) => write!(f, "not {dst} {a}"),
            RMem(dst, a) => write!(f, "rmem {dst} {a}"),
            WMem(a, b) => write!(f, "wmem {a} {b}"),
            Call(a) => write!(f, "call {a}"),
            Ret => write!(f, "ret"),
            Out(a) => write!(f, "out {a}"),
            In(dst) => write!(f, "in {dst}"),
            Noop => write!(f, "noop"),
            Unknown(word) => write!(f, "unknown({word})"),
        }
    }
}

/// Reads a single little-endian word from `image` at `addr`. Addresses
/// past the end of `image` read as zero, matching the arch-spec's
/// "missing high addresses are zero" rule.
pub fn read_word(image: &[Word], addr: Word) -> Word {
    *image.get(addr as usize).unwrap_or(&0)
}

/// Returns a copy of `image` with the word at `addr` overwritten. Panics
/// if `addr` is outside the image — callers within this crate always
/// operate on a full 32768-word image, so this can only happen on a
/// corrupted caller, not on program-supplied addresses (`wmem` addresses
/// are resolved operands already clamped to [0, 32767]).
pub fn write_word(image: &mut [Word], addr: Word, value: Word) {
    image[addr as usize] = value;
}

/// Decodes the instruction at `addr`, returning it along with its total
/// length in words (including the opcode word).
pub fn decode(image: &[Word], addr: Word) -> Result<(Instruction, u16), VmError> {
    let opcode_word = read_word(image, addr);

    let operand = |offset: u16| -> Word { read_word(image, addr.wrapping_add(offset)) };

    let instr = match opcode_word {
        0 => Instruction::Halt,
        1 => Instruction::Set(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
        ),
        2 => Instruction::Push(Operand::decode(operand(1), addr.wrapping_add(1))?),
        3 => Instruction::Pop(Reg::decode(operand(1), addr.wrapping_add(1))?),
        4 => Instruction::Eq(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        5 => Instruction::Gt(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        6 => Instruction::Jmp(Operand::decode(operand(1), addr.wrapping_add(1))?),
        7 => Instruction::Jt(
            Operand::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
        ),
        8 => Instruction::Jf(
            Operand::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
        ),
        9 => Instruction::Add(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        10 => Instruction::Mult(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        11 => Instruction::Mod(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        12 => Instruction::And(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        13 => Instruction::Or(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
            Operand::decode(operand(3), addr.wrapping_add(3))?,
        ),
        14 => Instruction::Not(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
        ),
        15 => Instruction::RMem(
            Reg::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
        ),
        16 => Instruction::WMem(
            Operand::decode(operand(1), addr.wrapping_add(1))?,
            Operand::decode(operand(2), addr.wrapping_add(2))?,
        ),
        17 => Instruction::Call(Operand::decode(operand(1), addr.wrapping_add(1))?),
        18 => Instruction::Ret,
        19 => Instruction::Out(Operand::decode(operand(1), addr.wrapping_add(1))?),
        20 => Instruction::In(Reg::decode(operand(1), addr.wrapping_add(1))?),
        21 => Instruction::Noop,
        other if other > 21 => Instruction::Unknown(other),
        _ => unreachable!("opcode word matched by an earlier, exhaustive arm"),
    };

    let len = instr.len();
    Ok((instr, len))
}
