//! Instruction — one step of an organism's program
//!
//! An instruction is an opcode drawn from the fixed opcode table, a 16-bit tag
//! (used by `Call`/`Fork` to find a matching function) and exactly
//! `INST_ARG_CNT` numeric arguments.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of every tag, in bits
pub const TAG_WIDTH: usize = 16;

/// Number of arguments carried by every instruction
pub const INST_ARG_CNT: usize = 3;

/// Fixed-width bit pattern used for call and activation matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tag(u16);

impl Tag {
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    /// All-zero tag
    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub fn get(&self, bit: usize) -> bool {
        debug_assert!(bit < TAG_WIDTH);
        (self.0 >> bit) & 1 == 1
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        debug_assert!(bit < TAG_WIDTH);
        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    pub fn flip(&mut self, bit: usize) {
        debug_assert!(bit < TAG_WIDTH);
        self.0 ^= 1 << bit;
    }

    /// Fraction of bit positions on which two tags agree, in [0, 1]
    pub fn similarity(&self, other: &Tag) -> f64 {
        let differing = (self.0 ^ other.0).count_ones() as f64;
        1.0 - differing / TAG_WIDTH as f64
    }
}

impl fmt::Display for Tag {
    /// Most significant bit first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in (0..TAG_WIDTH).rev() {
            f.write_str(if self.get(bit) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != TAG_WIDTH {
            return Err(format!("tag must be {} bits, got {} characters", TAG_WIDTH, s.len()));
        }
        let mut tag = Tag::zero();
        for (i, c) in s.chars().enumerate() {
            let bit = TAG_WIDTH - 1 - i;
            match c {
                '0' => {}
                '1' => tag.set(bit, true),
                other => return Err(format!("invalid tag bit '{}'", other)),
            }
        }
        Ok(tag)
    }
}

/// The opcode table. Order is significant: an opcode's position is its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Inc,
    Dec,
    Not,
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    TestEqu,
    TestNEqu,
    TestLess,
    If,
    While,
    Countdown,
    Close,
    Break,
    Call,
    Return,
    SetMem,
    CopyMem,
    SwapMem,
    Input,
    Output,
    Commit,
    Pull,
    Nop,
    Fork,
    Nand,
    Terminate,
    Load1,
    Load2,
    Submit,
}

impl Opcode {
    pub const ALL: [Opcode; 32] = [
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Not,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mult,
        Opcode::Div,
        Opcode::Mod,
        Opcode::TestEqu,
        Opcode::TestNEqu,
        Opcode::TestLess,
        Opcode::If,
        Opcode::While,
        Opcode::Countdown,
        Opcode::Close,
        Opcode::Break,
        Opcode::Call,
        Opcode::Return,
        Opcode::SetMem,
        Opcode::CopyMem,
        Opcode::SwapMem,
        Opcode::Input,
        Opcode::Output,
        Opcode::Commit,
        Opcode::Pull,
        Opcode::Nop,
        Opcode::Fork,
        Opcode::Nand,
        Opcode::Terminate,
        Opcode::Load1,
        Opcode::Load2,
        Opcode::Submit,
    ];

    /// Size of the opcode table
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Opcode> {
        Self::ALL.get(index).copied()
    }

    /// Uniformly random valid opcode
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Opcode {
        Self::ALL[rng.gen_range(0..Self::COUNT)]
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Inc => "Inc",
            Opcode::Dec => "Dec",
            Opcode::Not => "Not",
            Opcode::Add => "Add",
            Opcode::Sub => "Sub",
            Opcode::Mult => "Mult",
            Opcode::Div => "Div",
            Opcode::Mod => "Mod",
            Opcode::TestEqu => "TestEqu",
            Opcode::TestNEqu => "TestNEqu",
            Opcode::TestLess => "TestLess",
            Opcode::If => "If",
            Opcode::While => "While",
            Opcode::Countdown => "Countdown",
            Opcode::Close => "Close",
            Opcode::Break => "Break",
            Opcode::Call => "Call",
            Opcode::Return => "Return",
            Opcode::SetMem => "SetMem",
            Opcode::CopyMem => "CopyMem",
            Opcode::SwapMem => "SwapMem",
            Opcode::Input => "Input",
            Opcode::Output => "Output",
            Opcode::Commit => "Commit",
            Opcode::Pull => "Pull",
            Opcode::Nop => "Nop",
            Opcode::Fork => "Fork",
            Opcode::Nand => "Nand",
            Opcode::Terminate => "Terminate",
            Opcode::Load1 => "Load-1",
            Opcode::Load2 => "Load-2",
            Opcode::Submit => "Submit",
        }
    }

    pub fn from_name(name: &str) -> Option<Opcode> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Number of arguments the opcode actually reads
    pub fn arg_count(self) -> usize {
        match self {
            Opcode::Close
            | Opcode::Break
            | Opcode::Call
            | Opcode::Return
            | Opcode::Nop
            | Opcode::Fork
            | Opcode::Terminate => 0,
            Opcode::Inc
            | Opcode::Dec
            | Opcode::Not
            | Opcode::If
            | Opcode::While
            | Opcode::Countdown
            | Opcode::Load1
            | Opcode::Submit => 1,
            Opcode::SetMem
            | Opcode::CopyMem
            | Opcode::SwapMem
            | Opcode::Input
            | Opcode::Output
            | Opcode::Commit
            | Opcode::Pull
            | Opcode::Load2 => 2,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mult
            | Opcode::Div
            | Opcode::Mod
            | Opcode::TestEqu
            | Opcode::TestNEqu
            | Opcode::TestLess
            | Opcode::Nand => 3,
        }
    }
}

/// A single instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub tag: Tag,
    pub args: [i32; INST_ARG_CNT],
}

impl Instruction {
    pub fn new(opcode: Opcode, args: [i32; INST_ARG_CNT]) -> Self {
        Self { opcode, tag: Tag::zero(), args }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    /// Random opcode, random tag, each argument uniform in [0, max_arg_val]
    pub fn random<R: Rng + ?Sized>(rng: &mut R, max_arg_val: i32) -> Self {
        let opcode = Opcode::random(rng);
        let tag = Tag::random(rng);
        let mut args = [0; INST_ARG_CNT];
        for arg in args.iter_mut() {
            *arg = rng.gen_range(0..=max_arg_val);
        }
        Self { opcode, tag, args }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}](", self.opcode.name(), self.tag)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_tag_bits() {
        let mut tag = Tag::zero();
        tag.set(3, true);
        assert!(tag.get(3));
        assert_eq!(tag.bits(), 0b1000);
        tag.flip(3);
        tag.flip(0);
        assert_eq!(tag.bits(), 1);
    }

    #[test]
    fn test_tag_text_roundtrip() {
        let tag = Tag::new(0b1010_0000_0000_0011);
        let text = tag.to_string();
        assert_eq!(text, "1010000000000011");
        assert_eq!(text.parse::<Tag>().unwrap(), tag);
        assert!("0101".parse::<Tag>().is_err());
        assert!("01010101010101x1".parse::<Tag>().is_err());
    }

    #[test]
    fn test_tag_similarity() {
        let a = Tag::zero();
        assert_eq!(a.similarity(&a), 1.0);
        assert_eq!(a.similarity(&Tag::new(u16::MAX)), 0.0);
        assert_eq!(a.similarity(&Tag::new(0x00FF)), 0.5);
    }

    #[test]
    fn test_opcode_table() {
        assert_eq!(Opcode::COUNT, 32);
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
            assert_eq!(Opcode::from_index(i), Some(*op));
            assert_eq!(Opcode::from_name(op.name()), Some(*op));
            assert!(op.arg_count() <= INST_ARG_CNT);
        }
        assert_eq!(Opcode::from_index(Opcode::COUNT), None);
        assert_eq!(Opcode::from_name("Load-2"), Some(Opcode::Load2));
    }

    #[test]
    fn test_random_instruction_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let inst = Instruction::random(&mut rng, 15);
            assert!(inst.args.iter().all(|a| (0..=15).contains(a)));
        }
    }
}
