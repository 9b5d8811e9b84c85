//! Genome model — the program an agent carries
//!
//! A genome is an ordered collection of tagged functions; each function is an
//! ordered run of instructions. Genomes are pure data: the mutation engine
//! edits them, the deme loads them onto hardware.

mod instruction;
mod program;
mod text;

pub use instruction::{Instruction, Opcode, Tag, INST_ARG_CNT, TAG_WIDTH};
pub use program::{Function, Genome, ProgramBounds, ShapeViolation};
pub use text::ProgramParseError;
