//! Function and Genome — the variable-length program of an organism

use super::instruction::{Instruction, Tag};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Legal shape of a genome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBounds {
    pub min_func_cnt: usize,
    pub max_func_cnt: usize,
    pub min_func_len: usize,
    pub max_func_len: usize,
    pub max_total_len: usize,
    /// Largest value an instruction argument may take (inclusive)
    pub max_arg_val: i32,
}

impl Default for ProgramBounds {
    fn default() -> Self {
        Self {
            min_func_cnt: 1,
            max_func_cnt: 16,
            min_func_len: 1,
            max_func_len: 32,
            max_total_len: 512,
            max_arg_val: 15,
        }
    }
}

/// Ways a genome can fall outside its `ProgramBounds`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeViolation {
    #[error("function count {count} outside [{min}, {max}]")]
    FunctionCount { count: usize, min: usize, max: usize },

    #[error("function {index} has length {len}, outside [{min}, {max}]")]
    FunctionLength { index: usize, len: usize, min: usize, max: usize },

    #[error("total instruction count {total} exceeds {max}")]
    TotalLength { total: usize, max: usize },

    #[error("function {function} instruction {instruction} has argument {value}, outside [0, {max}]")]
    ArgumentRange { function: usize, instruction: usize, value: i32, max: i32 },
}

/// A tagged, ordered run of instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub tag: Tag,
    pub instructions: Vec<Instruction>,
}

impl Function {
    pub fn new(tag: Tag) -> Self {
        Self { tag, instructions: Vec::new() }
    }

    pub fn push(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// An organism's program: an ordered collection of functions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Genome {
    pub functions: Vec<Function>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Number of functions
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Sum of all function lengths
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(Function::len).sum()
    }

    /// Check every shape bound, reporting the first violation found
    pub fn check_shape(&self, bounds: &ProgramBounds) -> Result<(), ShapeViolation> {
        let count = self.function_count();
        if count < bounds.min_func_cnt || count > bounds.max_func_cnt {
            return Err(ShapeViolation::FunctionCount {
                count,
                min: bounds.min_func_cnt,
                max: bounds.max_func_cnt,
            });
        }
        for (index, function) in self.functions.iter().enumerate() {
            let len = function.len();
            if len < bounds.min_func_len || len > bounds.max_func_len {
                return Err(ShapeViolation::FunctionLength {
                    index,
                    len,
                    min: bounds.min_func_len,
                    max: bounds.max_func_len,
                });
            }
        }
        let total = self.instruction_count();
        if total > bounds.max_total_len {
            return Err(ShapeViolation::TotalLength { total, max: bounds.max_total_len });
        }
        for (function, f) in self.functions.iter().enumerate() {
            for (instruction, inst) in f.instructions.iter().enumerate() {
                let legal = 0..=bounds.max_arg_val;
                if let Some(&value) = inst.args.iter().find(|a| !legal.contains(*a)) {
                    return Err(ShapeViolation::ArgumentRange {
                        function,
                        instruction,
                        value,
                        max: bounds.max_arg_val,
                    });
                }
            }
        }
        Ok(())
    }

    /// SHA-256 over the textual form, hex encoded
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.to_text().as_bytes()))
    }

    pub fn summary(&self) -> String {
        format!(
            "Genome | {} functions | {} instructions | fingerprint={}",
            self.function_count(),
            self.instruction_count(),
            &self.fingerprint()[..12]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::instruction::Opcode;

    fn genome_with_lengths(lengths: &[usize]) -> Genome {
        let mut genome = Genome::new();
        for &len in lengths {
            let mut f = Function::new(Tag::zero());
            for _ in 0..len {
                f.push(Instruction::new(Opcode::Nop, [0, 0, 0]));
            }
            genome.push_function(f);
        }
        genome
    }

    #[test]
    fn test_counts() {
        let genome = genome_with_lengths(&[3, 5, 1]);
        assert_eq!(genome.function_count(), 3);
        assert_eq!(genome.instruction_count(), 9);
    }

    #[test]
    fn test_check_shape() {
        let bounds = ProgramBounds {
            min_func_cnt: 1,
            max_func_cnt: 3,
            min_func_len: 2,
            max_func_len: 4,
            max_total_len: 8,
            max_arg_val: 15,
        };
        assert!(genome_with_lengths(&[2, 4]).check_shape(&bounds).is_ok());
        assert!(matches!(
            genome_with_lengths(&[]).check_shape(&bounds),
            Err(ShapeViolation::FunctionCount { count: 0, .. })
        ));
        assert!(matches!(
            genome_with_lengths(&[2, 1]).check_shape(&bounds),
            Err(ShapeViolation::FunctionLength { index: 1, .. })
        ));
        assert!(matches!(
            genome_with_lengths(&[4, 4, 4]).check_shape(&bounds),
            Err(ShapeViolation::TotalLength { total: 12, max: 8 })
        ));
    }

    #[test]
    fn test_check_shape_bounds_arguments() {
        let bounds = ProgramBounds::default();
        let mut genome = genome_with_lengths(&[2, 3]);
        genome.functions[1].instructions[2].args = [0, 15, 0];
        assert!(genome.check_shape(&bounds).is_ok());

        genome.functions[1].instructions[2].args[1] = 16;
        assert_eq!(
            genome.check_shape(&bounds),
            Err(ShapeViolation::ArgumentRange { function: 1, instruction: 2, value: 16, max: 15 })
        );

        genome.functions[1].instructions[2].args[1] = 0;
        genome.functions[0].instructions[0].args[0] = -1;
        assert_eq!(
            genome.check_shape(&bounds),
            Err(ShapeViolation::ArgumentRange { function: 0, instruction: 0, value: -1, max: 15 })
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = genome_with_lengths(&[2, 2]);
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.functions[1].instructions[0].args[2] = 9;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
