//! Mutation — variable-length genome variation under strict shape bounds
//!
//! Rates are probabilities; bounds come from `ProgramBounds`. The engine never
//! produces a genome outside its bounds, and a rejected event (one that would
//! break a bound) is simply skipped.

mod engine;

pub use engine::{MutationReport, Mutator};

use serde::{Deserialize, Serialize};

/// The seven mutation-rate parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationRates {
    /// Per tag bit (function tags and instruction tags)
    pub per_bit_tag_flip: f64,
    /// Per instruction opcode, and per instruction argument
    pub per_inst_sub: f64,
    /// Binomial success probability for insertions, per instruction
    pub per_inst_ins: f64,
    /// Per instruction deletion
    pub per_inst_del: f64,
    /// Per function slip (tandem duplicate/delete of a sub-range)
    pub per_func_slip: f64,
    /// Genome-wide, at most one whole-function duplication
    pub per_func_dup: f64,
    /// Genome-wide, at most one whole-function deletion
    pub per_func_del: f64,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            per_bit_tag_flip: 0.005,
            per_inst_sub: 0.005,
            per_inst_ins: 0.005,
            per_inst_del: 0.005,
            per_func_slip: 0.05,
            per_func_dup: 0.05,
            per_func_del: 0.05,
        }
    }
}

impl MutationRates {
    /// All rates zero: mutation is the identity
    pub fn none() -> Self {
        Self {
            per_bit_tag_flip: 0.0,
            per_inst_sub: 0.0,
            per_inst_ins: 0.0,
            per_inst_del: 0.0,
            per_func_slip: 0.0,
            per_func_dup: 0.0,
            per_func_del: 0.0,
        }
    }

    /// (name, value) for every rate, used by config validation
    pub fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("per_bit_tag_flip", self.per_bit_tag_flip),
            ("per_inst_sub", self.per_inst_sub),
            ("per_inst_ins", self.per_inst_ins),
            ("per_inst_del", self.per_inst_del),
            ("per_func_slip", self.per_func_slip),
            ("per_func_dup", self.per_func_dup),
            ("per_func_del", self.per_func_del),
        ]
    }
}
