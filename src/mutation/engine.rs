//! Mutator — applies every mutation pass to a genome, in order
//!
//! Passes:
//! 1. Whole-function duplication (genome-wide, at most once)
//! 2. Whole-function deletion (genome-wide, at most once; swap-with-last)
//! 3. Per function: tag bit flips, slip, per-instruction substitution, and a
//!    single left-to-right insertion/deletion rebuild
//!
//! `expected_len` is the running total instruction count. Each pass updates it
//! so later bound checks see the cumulative effect of earlier passes.

use super::MutationRates;
use crate::genome::{Function, Genome, Instruction, Opcode, ProgramBounds, Tag, TAG_WIDTH};
use log::trace;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use serde::{Deserialize, Serialize};

/// Count of elementary mutation events actually applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    pub function_duplications: usize,
    pub function_deletions: usize,
    pub tag_bit_flips: usize,
    pub slips: usize,
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl MutationReport {
    pub fn total(&self) -> usize {
        self.function_duplications
            + self.function_deletions
            + self.tag_bit_flips
            + self.slips
            + self.substitutions
            + self.insertions
            + self.deletions
    }

    pub fn accumulate(&mut self, other: &MutationReport) {
        self.function_duplications += other.function_duplications;
        self.function_deletions += other.function_deletions;
        self.tag_bit_flips += other.tag_bit_flips;
        self.slips += other.slips;
        self.substitutions += other.substitutions;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

/// The mutation operator: rates plus the bounds it must respect
#[derive(Debug, Clone)]
pub struct Mutator {
    pub rates: MutationRates,
    pub bounds: ProgramBounds,
}

impl Mutator {
    pub fn new(rates: MutationRates, bounds: ProgramBounds) -> Self {
        Self { rates, bounds }
    }

    /// Mutate `genome` in place. The genome must already satisfy the bounds.
    pub fn mutate<R: Rng + ?Sized>(&self, genome: &mut Genome, rng: &mut R) -> MutationReport {
        let mut report = MutationReport::default();
        let mut expected_len = genome.instruction_count();

        self.duplicate_function(genome, rng, &mut expected_len, &mut report);
        self.delete_function(genome, rng, &mut expected_len, &mut report);

        for function in genome.functions.iter_mut() {
            self.flip_function_tag(function, rng, &mut report);
            self.slip(function, rng, &mut expected_len, &mut report);
            self.substitute(function, rng, &mut report);
            self.insert_and_delete(function, rng, &mut expected_len, &mut report);
        }

        debug_assert_eq!(expected_len, genome.instruction_count());
        trace!("Mutation applied {} events: {:?}", report.total(), report);
        report
    }

    fn duplicate_function<R: Rng + ?Sized>(
        &self,
        genome: &mut Genome,
        rng: &mut R,
        expected_len: &mut usize,
        report: &mut MutationReport,
    ) {
        if genome.functions.is_empty() || !rng.gen_bool(self.rates.per_func_dup) {
            return;
        }
        let fid = rng.gen_range(0..genome.function_count());
        let size = genome.functions[fid].len();
        if genome.function_count() + 1 > self.bounds.max_func_cnt
            || *expected_len + size > self.bounds.max_total_len
        {
            return;
        }
        let copy = genome.functions[fid].clone();
        genome.push_function(copy);
        *expected_len += size;
        report.function_duplications += 1;
    }

    fn delete_function<R: Rng + ?Sized>(
        &self,
        genome: &mut Genome,
        rng: &mut R,
        expected_len: &mut usize,
        report: &mut MutationReport,
    ) {
        if genome.functions.is_empty() || !rng.gen_bool(self.rates.per_func_del) {
            return;
        }
        let fid = rng.gen_range(0..genome.function_count());
        if genome.function_count() - 1 < self.bounds.min_func_cnt {
            return;
        }
        let removed = genome.functions.swap_remove(fid);
        *expected_len -= removed.len();
        report.function_deletions += 1;
    }

    fn flip_tag_bits<R: Rng + ?Sized>(&self, tag: &mut Tag, rng: &mut R, report: &mut MutationReport) {
        for bit in 0..TAG_WIDTH {
            if rng.gen_bool(self.rates.per_bit_tag_flip) {
                tag.flip(bit);
                report.tag_bit_flips += 1;
            }
        }
    }

    fn flip_function_tag<R: Rng + ?Sized>(
        &self,
        function: &mut Function,
        rng: &mut R,
        report: &mut MutationReport,
    ) {
        self.flip_tag_bits(&mut function.tag, rng, report);
    }

    /// Tandem-duplicate `[begin, end)` when `begin < end`, delete `[end, begin)`
    /// when `begin > end`.
    fn slip<R: Rng + ?Sized>(
        &self,
        function: &mut Function,
        rng: &mut R,
        expected_len: &mut usize,
        report: &mut MutationReport,
    ) {
        if function.is_empty() || !rng.gen_bool(self.rates.per_func_slip) {
            return;
        }
        let len = function.len();
        let begin = rng.gen_range(0..len);
        let end = rng.gen_range(0..len);

        if begin < end {
            let dup_size = end - begin;
            if len + dup_size > self.bounds.max_func_len
                || *expected_len + dup_size > self.bounds.max_total_len
            {
                return;
            }
            let mut rebuilt = Vec::with_capacity(len + dup_size);
            rebuilt.extend_from_slice(&function.instructions[..end]);
            rebuilt.extend_from_slice(&function.instructions[begin..]);
            function.instructions = rebuilt;
            *expected_len += dup_size;
            report.slips += 1;
        } else if begin > end {
            let del_size = begin - end;
            if len - del_size < self.bounds.min_func_len {
                return;
            }
            function.instructions.drain(end..begin);
            *expected_len -= del_size;
            report.slips += 1;
        }
    }

    /// Substitutions never change length. Arguments mutate whether or not the
    /// opcode reads them.
    fn substitute<R: Rng + ?Sized>(
        &self,
        function: &mut Function,
        rng: &mut R,
        report: &mut MutationReport,
    ) {
        for inst in function.instructions.iter_mut() {
            self.flip_tag_bits(&mut inst.tag, rng, report);
            if rng.gen_bool(self.rates.per_inst_sub) {
                inst.opcode = Opcode::random(rng);
                report.substitutions += 1;
            }
            for arg in inst.args.iter_mut() {
                if rng.gen_bool(self.rates.per_inst_sub) {
                    *arg = rng.gen_range(0..=self.bounds.max_arg_val);
                    report.substitutions += 1;
                }
            }
        }
    }

    /// Insertions and deletions are resolved in one pass so their combined
    /// effect is checked against the running counters.
    fn insert_and_delete<R: Rng + ?Sized>(
        &self,
        function: &mut Function,
        rng: &mut R,
        expected_len: &mut usize,
        report: &mut MutationReport,
    ) {
        let len = function.len();
        let drawn = if len > 0 && self.rates.per_inst_ins > 0.0 {
            Binomial::new(len as u64, self.rates.per_inst_ins)
                .map(|b| b.sample(rng) as usize)
                .unwrap_or(0)
        } else {
            0
        };
        let num_ins = drawn
            .min(self.bounds.max_func_len.saturating_sub(len))
            .min(self.bounds.max_total_len.saturating_sub(*expected_len));
        *expected_len += num_ins;

        if num_ins == 0 && self.rates.per_inst_del <= 0.0 {
            return;
        }

        let mut expected_func_len = len + num_ins;
        // Sorted descending so the nearest pending offset sits at the back.
        let mut ins_locs: Vec<usize> = (0..num_ins).map(|_| rng.gen_range(0..len)).collect();
        ins_locs.sort_unstable_by(|a, b| b.cmp(a));

        let original = std::mem::take(&mut function.instructions);
        let mut rebuilt = Vec::with_capacity(expected_func_len);
        let mut rhead = 0;
        while rhead < original.len() {
            if let Some(&loc) = ins_locs.last() {
                if rhead >= loc {
                    rebuilt.push(Instruction::random(rng, self.bounds.max_arg_val));
                    ins_locs.pop();
                    report.insertions += 1;
                    continue;
                }
            }
            if rng.gen_bool(self.rates.per_inst_del) && expected_func_len > self.bounds.min_func_len {
                expected_func_len -= 1;
                *expected_len -= 1;
                report.deletions += 1;
            } else {
                rebuilt.push(original[rhead]);
            }
            rhead += 1;
        }
        function.instructions = rebuilt;
    }
}
