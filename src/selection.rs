//! Selection — elite copy plus tournament selection with mutation
//!
//! Higher scores win; equal scores go to the lower population index, so a
//! turnover is fully determined by the scores and the random stream.

use crate::genome::Genome;
use crate::mutation::{MutationReport, Mutator};
use rand::Rng;
use std::cmp::Ordering;

/// One population slot
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// Population slot, reassigned every generation
    pub id: usize,
    pub genome: Genome,
}

impl Agent {
    pub fn new(id: usize, genome: Genome) -> Self {
        Self { id, genome }
    }
}

/// Best first, ties to the lower index
fn rank(scores: &[f64], a: usize, b: usize) -> Ordering {
    scores[b].total_cmp(&scores[a]).then(a.cmp(&b))
}

/// Indices of the `count` best scores
pub fn elite_ids(scores: &[f64], count: usize) -> Vec<usize> {
    let mut ids: Vec<usize> = (0..scores.len()).collect();
    ids.sort_by(|&a, &b| rank(scores, a, b));
    ids.truncate(count);
    ids
}

/// Draw `size` indices uniformly with replacement and return the best
pub fn tournament<R: Rng + ?Sized>(scores: &[f64], size: usize, rng: &mut R) -> usize {
    let mut best = rng.gen_range(0..scores.len());
    for _ in 1..size {
        let challenger = rng.gen_range(0..scores.len());
        if rank(scores, challenger, best) == Ordering::Less {
            best = challenger;
        }
    }
    best
}

/// Build the next population: unmutated elites first, then mutated
/// tournament winners. Ids are reassigned to the new slots.
pub fn next_generation<R: Rng + ?Sized>(
    population: &[Agent],
    scores: &[f64],
    elite_cnt: usize,
    tournament_size: usize,
    mutator: &Mutator,
    rng: &mut R,
) -> (Vec<Agent>, MutationReport) {
    let mut report = MutationReport::default();
    if population.is_empty() {
        return (Vec::new(), report);
    }
    let mut next: Vec<Genome> = Vec::with_capacity(population.len());

    for id in elite_ids(scores, elite_cnt.min(population.len())) {
        next.push(population[id].genome.clone());
    }
    while next.len() < population.len() {
        let winner = tournament(scores, tournament_size, rng);
        let mut offspring = population[winner].genome.clone();
        report.accumulate(&mutator.mutate(&mut offspring, rng));
        next.push(offspring);
    }

    let agents = next
        .into_iter()
        .enumerate()
        .map(|(id, genome)| Agent::new(id, genome))
        .collect();
    (agents, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{Function, Instruction, Opcode, ProgramBounds, Tag};
    use crate::mutation::MutationRates;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn genome_of_len(len: usize) -> Genome {
        let mut f = Function::new(Tag::zero());
        for _ in 0..len {
            f.push(Instruction::new(Opcode::Nop, [0, 0, 0]));
        }
        let mut g = Genome::new();
        g.push_function(f);
        g
    }

    fn population(n: usize) -> Vec<Agent> {
        (0..n).map(|id| Agent::new(id, genome_of_len(id + 1))).collect()
    }

    #[test]
    fn test_elites_best_first_ties_to_lower_id() {
        let scores = [1.0, 3.0, 2.0, 3.0, 0.0];
        assert_eq!(elite_ids(&scores, 3), vec![1, 3, 2]);
        assert_eq!(elite_ids(&scores, 0), Vec::<usize>::new());
        assert_eq!(elite_ids(&scores, 10).len(), 5);
    }

    #[test]
    fn test_full_tournament_picks_a_best() {
        let scores = [0.0, 5.0, 1.0, 5.0];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut wins = [0usize; 4];
        for _ in 0..500 {
            wins[tournament(&scores, 16, &mut rng)] += 1;
        }
        // With 16 draws a top scorer is almost always sampled.
        assert!(wins[1] + wins[3] > 490);
        assert!(wins[1] > wins[3]);
    }

    #[test]
    fn test_tournament_of_one_is_uniform_draw() {
        let scores = [0.0, 0.0, 0.0];
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut seen = [false; 3];
        for _ in 0..100 {
            seen[tournament(&scores, 1, &mut rng)] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_next_generation_keeps_size_and_reassigns_ids() {
        let pop = population(6);
        let scores = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let mutator = Mutator::new(MutationRates::none(), ProgramBounds::default());
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (next, report) = next_generation(&pop, &scores, 2, 3, &mutator, &mut rng);
        assert_eq!(next.len(), 6);
        assert_eq!(report.total(), 0);
        for (slot, agent) in next.iter().enumerate() {
            assert_eq!(agent.id, slot);
        }
        // Elites are the two best genomes, unchanged.
        assert_eq!(next[0].genome, pop[5].genome);
        assert_eq!(next[1].genome, pop[4].genome);
    }

    #[test]
    fn test_empty_population_turns_over_to_empty() {
        let mutator = Mutator::new(MutationRates::default(), ProgramBounds::default());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (next, report) = next_generation(&[], &[], 1, 2, &mutator, &mut rng);
        assert!(next.is_empty());
        assert_eq!(report, MutationReport::default());
    }

    #[test]
    fn test_elites_are_not_mutated() {
        let pop = population(4);
        let scores = [9.0, 0.0, 0.0, 0.0];
        let rates = MutationRates { per_inst_sub: 1.0, ..MutationRates::none() };
        let mutator = Mutator::new(rates, ProgramBounds::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (next, report) = next_generation(&pop, &scores, 1, 2, &mutator, &mut rng);
        assert_eq!(next[0].genome, pop[0].genome);
        assert!(report.substitutions > 0);
    }
}
