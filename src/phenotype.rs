//! Phenotype — what one agent did during one generation's evaluation
//!
//! Counters are credited by task submissions from deme cells. The score is
//! the mean, over trials, of how many distinct tasks the whole deme completed
//! in that trial.

use crate::oracle::{LogicTask, TASK_CNT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    deme_size: usize,
    /// Completions per task, summed over every cell
    pub deme_task_counts: Vec<usize>,
    /// Completions per (cell, task), row-major by cell
    pub indiv_task_counts: Vec<usize>,
    /// Completions per cell, over all tasks
    pub indiv_total_counts: Vec<usize>,
    /// Times each cell completed a task different from its previous one
    pub task_switches: Vec<usize>,
    pub task_total: usize,
    pub score: f64,
    #[serde(skip)]
    trial_tasks: [bool; TASK_CNT],
    #[serde(skip)]
    trials: usize,
    #[serde(skip)]
    distinct_sum: usize,
}

impl Phenotype {
    pub fn new(deme_size: usize) -> Self {
        Self {
            deme_size,
            deme_task_counts: vec![0; TASK_CNT],
            indiv_task_counts: vec![0; deme_size * TASK_CNT],
            indiv_total_counts: vec![0; deme_size],
            task_switches: vec![0; deme_size],
            task_total: 0,
            score: 0.0,
            trial_tasks: [false; TASK_CNT],
            trials: 0,
            distinct_sum: 0,
        }
    }

    /// Zero every counter and the score
    pub fn reset(&mut self) {
        self.deme_task_counts.iter_mut().for_each(|c| *c = 0);
        self.indiv_task_counts.iter_mut().for_each(|c| *c = 0);
        self.indiv_total_counts.iter_mut().for_each(|c| *c = 0);
        self.task_switches.iter_mut().for_each(|c| *c = 0);
        self.task_total = 0;
        self.score = 0.0;
        self.trial_tasks = [false; TASK_CNT];
        self.trials = 0;
        self.distinct_sum = 0;
    }

    pub fn deme_size(&self) -> usize {
        self.deme_size
    }

    /// Credit `task` to `cell`. `last_task` is the cell's marker and is
    /// moved to `task`.
    pub fn credit(&mut self, cell: usize, task: LogicTask, last_task: &mut Option<LogicTask>) {
        let t = task.index();
        self.deme_task_counts[t] += 1;
        self.indiv_task_counts[cell * TASK_CNT + t] += 1;
        self.indiv_total_counts[cell] += 1;
        self.task_total += 1;
        self.trial_tasks[t] = true;
        if matches!(*last_task, Some(prev) if prev != task) {
            self.task_switches[cell] += 1;
        }
        *last_task = Some(task);
    }

    pub fn indiv_task_count(&self, cell: usize, task: LogicTask) -> usize {
        self.indiv_task_counts[cell * TASK_CNT + task.index()]
    }

    /// Distinct tasks completed anywhere in the deme, over all trials so far
    pub fn distinct_tasks(&self) -> usize {
        self.deme_task_counts.iter().filter(|&&c| c > 0).count()
    }

    pub fn begin_trial(&mut self) {
        self.trial_tasks = [false; TASK_CNT];
    }

    /// Close the current trial and refresh the score
    pub fn end_trial(&mut self) {
        self.distinct_sum += self.trial_tasks.iter().filter(|&&done| done).count();
        self.trials += 1;
        self.score = self.distinct_sum as f64 / self.trials as f64;
    }

    pub fn trials(&self) -> usize {
        self.trials
    }
}

/// One phenotype slot per population index, reused every generation
#[derive(Debug, Clone)]
pub struct PhenotypeCache {
    slots: Vec<Phenotype>,
}

impl PhenotypeCache {
    pub fn new(pop_size: usize, deme_size: usize) -> Self {
        Self {
            slots: (0..pop_size).map(|_| Phenotype::new(deme_size)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clear slot `id` and hand it out for a fresh evaluation
    pub fn reset(&mut self, id: usize) -> &mut Phenotype {
        let slot = &mut self.slots[id];
        slot.reset();
        slot
    }

    pub fn get(&self, id: usize) -> &Phenotype {
        &self.slots[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Phenotype {
        &mut self.slots[id]
    }

    pub fn score(&self, id: usize) -> f64 {
        self.slots[id].score
    }

    pub fn scores(&self) -> Vec<f64> {
        self.slots.iter().map(|p| p.score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_updates_every_counter() {
        let mut p = Phenotype::new(4);
        let mut last = None;
        p.begin_trial();
        p.credit(2, LogicTask::Xor, &mut last);
        assert_eq!(p.deme_task_counts[LogicTask::Xor.index()], 1);
        assert_eq!(p.indiv_task_count(2, LogicTask::Xor), 1);
        assert_eq!(p.indiv_total_counts[2], 1);
        assert_eq!(p.task_total, 1);
        assert_eq!(p.task_switches[2], 0);
        assert_eq!(last, Some(LogicTask::Xor));
    }

    #[test]
    fn test_switches_count_only_changes() {
        let mut p = Phenotype::new(2);
        let mut last = None;
        for task in [LogicTask::Nand, LogicTask::Nand, LogicTask::Or, LogicTask::Nand] {
            p.credit(0, task, &mut last);
        }
        assert_eq!(p.task_switches[0], 2);
        assert_eq!(p.task_switches[1], 0);
        assert_eq!(p.indiv_total_counts[0], 4);
    }

    #[test]
    fn test_score_is_mean_distinct_tasks_per_trial() {
        let mut p = Phenotype::new(3);
        let mut last = None;

        p.begin_trial();
        p.credit(0, LogicTask::Nand, &mut last);
        p.credit(1, LogicTask::And, &mut last);
        p.credit(2, LogicTask::And, &mut last);
        p.end_trial();
        assert_eq!(p.score, 2.0);

        p.begin_trial();
        p.end_trial();
        assert_eq!(p.score, 1.0);
        assert_eq!(p.trials(), 2);
        assert_eq!(p.distinct_tasks(), 2);
    }

    #[test]
    fn test_cache_reset_clears_stale_slot() {
        let mut cache = PhenotypeCache::new(3, 4);
        let mut last = None;
        {
            let p = cache.reset(1);
            p.begin_trial();
            p.credit(3, LogicTask::Equ, &mut last);
            p.end_trial();
        }
        assert_eq!(cache.score(1), 1.0);
        assert_eq!(cache.scores(), vec![0.0, 1.0, 0.0]);

        let p = cache.reset(1);
        assert_eq!(p.score, 0.0);
        assert_eq!(p.task_total, 0);
        assert_eq!(p.indiv_task_count(3, LogicTask::Equ), 0);
        assert_eq!(p.trials(), 0);
        assert_eq!(*p, Phenotype::new(4));
    }
}
