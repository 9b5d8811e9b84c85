//! Task oracle — the nine two-input Boolean logic tasks
//!
//! For a fixed input pair `(a, b)` each task has one or two accepted
//! solutions. Order-sensitive tasks (NOT, ORN, ANDN) accept both operand
//! orders; the rest accept exactly one value. Inputs stay fixed until
//! explicitly reloaded.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value type flowing between hardware and oracle
pub type TaskValue = u32;

/// Smallest task input (inclusive)
pub const MIN_TASK_INPUT: TaskValue = 1;
/// Upper bound on task inputs (exclusive)
pub const MAX_TASK_INPUT: TaskValue = 1_000_000_000;

pub const TASK_CNT: usize = 9;

/// The logic tasks, in crediting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicTask {
    Nand,
    Not,
    Orn,
    And,
    Or,
    Andn,
    Nor,
    Xor,
    Equ,
}

impl LogicTask {
    pub const ALL: [LogicTask; TASK_CNT] = [
        LogicTask::Nand,
        LogicTask::Not,
        LogicTask::Orn,
        LogicTask::And,
        LogicTask::Or,
        LogicTask::Andn,
        LogicTask::Nor,
        LogicTask::Xor,
        LogicTask::Equ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            LogicTask::Nand => "NAND",
            LogicTask::Not => "NOT",
            LogicTask::Orn => "ORN",
            LogicTask::And => "AND",
            LogicTask::Or => "OR",
            LogicTask::Andn => "ANDN",
            LogicTask::Nor => "NOR",
            LogicTask::Xor => "XOR",
            LogicTask::Equ => "EQU",
        }
    }

    /// Accepted solutions for inputs `a`, `b`
    pub fn solutions(self, a: TaskValue, b: TaskValue) -> Vec<TaskValue> {
        match self {
            LogicTask::Nand => vec![!(a & b)],
            LogicTask::Not => vec![!a, !b],
            LogicTask::Orn => vec![a | !b, b | !a],
            LogicTask::And => vec![a & b],
            LogicTask::Or => vec![a | b],
            LogicTask::Andn => vec![a & !b, b & !a],
            LogicTask::Nor => vec![!(a | b)],
            LogicTask::Xor => vec![a ^ b],
            LogicTask::Equ => vec![!(a ^ b)],
        }
    }
}

impl fmt::Display for LogicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The task table with its currently loaded inputs and precomputed solutions
#[derive(Debug, Clone)]
pub struct TaskOracle {
    inputs: [TaskValue; 2],
    solutions: Vec<Vec<TaskValue>>,
}

impl Default for TaskOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskOracle {
    /// Oracle with both inputs zeroed
    pub fn new() -> Self {
        let mut oracle = Self {
            inputs: [0, 0],
            solutions: Vec::with_capacity(TASK_CNT),
        };
        oracle.load_inputs(0, 0);
        oracle
    }

    /// Load a new input pair and recompute every task's solutions
    pub fn load_inputs(&mut self, a: TaskValue, b: TaskValue) {
        self.inputs = [a, b];
        self.solutions = LogicTask::ALL.iter().map(|t| t.solutions(a, b)).collect();
    }

    /// Draw an input pair from [MIN_TASK_INPUT, MAX_TASK_INPUT)
    pub fn random_inputs<R: Rng + ?Sized>(rng: &mut R) -> [TaskValue; 2] {
        [
            rng.gen_range(MIN_TASK_INPUT..MAX_TASK_INPUT),
            rng.gen_range(MIN_TASK_INPUT..MAX_TASK_INPUT),
        ]
    }

    pub fn inputs(&self) -> [TaskValue; 2] {
        self.inputs
    }

    pub fn input(&self, slot: usize) -> TaskValue {
        self.inputs[slot % self.inputs.len()]
    }

    /// True iff `candidate` equals any accepted solution of `task`
    pub fn check_task(&self, task: LogicTask, candidate: TaskValue) -> bool {
        self.solutions[task.index()].contains(&candidate)
    }

    /// First task, in enumeration order, that `candidate` satisfies
    pub fn first_match(&self, candidate: TaskValue) -> Option<LogicTask> {
        LogicTask::ALL
            .iter()
            .copied()
            .find(|&task| self.check_task(task, candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn oracle_5_3() -> TaskOracle {
        let mut oracle = TaskOracle::new();
        oracle.load_inputs(5, 3);
        oracle
    }

    #[test]
    fn test_concrete_values_for_5_and_3() {
        let o = oracle_5_3();
        assert!(o.check_task(LogicTask::And, 1));
        assert!(o.check_task(LogicTask::Or, 7));
        assert!(o.check_task(LogicTask::Xor, 6));
        assert!(o.check_task(LogicTask::Nand, !1u32));
        assert!(o.check_task(LogicTask::Equ, !6u32));
        assert!(o.check_task(LogicTask::Not, !5u32));
        assert!(o.check_task(LogicTask::Not, !3u32));
        assert!(o.check_task(LogicTask::Orn, 5 | !3u32));
        assert!(o.check_task(LogicTask::Orn, 3 | !5u32));
        assert!(o.check_task(LogicTask::Andn, 5 & !3u32));
        assert!(o.check_task(LogicTask::Andn, 3 & !5u32));
        assert!(o.check_task(LogicTask::Nor, !7u32));

        assert!(!o.check_task(LogicTask::And, 7));
        assert!(!o.check_task(LogicTask::Xor, 1));
    }

    #[test]
    fn test_solution_counts() {
        for task in LogicTask::ALL {
            let expected = match task {
                LogicTask::Not | LogicTask::Orn | LogicTask::Andn => 2,
                _ => 1,
            };
            assert_eq!(task.solutions(12, 10).len(), expected, "{}", task);
        }
    }

    #[test]
    fn test_check_is_pure() {
        let o = oracle_5_3();
        for candidate in [0u32, 1, 6, 7, !1, u32::MAX] {
            let first: Vec<bool> = LogicTask::ALL.iter().map(|&t| o.check_task(t, candidate)).collect();
            let second: Vec<bool> = LogicTask::ALL.iter().map(|&t| o.check_task(t, candidate)).collect();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_first_match_credits_earliest_task() {
        let mut o = TaskOracle::new();
        // With a == b several tasks share a solution.
        o.load_inputs(6, 6);
        assert!(o.check_task(LogicTask::Or, 6));
        assert_eq!(o.first_match(6), Some(LogicTask::And));
        assert!(o.check_task(LogicTask::Not, !6u32));
        assert_eq!(o.first_match(!6u32), Some(LogicTask::Nand));
        assert!(o.check_task(LogicTask::Equ, u32::MAX));
        assert_eq!(o.first_match(u32::MAX), Some(LogicTask::Orn));
        assert_eq!(oracle_5_3().first_match(12345), None);
    }

    #[test]
    fn test_reload_changes_solutions() {
        let mut o = oracle_5_3();
        assert!(o.check_task(LogicTask::And, 1));
        o.load_inputs(12, 10);
        assert!(!o.check_task(LogicTask::And, 1));
        assert!(o.check_task(LogicTask::And, 8));
        assert_eq!(o.inputs(), [12, 10]);
    }

    #[test]
    fn test_random_inputs_in_domain() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..1000 {
            for v in TaskOracle::random_inputs(&mut rng) {
                assert!(v >= MIN_TASK_INPUT && v < MAX_TASK_INPUT);
            }
        }
    }
}
