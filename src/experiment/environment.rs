//! CellEnv — the task environment one deme cell sees while it steps

use crate::hardware::TaskEnvironment;
use crate::oracle::{LogicTask, TaskOracle, TaskValue};
use crate::phenotype::Phenotype;

/// Binds a cell to the oracle and to the phenotype being recorded
pub(crate) struct CellEnv<'a> {
    pub oracle: &'a TaskOracle,
    pub phenotype: &'a mut Phenotype,
    pub cell: usize,
    pub last_task: &'a mut Option<LogicTask>,
    /// Rotating input position shared by every cell in the deme
    pub load_id: &'a mut usize,
}

impl TaskEnvironment for CellEnv<'_> {
    fn task_input(&self, slot: usize) -> TaskValue {
        self.oracle.input(slot)
    }

    fn next_task_input(&mut self) -> TaskValue {
        let value = self.oracle.input(*self.load_id);
        *self.load_id = (*self.load_id + 1) % 2;
        value
    }

    /// Only the first matching task is credited
    fn submit(&mut self, value: TaskValue) {
        if let Some(task) = self.oracle.first_match(value) {
            self.phenotype.credit(self.cell, task, self.last_task);
        }
    }
}
