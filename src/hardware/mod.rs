//! Virtual hardware — the execution capability each deme cell wraps
//!
//! The deme and the evaluation loop only talk to hardware through
//! [`VirtualHardware`]; hardware talks back to the experiment through
//! [`TaskEnvironment`] while it processes a step.
//!
//! - **VirtualHardware**: load a program, reset, spawn execution contexts,
//!   advance by one processing step
//! - **TaskEnvironment**: task inputs and the submission sink for one cell
//! - **ReferenceHardware**: a small deterministic machine implementing both

mod reference;

pub use reference::ReferenceHardware;

use crate::genome::{Genome, Tag};
use crate::oracle::TaskValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse memory bank: address -> value, unset addresses read as 0
pub type Memory = BTreeMap<i32, TaskValue>;

/// Limits applied to every hardware unit in a deme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareLimits {
    /// Maximum concurrently running execution contexts
    pub max_contexts: usize,
    /// Maximum call depth within one context
    pub max_call_depth: usize,
    /// Minimum tag similarity for a call or spawn to bind to a function
    pub min_bind_threshold: f64,
}

impl Default for HardwareLimits {
    fn default() -> Self {
        Self {
            max_contexts: 16,
            max_call_depth: 128,
            min_bind_threshold: 0.5,
        }
    }
}

/// What a cell's hardware may call back into during `single_process`
pub trait TaskEnvironment {
    /// Task input at `slot` (0 or 1)
    fn task_input(&self, slot: usize) -> TaskValue;

    /// Task input at the shared rotating load position, then advance it
    fn next_task_input(&mut self) -> TaskValue;

    /// Offer `value` as a candidate task solution
    fn submit(&mut self, value: TaskValue);
}

/// The execution capability consumed by the deme
pub trait VirtualHardware {
    /// Replace the program this unit executes
    fn load_program(&mut self, program: &Genome);

    /// Drop all execution contexts and memory; the program stays loaded
    fn reset(&mut self);

    /// Advance every running context by one instruction
    fn single_process(&mut self, env: &mut dyn TaskEnvironment);

    /// Start a new context bound to the function best matching `tag`.
    /// Returns false when nothing binds or no context slot is free.
    fn spawn_context(&mut self, tag: Tag, min_bind_threshold: f64, input: Memory) -> bool;

    fn active_contexts(&self) -> usize;
}
