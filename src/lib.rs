//! DOL — Division of Labor
//!
//! Evolves populations of tag-based linear programs. Each agent's genome is
//! loaded onto every cell of a toroidal deme; a propagule of cells is
//! activated, and the deme is scored on the logic tasks its cells complete.

pub mod config;
pub mod deme;
pub mod experiment;
pub mod genome;
pub mod hardware;
pub mod mutation;
pub mod oracle;
pub mod output;
pub mod phenotype;
pub mod selection;

pub use config::{ConfigError, ExperimentConfig, RunMode};
pub use deme::{Cell, Deme, Direction};
pub use experiment::{Experiment, ExperimentError, GenerationSummary};
pub use genome::{Function, Genome, Instruction, Opcode, ProgramBounds, Tag};
pub use hardware::{HardwareLimits, ReferenceHardware, TaskEnvironment, VirtualHardware};
pub use mutation::{MutationRates, MutationReport, Mutator};
pub use oracle::{LogicTask, TaskOracle};
pub use phenotype::{Phenotype, PhenotypeCache};
pub use selection::Agent;
