//! Experiment configuration
//!
//! Loaded from a JSON file; any field left out takes its default value.
//! `validate()` runs before any simulation step, so a bad configuration is
//! rejected up front instead of surfacing mid-run.

use crate::genome::ProgramBounds;
use crate::hardware::HardwareLimits;
use crate::mutation::MutationRates;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Evolve a population from the ancestor
    Experiment,
    /// Evaluate the ancestor once and report its phenotype
    Analysis,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Experiment => f.write_str("experiment"),
            RunMode::Analysis => f.write_str("analysis"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub run_mode: RunMode,
    pub seed: u64,
    pub pop_size: usize,
    pub generations: usize,
    /// Deme steps per trial
    pub eval_time: usize,
    pub trial_cnt: usize,
    pub deme_width: usize,
    pub deme_height: usize,
    pub propagule_size: usize,
    pub propagule_clumpy: bool,
    pub ancestor_path: String,
    pub tournament_size: usize,
    pub elite_cnt: usize,

    pub min_func_cnt: usize,
    pub max_func_cnt: usize,
    pub min_func_len: usize,
    pub max_func_len: usize,
    pub max_total_len: usize,
    pub max_arg_val: i32,

    pub max_contexts: usize,
    pub max_call_depth: usize,
    pub min_bind_threshold: f64,

    pub per_bit_tag_flip: f64,
    pub per_inst_sub: f64,
    pub per_inst_ins: f64,
    pub per_inst_del: f64,
    pub per_func_slip: f64,
    pub per_func_dup: f64,
    pub per_func_del: f64,

    pub fitness_interval: usize,
    pub pop_snapshot_interval: usize,
    pub data_dir: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let bounds = ProgramBounds::default();
        let limits = HardwareLimits::default();
        let rates = MutationRates::default();
        Self {
            run_mode: RunMode::Experiment,
            seed: 1,
            pop_size: 100,
            generations: 100,
            eval_time: 200,
            trial_cnt: 3,
            deme_width: 5,
            deme_height: 5,
            propagule_size: 1,
            propagule_clumpy: true,
            ancestor_path: "data/ancestor.gp".to_string(),
            tournament_size: 4,
            elite_cnt: 1,

            min_func_cnt: bounds.min_func_cnt,
            max_func_cnt: bounds.max_func_cnt,
            min_func_len: bounds.min_func_len,
            max_func_len: bounds.max_func_len,
            max_total_len: bounds.max_total_len,
            max_arg_val: bounds.max_arg_val,

            max_contexts: limits.max_contexts,
            max_call_depth: limits.max_call_depth,
            min_bind_threshold: limits.min_bind_threshold,

            per_bit_tag_flip: rates.per_bit_tag_flip,
            per_inst_sub: rates.per_inst_sub,
            per_inst_ins: rates.per_inst_ins,
            per_inst_del: rates.per_inst_del,
            per_func_slip: rates.per_func_slip,
            per_func_dup: rates.per_func_dup,
            per_func_del: rates.per_func_del,

            fitness_interval: 10,
            pop_snapshot_interval: 50,
            data_dir: "output".to_string(),
        }
    }
}

impl ExperimentConfig {
    /// Read, parse and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn deme_size(&self) -> usize {
        self.deme_width * self.deme_height
    }

    pub fn bounds(&self) -> ProgramBounds {
        ProgramBounds {
            min_func_cnt: self.min_func_cnt,
            max_func_cnt: self.max_func_cnt,
            min_func_len: self.min_func_len,
            max_func_len: self.max_func_len,
            max_total_len: self.max_total_len,
            max_arg_val: self.max_arg_val,
        }
    }

    pub fn rates(&self) -> MutationRates {
        MutationRates {
            per_bit_tag_flip: self.per_bit_tag_flip,
            per_inst_sub: self.per_inst_sub,
            per_inst_ins: self.per_inst_ins,
            per_inst_del: self.per_inst_del,
            per_func_slip: self.per_func_slip,
            per_func_dup: self.per_func_dup,
            per_func_del: self.per_func_del,
        }
    }

    pub fn limits(&self) -> HardwareLimits {
        HardwareLimits {
            max_contexts: self.max_contexts,
            max_call_depth: self.max_call_depth,
            min_bind_threshold: self.min_bind_threshold,
        }
    }

    /// Reject configurations that would break a precondition of the run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_func_cnt == 0 || self.min_func_len == 0 {
            return Err(invalid("minimum function count and length must be at least 1"));
        }
        if self.min_func_cnt > self.max_func_cnt {
            return Err(invalid(format!(
                "min_func_cnt {} exceeds max_func_cnt {}",
                self.min_func_cnt, self.max_func_cnt
            )));
        }
        if self.min_func_len > self.max_func_len {
            return Err(invalid(format!(
                "min_func_len {} exceeds max_func_len {}",
                self.min_func_len, self.max_func_len
            )));
        }
        let smallest = self.min_func_cnt * self.min_func_len;
        if self.max_total_len < smallest {
            return Err(invalid(format!(
                "max_total_len {} is below the smallest legal genome ({} instructions)",
                self.max_total_len, smallest
            )));
        }
        if self.max_arg_val < 0 {
            return Err(invalid(format!("max_arg_val {} is negative", self.max_arg_val)));
        }

        for (name, rate) in self.rates().named() {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(format!("{} = {} is not a probability", name, rate)));
            }
        }

        if self.max_contexts == 0 || self.max_call_depth == 0 {
            return Err(invalid("max_contexts and max_call_depth must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_bind_threshold) {
            return Err(invalid(format!(
                "min_bind_threshold {} outside [0, 1]",
                self.min_bind_threshold
            )));
        }

        if self.deme_size() == 0 {
            return Err(invalid("deme must have at least one cell"));
        }
        if self.propagule_size == 0 || self.propagule_size > self.deme_size() {
            return Err(invalid(format!(
                "propagule_size {} must be in [1, {}]",
                self.propagule_size,
                self.deme_size()
            )));
        }

        if self.pop_size == 0 {
            return Err(invalid("pop_size must be at least 1"));
        }
        if self.elite_cnt > self.pop_size {
            return Err(invalid(format!(
                "elite_cnt {} exceeds pop_size {}",
                self.elite_cnt, self.pop_size
            )));
        }
        if self.tournament_size == 0 {
            return Err(invalid("tournament_size must be at least 1"));
        }
        if self.trial_cnt == 0 {
            return Err(invalid("trial_cnt must be at least 1"));
        }
        if self.fitness_interval == 0 || self.pop_snapshot_interval == 0 {
            return Err(invalid("output intervals must be at least 1"));
        }
        Ok(())
    }
}
