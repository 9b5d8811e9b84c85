//! Experiment — the evaluation orchestrator and the generation loop
//!
//! One deme is shared by every agent. Per agent: load its genome onto the
//! deme, then for each trial reload the oracle, reset the deme, activate the
//! propagule, advance for `eval_time` steps and record the phenotype.
//! Evaluation is strictly sequential and every random draw comes from the
//! experiment's single seeded stream, so a run is reproducible from its seed.

mod environment;

use crate::config::{ConfigError, ExperimentConfig, RunMode};
use crate::deme::Deme;
use crate::genome::{Genome, ProgramParseError, ShapeViolation, Tag};
use crate::hardware::{Memory, ReferenceHardware, VirtualHardware};
use crate::mutation::{MutationReport, Mutator};
use crate::oracle::{TaskOracle, TaskValue};
use crate::phenotype::{Phenotype, PhenotypeCache};
use crate::selection::{self, Agent};
use environment::CellEnv;
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load ancestor: {0}")]
    Ancestor(#[from] ProgramParseError),

    #[error("ancestor {path} violates program bounds: {source}")]
    AncestorShape {
        path: String,
        #[source]
        source: ShapeViolation,
    },

    #[error("run mode is {0}, which this operation does not support")]
    WrongMode(RunMode),
}

/// What happened in one generation, handed to every generation hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub best_score: f64,
    pub mean_score: f64,
    pub dominant_id: usize,
    /// Per-task completion counts of the dominant agent
    pub dominant_task_counts: Vec<usize>,
    pub dominant_instruction_count: usize,
}

pub type GenerationHook = Box<dyn FnMut(&GenerationSummary)>;
pub type SnapshotHook = Box<dyn FnMut(usize, &[Agent])>;

/// Drives a population through evaluation and turnover on a deme of `H`
pub struct Experiment<H: VirtualHardware = ReferenceHardware> {
    config: ExperimentConfig,
    rng: ChaCha8Rng,
    deme: Deme<H>,
    oracle: TaskOracle,
    phen_cache: PhenotypeCache,
    population: Vec<Agent>,
    mutator: Mutator,
    ancestor: Genome,
    trial_inputs: Vec<[TaskValue; 2]>,
    load_id: usize,
    generation: usize,
    dominant_id: usize,
    generation_hooks: Vec<GenerationHook>,
    snapshot_hooks: Vec<SnapshotHook>,
}

impl Experiment {
    /// Validate `config` and load the ancestor from `config.ancestor_path`
    pub fn new(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        config.validate()?;
        let ancestor = Genome::load(&config.ancestor_path)?;
        info!("Loaded ancestor {}: {}", config.ancestor_path, ancestor.summary());
        Self::with_ancestor(config, ancestor)
    }

    /// Set up a run around an already loaded ancestor on reference hardware
    pub fn with_ancestor(config: ExperimentConfig, ancestor: Genome) -> Result<Self, ExperimentError> {
        let limits = config.limits();
        Self::with_hardware(config, ancestor, move || ReferenceHardware::new(limits))
    }
}

impl<H: VirtualHardware + 'static> Experiment<H> {
    /// Set up a run whose deme cells are built by `make_hardware`
    pub fn with_hardware(
        config: ExperimentConfig,
        ancestor: Genome,
        make_hardware: impl FnMut() -> H,
    ) -> Result<Self, ExperimentError> {
        config.validate()?;
        let bounds = config.bounds();
        ancestor
            .check_shape(&bounds)
            .map_err(|source| ExperimentError::AncestorShape {
                path: config.ancestor_path.clone(),
                source,
            })?;

        let mut deme = Deme::new(config.deme_width, config.deme_height, make_hardware);
        // Every propagule cell starts one context on the best match for the zero tag.
        deme.on_propagule_activation(|hw: &mut H| {
            hw.spawn_context(Tag::zero(), 0.0, Memory::new());
        });

        let population = (0..config.pop_size)
            .map(|id| Agent::new(id, ancestor.clone()))
            .collect();

        info!(
            "Experiment setup: mode={}, seed={}, population={}, deme={}x{}, propagule={} ({})",
            config.run_mode,
            config.seed,
            config.pop_size,
            config.deme_width,
            config.deme_height,
            config.propagule_size,
            if config.propagule_clumpy { "clumpy" } else { "scattered" },
        );

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            phen_cache: PhenotypeCache::new(config.pop_size, config.deme_size()),
            mutator: Mutator::new(config.rates(), bounds),
            oracle: TaskOracle::new(),
            trial_inputs: Vec::with_capacity(config.trial_cnt),
            load_id: 0,
            generation: 0,
            dominant_id: 0,
            generation_hooks: Vec::new(),
            snapshot_hooks: Vec::new(),
            deme,
            population,
            ancestor,
            config,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    pub fn ancestor(&self) -> &Genome {
        &self.ancestor
    }

    pub fn deme(&self) -> &Deme<H> {
        &self.deme
    }

    pub fn phenotype(&self, id: usize) -> &Phenotype {
        self.phen_cache.get(id)
    }

    /// Current score of agent `id`
    pub fn fitness(&self, id: usize) -> f64 {
        self.phen_cache.score(id)
    }

    /// Best-scoring agent of the last evaluated generation
    pub fn dominant_id(&self) -> usize {
        self.dominant_id
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Register a hook fired after each generation is evaluated
    pub fn on_generation(&mut self, hook: impl FnMut(&GenerationSummary) + 'static) {
        self.generation_hooks.push(Box::new(hook));
    }

    /// Register a hook fired every `pop_snapshot_interval` generations
    pub fn on_snapshot(&mut self, hook: impl FnMut(usize, &[Agent]) + 'static) {
        self.snapshot_hooks.push(Box::new(hook));
    }

    /// Draw this generation's trial input pairs
    pub fn begin_generation(&mut self) {
        self.trial_inputs.clear();
        for _ in 0..self.config.trial_cnt {
            self.trial_inputs.push(TaskOracle::random_inputs(&mut self.rng));
        }
    }

    /// Evaluate agent `id` on every trial of the current generation
    pub fn evaluate_agent(&mut self, id: usize) {
        self.phen_cache.reset(id);
        self.deme.load_program(&self.population[id].genome);
        for trial in 0..self.trial_inputs.len() {
            let [a, b] = self.trial_inputs[trial];
            self.oracle.load_inputs(a, b);
            self.deme.reset();
            self.begin_agent_evaluation(id);
            for _ in 0..self.config.eval_time {
                self.advance(id);
            }
            self.record_phenotype(id);
        }
    }

    fn begin_agent_evaluation(&mut self, id: usize) {
        self.load_id = 0;
        self.phen_cache.get_mut(id).begin_trial();
        self.deme.activate_propagule(
            self.config.propagule_size,
            self.config.propagule_clumpy,
            &mut self.rng,
        );
    }

    /// Step every active cell once
    fn advance(&mut self, id: usize) {
        let oracle = &self.oracle;
        let phenotype = self.phen_cache.get_mut(id);
        let load_id = &mut self.load_id;
        self.deme.single_advance(|cell| {
            let mut env = CellEnv {
                oracle,
                phenotype: &mut *phenotype,
                cell: cell.deme_id(),
                last_task: &mut cell.last_task,
                load_id: &mut *load_id,
            };
            cell.hardware.single_process(&mut env);
        });
    }

    fn record_phenotype(&mut self, id: usize) {
        let phenotype = self.phen_cache.get_mut(id);
        phenotype.end_trial();
        debug!(
            "agent {} trial {}: {} submissions credited, score {:.3}",
            id,
            phenotype.trials(),
            phenotype.task_total,
            phenotype.score
        );
    }

    /// Evaluate every agent; returns the generation's summary
    pub fn evaluate_population(&mut self) -> GenerationSummary {
        let mut best_score = f64::NEG_INFINITY;
        let mut dominant_id = 0;
        for id in 0..self.population.len() {
            self.evaluate_agent(id);
            let score = self.fitness(id);
            if score > best_score {
                best_score = score;
                dominant_id = id;
            }
        }
        self.dominant_id = dominant_id;

        let scores = self.phen_cache.scores();
        let dominant = self.phen_cache.get(dominant_id);
        GenerationSummary {
            generation: self.generation,
            best_score,
            mean_score: scores.iter().sum::<f64>() / scores.len() as f64,
            dominant_id,
            dominant_task_counts: dominant.deme_task_counts.clone(),
            dominant_instruction_count: self.population[dominant_id].genome.instruction_count(),
        }
    }

    /// Replace the population with the selected and mutated next generation
    pub fn turnover(&mut self) -> MutationReport {
        let scores = self.phen_cache.scores();
        let (next, report) = selection::next_generation(
            &self.population,
            &scores,
            self.config.elite_cnt,
            self.config.tournament_size,
            &self.mutator,
            &mut self.rng,
        );
        self.population = next;
        report
    }

    /// Evaluate, report and turn over one generation
    pub fn run_generation(&mut self) -> GenerationSummary {
        self.begin_generation();
        let summary = self.evaluate_population();
        info!(
            "Generation {}: best={:.3} mean={:.3} dominant={} ({} instructions)",
            summary.generation,
            summary.best_score,
            summary.mean_score,
            summary.dominant_id,
            summary.dominant_instruction_count
        );
        for hook in self.generation_hooks.iter_mut() {
            hook(&summary);
        }
        if self.generation % self.config.pop_snapshot_interval == 0 {
            for hook in self.snapshot_hooks.iter_mut() {
                hook(self.generation, &self.population);
            }
        }
        let report = self.turnover();
        debug!("Generation {} turnover applied {} mutations", self.generation, report.total());
        self.generation += 1;
        summary
    }

    /// Run generations 0..=generations in experiment mode
    pub fn run(&mut self) -> Result<Vec<GenerationSummary>, ExperimentError> {
        if self.config.run_mode != RunMode::Experiment {
            return Err(ExperimentError::WrongMode(self.config.run_mode));
        }
        let mut summaries = Vec::with_capacity(self.config.generations + 1);
        while self.generation <= self.config.generations {
            summaries.push(self.run_generation());
        }
        info!("Run complete after {} generations", summaries.len());
        Ok(summaries)
    }

    /// Evaluate the ancestor alone and return its phenotype
    pub fn run_analysis(&mut self) -> Phenotype {
        self.population[0].genome.clone_from(&self.ancestor);
        self.begin_generation();
        self.evaluate_agent(0);
        let phenotype = self.phen_cache.get(0).clone();
        info!(
            "Ancestor analysis: score={:.3}, {} tasks credited, {} distinct",
            phenotype.score,
            phenotype.task_total,
            phenotype.distinct_tasks()
        );
        phenotype
    }
}
