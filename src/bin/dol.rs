//! DOL CLI — run and inspect division-of-labor experiments
//!
//! Commands:
//!   dol run      — evolve a population from a config file
//!   dol analyze  — evaluate the ancestor once and report its phenotype
//!   dol config   — print the default configuration
//!   dol mutate   — apply the mutation operator to an ancestor repeatedly
//!   dol help     — show usage

use dol_core::output::{FitnessLog, SnapshotWriter};
use dol_core::{
    Experiment, ExperimentConfig, Genome, LogicTask, MutationReport, Mutator, RunMode,
};
use log::{error, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::env;
use std::process;

fn print_usage() {
    println!(
        r#"
DOL — Division of Labor

Usage: dol <command> [options]

Commands:
  run      <config.json>                  Run in the config's run_mode
  analyze  <config.json>                  Evaluate the ancestor alone
  config                                  Print the default config as JSON
  mutate   <ancestor> [seed] [rounds]     Mutate an ancestor and report event counts
  help                                    Show this message

Examples:
  dol config > my-config.json
  dol run my-config.json
  dol analyze my-config.json
  dol mutate data/ancestor.gp 7 100
"#
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "run" => cmd_run(&args[2..], None),
        "analyze" => cmd_run(&args[2..], Some(RunMode::Analysis)),
        "config" => cmd_config(),
        "mutate" => cmd_mutate(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("  Error: {}", e);
        process::exit(1);
    }
}

fn load_config(args: &[String]) -> Result<ExperimentConfig, Box<dyn std::error::Error>> {
    let path = args.first().ok_or("missing <config.json> argument")?;
    Ok(ExperimentConfig::load(path)?)
}

/// Run in the config's mode, or in `force` when given
fn cmd_run(args: &[String], force: Option<RunMode>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args)?;
    if let Some(mode) = force {
        config.run_mode = mode;
    }
    let mode = config.run_mode;
    let data_dir = config.data_dir.clone();
    let fitness_interval = config.fitness_interval;
    let mut experiment = Experiment::new(config)?;

    match mode {
        RunMode::Experiment => {
            let mut fitness_log = FitnessLog::create(&data_dir, fitness_interval)?;
            experiment.on_generation(move |summary| {
                if let Err(e) = fitness_log.record(summary) {
                    error!("Failed to write fitness record: {}", e);
                }
            });
            let mut snapshots = SnapshotWriter::new(&data_dir);
            info!("Run id {}, writing to {}", snapshots.run_id(), data_dir);
            experiment.on_snapshot(move |generation, population| {
                if let Err(e) = snapshots.write(generation, population) {
                    error!("Failed to write snapshot for generation {}: {}", generation, e);
                }
            });

            let summaries = experiment.run()?;
            if let Some(last) = summaries.last() {
                println!("\n  Final generation {}", last.generation);
                println!("  Best score:  {:.3}", last.best_score);
                println!("  Mean score:  {:.3}", last.mean_score);
                println!("  Dominant:    agent {}", last.dominant_id);
                print_task_counts(&last.dominant_task_counts);
            }
        }
        RunMode::Analysis => {
            let phenotype = experiment.run_analysis();
            println!("\n  Ancestor: {}", experiment.ancestor().summary());
            println!("  Score:           {:.3}", phenotype.score);
            println!("  Tasks credited:  {}", phenotype.task_total);
            println!("  Distinct tasks:  {}", phenotype.distinct_tasks());
            let switches: usize = phenotype.task_switches.iter().sum();
            println!("  Task switches:   {}", switches);
            print_task_counts(&phenotype.deme_task_counts);
        }
    }
    Ok(())
}

fn print_task_counts(counts: &[usize]) {
    println!("  {}", "-".repeat(40));
    for (task, count) in LogicTask::ALL.iter().zip(counts) {
        println!("  {:<6} {}", task.name(), count);
    }
}

fn cmd_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", ExperimentConfig::default().to_json()?);
    Ok(())
}

fn cmd_mutate(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let path = args
        .first()
        .ok_or("Usage: dol mutate <ancestor> [seed] [rounds]")?;
    let seed: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
    let rounds: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);

    let config = ExperimentConfig::default();
    let bounds = config.bounds();
    let mut genome = Genome::load(path)?;
    genome.check_shape(&bounds)?;
    println!("\n  Ancestor: {}", genome.summary());

    let mutator = Mutator::new(config.rates(), bounds);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut total = MutationReport::default();
    for round in 1..=rounds {
        let report = mutator.mutate(&mut genome, &mut rng);
        total.accumulate(&report);
        println!("  [{:>4}] {:>3} events  {}", round, report.total(), genome.summary());
    }

    println!("\n  Totals over {} rounds:", rounds);
    println!("    function duplications: {}", total.function_duplications);
    println!("    function deletions:    {}", total.function_deletions);
    println!("    tag bit flips:         {}", total.tag_bit_flips);
    println!("    slips:                 {}", total.slips);
    println!("    substitutions:         {}", total.substitutions);
    println!("    insertions:            {}", total.insertions);
    println!("    deletions:             {}", total.deletions);
    println!("\n{}", genome.to_text());
    Ok(())
}
