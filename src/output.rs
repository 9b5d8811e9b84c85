//! Output — population snapshots and the fitness log
//!
//! Snapshots are written as one JSON file per snapshot generation, each
//! listed in a manifest with its SHA256 checksum so it can be verified when
//! read back. The fitness log is JSON lines, one record per logged generation.

use crate::experiment::GenerationSummary;
use crate::selection::Agent;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";
const FITNESS_FILE: &str = "fitness.jsonl";

/// One genome as it appears in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: usize,
    /// SHA256 of the program text
    pub fingerprint: String,
    pub function_count: usize,
    pub instruction_count: usize,
    pub program: String,
}

impl AgentRecord {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            fingerprint: agent.genome.fingerprint(),
            function_count: agent.genome.function_count(),
            instruction_count: agent.genome.instruction_count(),
            program: agent.genome.to_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub run_id: String,
    pub generation: usize,
    pub agents: Vec<AgentRecord>,
}

/// Metadata for one written snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub generation: usize,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    pub size_bytes: u64,
    pub agent_count: usize,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub run_id: String,
    pub snapshots: Vec<SnapshotMeta>,
}

/// Writes population snapshots into a data directory
pub struct SnapshotWriter {
    dir: PathBuf,
    manifest: SnapshotManifest,
}

impl SnapshotWriter {
    /// Start a fresh manifest for a new run in `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            manifest: SnapshotManifest {
                run_id: uuid::Uuid::new_v4().to_string(),
                snapshots: Vec::new(),
            },
        }
    }

    pub fn run_id(&self) -> &str {
        &self.manifest.run_id
    }

    pub fn snapshots(&self) -> &[SnapshotMeta] {
        &self.manifest.snapshots
    }

    fn save_manifest(&self) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(&self.manifest)?;
        std::fs::write(self.dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Write the population of `generation` and record it in the manifest
    pub fn write(
        &mut self,
        generation: usize,
        population: &[Agent],
    ) -> Result<SnapshotMeta, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&self.dir)?;

        let snapshot = PopulationSnapshot {
            run_id: self.manifest.run_id.clone(),
            generation,
            agents: population.iter().map(AgentRecord::from_agent).collect(),
        };
        let data = serde_json::to_string_pretty(&snapshot)?;
        let filename = format!("pop_{:06}.json", generation);
        std::fs::write(self.dir.join(&filename), &data)?;

        let meta = SnapshotMeta {
            generation,
            timestamp: Utc::now(),
            checksum: hex::encode(Sha256::digest(data.as_bytes())),
            size_bytes: data.len() as u64,
            agent_count: population.len(),
            filename,
        };
        self.manifest.snapshots.push(meta.clone());
        self.save_manifest()?;

        info!(
            "Wrote population snapshot for generation {} ({} agents, {} bytes)",
            generation,
            population.len(),
            data.len()
        );
        Ok(meta)
    }

    /// Read back the snapshot of `generation`, verifying its checksum
    pub fn load(&self, generation: usize) -> Result<PopulationSnapshot, Box<dyn std::error::Error>> {
        let meta = self
            .manifest
            .snapshots
            .iter()
            .find(|s| s.generation == generation)
            .ok_or_else(|| format!("No snapshot for generation {}", generation))?;

        let data = std::fs::read_to_string(self.dir.join(&meta.filename))?;
        let checksum = hex::encode(Sha256::digest(data.as_bytes()));
        if checksum != meta.checksum {
            return Err(format!(
                "Checksum mismatch for generation {}: expected {}, got {}",
                generation, meta.checksum, checksum
            )
            .into());
        }
        Ok(serde_json::from_str(&data)?)
    }
}

/// One line of the fitness log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: GenerationSummary,
}

/// Appends a record every `interval` generations
pub struct FitnessLog {
    path: PathBuf,
    interval: usize,
}

impl FitnessLog {
    /// Create (or truncate) `fitness.jsonl` in `dir`
    pub fn create(dir: impl AsRef<Path>, interval: usize) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(FITNESS_FILE);
        std::fs::write(&path, "")?;
        Ok(Self { path, interval: interval.max(1) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `summary` if its generation is on the interval.
    /// Returns whether a record was written.
    pub fn record(&mut self, summary: &GenerationSummary) -> Result<bool, Box<dyn std::error::Error>> {
        if summary.generation % self.interval != 0 {
            return Ok(false);
        }
        let record = FitnessRecord {
            timestamp: Utc::now(),
            summary: summary.clone(),
        };
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        Ok(true)
    }

    pub fn read_all(&self) -> Result<Vec<FitnessRecord>, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;

    fn test_dir() -> PathBuf {
        std::env::temp_dir().join(format!("dol-output-test-{}", uuid::Uuid::new_v4()))
    }

    fn population() -> Vec<Agent> {
        let a = Genome::parse("Fn-0000000000000000:\n  Nop()\n").unwrap();
        let b = Genome::parse("Fn-1111000011110000:\n  Inc(1)\n  Submit(1)\n").unwrap();
        vec![Agent::new(0, a), Agent::new(1, b)]
    }

    fn summary(generation: usize) -> GenerationSummary {
        GenerationSummary {
            generation,
            best_score: 2.0,
            mean_score: 1.5,
            dominant_id: 1,
            dominant_task_counts: vec![0; crate::oracle::TASK_CNT],
            dominant_instruction_count: 2,
        }
    }

    #[test]
    fn test_snapshot_write_and_load() {
        let dir = test_dir();
        let mut writer = SnapshotWriter::new(&dir);
        let pop = population();
        let meta = writer.write(4, &pop).unwrap();
        assert_eq!(meta.agent_count, 2);
        assert_eq!(meta.filename, "pop_000004.json");

        let snapshot = writer.load(4).unwrap();
        assert_eq!(snapshot.run_id, writer.run_id());
        assert_eq!(snapshot.agents[1].fingerprint, pop[1].genome.fingerprint());
        assert_eq!(Genome::parse(&snapshot.agents[1].program).unwrap(), pop[1].genome);
        assert!(dir.join(MANIFEST_FILE).exists());
        assert!(writer.load(5).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_snapshot_detects_tampering() {
        let dir = test_dir();
        let mut writer = SnapshotWriter::new(&dir);
        let meta = writer.write(0, &population()).unwrap();
        std::fs::write(dir.join(&meta.filename), "{}").unwrap();
        let err = writer.load(0).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_fitness_log_respects_interval() {
        let dir = test_dir();
        let mut log = FitnessLog::create(&dir, 5).unwrap();
        let written: Vec<bool> = (0..11).map(|g| log.record(&summary(g)).unwrap()).collect();
        assert_eq!(written.iter().filter(|&&w| w).count(), 3);

        let records = log.read_all().unwrap();
        let generations: Vec<usize> = records.iter().map(|r| r.summary.generation).collect();
        assert_eq!(generations, vec![0, 5, 10]);
        assert_eq!(records[0].summary, summary(0));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
