//! Batch scenario runner.
//!
//! Runs one scenario under many seeds in parallel using rayon and collects
//! per-run summaries. Useful for spotting seeds where the AI stalls or
//! behaves very differently from the rest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use rts_ai::config::AiConfig;
use rts_ai::rules::RulesTable;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::{run_scenario, RunSummary};
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of runs
    pub run_count: u32,
    /// First seed; run `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Ticks per run
    pub ticks: u64,
    /// Maximum parallel runs (0 = use rayon default)
    pub parallel_runs: u32,
    /// Where to write the JSON results, if anywhere
    pub output: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            run_count: 16,
            seed_start: 0,
            ticks: 3600,
            parallel_runs: 0,
            output: None,
        }
    }
}

impl BatchConfig {
    /// Config for `run_count` runs of `ticks` ticks.
    #[must_use]
    pub fn new(run_count: u32, ticks: u64) -> Self {
        Self {
            run_count,
            ticks,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set output file
    #[must_use]
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }
}

/// Aggregate over all runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs completed.
    pub runs: u32,
    /// Mean commands per run.
    pub mean_commands: f64,
    /// How often each final strategy occurred, per faction.
    pub final_strategies: BTreeMap<u8, BTreeMap<String, u32>>,
    /// Number of distinct command-stream hashes.
    pub distinct_hashes: usize,
}

impl BatchSummary {
    /// Summarize `runs`.
    #[must_use]
    pub fn from_runs(runs: &[RunSummary]) -> Self {
        let mut final_strategies: BTreeMap<u8, BTreeMap<String, u32>> = BTreeMap::new();
        for run in runs {
            for (faction, summary) in &run.factions {
                *final_strategies
                    .entry(*faction)
                    .or_default()
                    .entry(summary.final_strategy.name().to_string())
                    .or_insert(0) += 1;
            }
        }
        let hashes: std::collections::BTreeSet<u64> = runs.iter().map(|r| r.hash).collect();
        let total: u64 = runs.iter().map(|r| r.total_commands).sum();
        Self {
            runs: u32::try_from(runs.len()).unwrap_or(u32::MAX),
            mean_commands: total as f64 / runs.len().max(1) as f64,
            final_strategies,
            distinct_hashes: hashes.len(),
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name
    pub scenario: String,
    /// Configuration used
    pub config: BatchConfig,
    /// Individual runs, in seed order
    pub runs: Vec<RunSummary>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run a batch of seeds over one scenario.
#[must_use]
pub fn run_batch(scenario: &Scenario, ai_config: &AiConfig, rules: &RulesTable, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} runs of '{}' ({} ticks each)",
        config.run_count, scenario.name, config.ticks
    );

    let run_all = || -> Vec<RunSummary> {
        (0..config.run_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let summary = run_scenario(scenario, ai_config.clone(), rules.clone(), seed, config.ticks);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 10 == 0 {
                    debug!("Progress: {}/{}", done, config.run_count);
                }
                summary
            })
            .collect()
    };

    // A local pool keeps the thread cap scoped to this batch.
    let runs = if config.parallel_runs > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!("Failed to build thread pool: {}, using global pool", e);
                run_all()
            }
        }
    } else {
        run_all()
    };

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} runs in {:.1}s, {} distinct command streams",
        runs.len(),
        duration_seconds,
        summary.distinct_hashes
    );

    BatchResults {
        scenario: scenario.name.clone(),
        config,
        runs,
        summary,
        duration_seconds,
    }
}

/// Run the same seed `runs` times and check every run agrees.
#[must_use]
pub fn verify_determinism(scenario: &Scenario, ai_config: &AiConfig, rules: &RulesTable, seed: u64, ticks: u64, runs: u32) -> bool {
    let summaries: Vec<RunSummary> = (0..runs)
        .into_par_iter()
        .map(|_| run_scenario(scenario, ai_config.clone(), rules.clone(), seed, ticks))
        .collect();

    let Some(first) = summaries.first() else {
        return true;
    };
    let consistent = summaries.iter().all(|s| s == first);
    if !consistent {
        for (i, s) in summaries.iter().enumerate() {
            warn!(run = i, hash = s.hash, commands = s.total_commands, "Run diverged");
        }
    }
    consistent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_runs_every_seed_in_order() {
        let config = BatchConfig::new(4, 120).with_seed(10);
        let results = run_batch(&Scenario::raid(), &AiConfig::default(), &RulesTable::standard(), config);
        let seeds: Vec<u64> = results.runs.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12, 13]);
        assert_eq!(results.summary.runs, 4);
        assert!(results.summary.distinct_hashes >= 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let scenario = Scenario::skirmish_1v1();
        let ai = AiConfig::default();
        let rules = RulesTable::standard();
        let mut config = BatchConfig::new(3, 150).with_seed(5);
        config.parallel_runs = 2;
        let results = run_batch(&scenario, &ai, &rules, config);
        for run in &results.runs {
            let again = run_scenario(&scenario, ai.clone(), rules.clone(), run.seed, 150);
            assert_eq!(&again, run);
        }
    }

    #[test]
    fn test_verify_determinism_passes() {
        assert!(verify_determinism(
            &Scenario::raid(),
            &AiConfig::default(),
            &RulesTable::standard(),
            3,
            200,
            3
        ));
    }

    #[test]
    fn test_results_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        let results = run_batch(
            &Scenario::skirmish_1v1(),
            &AiConfig::default(),
            &RulesTable::standard(),
            BatchConfig::new(2, 30),
        );
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.runs, results.runs);
        assert_eq!(loaded.summary.final_strategies, results.summary.final_strategies);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = BatchSummary::from_runs(&[]);
        assert_eq!(summary.runs, 0);
        assert!(summary.mean_commands.abs() < f64::EPSILON);
    }
}
