//! Experiment orchestrator.
//!
//! Expands the varying parameter, executes every (value, run) pair as an
//! independent simulation and assembles the results in index order.

use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info};
use rayon::prelude::*;

use crate::config::Config;
use crate::config_loader::expand_experiment;
use crate::simulator::{RunOutcome, Simulator};
use crate::statistics::{ResultSet, RunRecord, StatisticsCatalog};

/// Seed of one run, derived from the experiment seed and the run's
/// position so that every run is reproducible on its own.
pub fn derive_seed(base: u64, value: usize, run: usize) -> u64 {
    // splitmix64 finaliser over the combined position.
    let mut z = base
        .wrapping_add((value as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((run as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Execute one run of `config`.
pub fn run_single(
    config: &Config,
    seed: u64,
    catalog: Arc<StatisticsCatalog>,
) -> Result<RunOutcome> {
    let simulator = Simulator::new(config, seed, catalog).wrap_err("Failed to set up run")?;
    simulator.run().wrap_err("Run aborted")
}

/// Execute every run of the experiment and collect the result set.
pub fn run_experiment(config: &Config) -> Result<ResultSet> {
    let started = Instant::now();
    let catalog = Arc::new(
        StatisticsCatalog::from_settings(&config.statistics)
            .map_err(|e| eyre!("Invalid statistics configuration: {}", e))?,
    );
    let variants = expand_experiment(config)?;
    let runs = config.general.runs as usize;

    info!(
        "Running experiment: {} value(s) x {} run(s)",
        variants.len(),
        runs
    );

    let jobs: Vec<(usize, usize)> = (0..variants.len())
        .flat_map(|value| (0..runs).map(move |run| (value, run)))
        .collect();

    let records: Vec<(usize, usize, RunRecord)> = jobs
        .par_iter()
        .map(|&(value, run)| -> Result<(usize, usize, RunRecord)> {
            let (label, variant) = &variants[value];
            let seed = derive_seed(config.general.seed, value, run);
            debug!("Starting value {} run {} (seed {})", label, run, seed);
            let outcome = run_single(variant, seed, catalog.clone())
                .wrap_err_with(|| format!("Value {} run {} failed", label, run))?;
            info!(
                "Finished value {} run {}: {:?} simulated, {:?}",
                label, run, outcome.record.simulated_duration, outcome.end_reason
            );
            Ok((value, run, outcome.record))
        })
        .collect::<Result<_>>()?;

    let mut results = ResultSet::new(
        config.experiment.varying.as_ref().map(|v| v.key.clone()),
        variants.into_iter().map(|(label, _)| label).collect(),
        runs,
        catalog,
    );
    for (value, run, record) in records {
        results.record_run(value, run, record)?;
    }

    info!("Experiment finished in {:.2?}", started.elapsed());
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_seed_separates_runs() {
        let seeds = [
            derive_seed(1, 0, 0),
            derive_seed(1, 0, 1),
            derive_seed(1, 1, 0),
            derive_seed(2, 0, 0),
        ];
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(derive_seed(1, 2, 3), derive_seed(1, 2, 3));
    }

    #[test]
    fn test_run_experiment_fills_every_slot() {
        let config: Config = serde_yaml::from_str(
            r#"
general:
  runs: 2
experiment:
  varying:
    key: topology.mixes
    values: [0, 2]
topology:
  clients: 2
  mixes: 1
traffic:
  interval: 10ms
  requests_per_client: 3
  request_size: 64
  replies:
    - size: 32
"#,
        )
        .unwrap();
        let results = run_experiment(&config).unwrap();
        assert!(results.is_complete());
        assert_eq!(results.varying_values(), &["0".to_string(), "2".to_string()]);
        assert_eq!(results.run(1, 1).map(|r| r.mixes), Some(2));
        assert_eq!(results.run(0, 0).map(|r| r.mixes), Some(0));
    }
}
