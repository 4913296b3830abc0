//! Results of a whole experiment, indexed by varying value and run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{Aggregator, RecordedValues, StatisticsCatalog, StatisticsError, StatisticsType};

/// Everything one finished run contributes to the result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub values: BTreeMap<StatisticsType, RecordedValues>,
    #[serde(with = "humantime_serde")]
    pub simulated_duration: Duration,
    pub clients: usize,
    pub mixes: usize,
    pub executed_events: u64,
}

/// One cross-run aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateResult {
    pub aggregator: Aggregator,
    pub value: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ResultSetError {
    #[error("no slot for value {value} run {run} (experiment has {values} values x {runs} runs)")]
    OutOfRange {
        value: usize,
        run: usize,
        values: usize,
        runs: usize,
    },
    #[error("value {value} run {run} has already been recorded")]
    AlreadyWritten { value: usize, run: usize },
    #[error(transparent)]
    Statistics(#[from] StatisticsError),
}

/// `[varying value][run] -> RunRecord`, each slot written exactly once.
#[derive(Debug, Clone)]
pub struct ResultSet {
    varying_key: Option<String>,
    varying_values: Vec<String>,
    runs: usize,
    catalog: Arc<StatisticsCatalog>,
    records: Vec<Vec<Option<RunRecord>>>,
}

impl ResultSet {
    /// An empty result set. `varying_values` are display labels; an
    /// experiment without a varying parameter has a single label.
    pub fn new(
        varying_key: Option<String>,
        varying_values: Vec<String>,
        runs: usize,
        catalog: Arc<StatisticsCatalog>,
    ) -> Self {
        let records = varying_values.iter().map(|_| vec![None; runs]).collect();
        Self {
            varying_key,
            varying_values,
            runs,
            catalog,
            records,
        }
    }

    pub fn varying_key(&self) -> Option<&str> {
        self.varying_key.as_deref()
    }

    pub fn varying_values(&self) -> &[String] {
        &self.varying_values
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn catalog(&self) -> &StatisticsCatalog {
        &self.catalog
    }

    pub fn record_run(
        &mut self,
        value: usize,
        run: usize,
        record: RunRecord,
    ) -> Result<(), ResultSetError> {
        let (values, runs) = (self.varying_values.len(), self.runs);
        let slot = self
            .records
            .get_mut(value)
            .and_then(|row| row.get_mut(run))
            .ok_or(ResultSetError::OutOfRange {
                value,
                run,
                values,
                runs,
            })?;
        if slot.is_some() {
            return Err(ResultSetError::AlreadyWritten { value, run });
        }
        *slot = Some(record);
        Ok(())
    }

    pub fn run(&self, value: usize, run: usize) -> Option<&RunRecord> {
        self.records.get(value)?.get(run)?.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.records.iter().flatten().all(Option::is_some)
    }

    /// Values of `ty` from every recorded run of `value`, merged: sequences
    /// are concatenated, trial counts summed.
    pub fn merged_values(
        &self,
        value: usize,
        ty: StatisticsType,
    ) -> Result<Option<RecordedValues>, ResultSetError> {
        let Some(descriptor) = self.catalog.descriptor(ty).filter(|d| d.activated) else {
            return Ok(None);
        };
        let Some(row) = self.records.get(value) else {
            return Err(ResultSetError::OutOfRange {
                value,
                run: 0,
                values: self.varying_values.len(),
                runs: self.runs,
            });
        };

        let mut merged = RecordedValues::empty(descriptor.collected_kind(ty));
        for record in row.iter().flatten() {
            if let Some(values) = record.values.get(&ty) {
                merged.merge(values)?;
            }
        }
        Ok(Some(merged))
    }

    /// Apply every cross-run aggregator of `ty` to the merged values of all
    /// runs of `value`. Values are pooled rather than reduced per run first,
    /// so multi-entity types aggregate over every entity of every run.
    pub fn results_for_all_runs(
        &self,
        value: usize,
        ty: StatisticsType,
    ) -> Result<Vec<AggregateResult>, ResultSetError> {
        let Some(merged) = self.merged_values(value, ty)? else {
            return Ok(Vec::new());
        };
        let Some(descriptor) = self.catalog.descriptor(ty) else {
            return Ok(Vec::new());
        };
        descriptor
            .run_aggregators
            .iter()
            .map(|&aggregator| {
                Ok(AggregateResult {
                    aggregator,
                    value: aggregator.apply(&merged)?,
                })
            })
            .collect()
    }

    /// Mean simulated duration over the recorded runs of `value`.
    pub fn mean_simulated_duration(&self, value: usize) -> Option<Duration> {
        let row = self.records.get(value)?;
        let recorded: Vec<&RunRecord> = row.iter().flatten().collect();
        if recorded.is_empty() {
            return None;
        }
        let total: Duration = recorded.iter().map(|r| r.simulated_duration).sum();
        Some(total / recorded.len() as u32)
    }
}
