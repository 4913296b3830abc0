//! Per-entity statistics objects and the run-wide registry that owns them.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use super::{
    Aggregator, CounterStat, PreciseSum, RecordedValues, SampleStat, StatisticsCatalog,
    StatisticsError, StatisticsType, TrialCounts, TrialStat,
};

/// Handle to one [`Statistics`] object inside a [`StatisticsRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatisticsId(usize);

/// Everything one instrumented entity recorded during the window.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    owner: String,
    samples: BTreeMap<SampleStat, Vec<f64>>,
    counters: BTreeMap<CounterStat, PreciseSum>,
    trials: BTreeMap<TrialStat, TrialCounts>,
}

impl Statistics {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Default::default()
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Raw values of `ty`, or `None` if this entity never recorded it.
    pub fn values(&self, ty: StatisticsType) -> Option<RecordedValues> {
        match ty {
            StatisticsType::Sample(stat) => self
                .samples
                .get(&stat)
                .map(|samples| RecordedValues::Samples(samples.clone())),
            StatisticsType::Counter(stat) => self
                .counters
                .get(&stat)
                .map(|sum| RecordedValues::Sums(vec![sum.clone()])),
            StatisticsType::Trial(stat) => {
                self.trials.get(&stat).map(|counts| RecordedValues::Trials(*counts))
            }
        }
    }

    /// Reduce this entity's values of `ty` with the type's own source
    /// aggregator. `None` if the type is inactive, was never recorded here
    /// or keeps raw values (source aggregator `none`).
    pub fn source_result(
        &self,
        ty: StatisticsType,
        catalog: &StatisticsCatalog,
    ) -> Result<Option<f64>, StatisticsError> {
        match catalog.descriptor(ty).filter(|d| d.activated) {
            Some(descriptor) if descriptor.source_aggregator.is_reduction() => {
                self.result(ty, descriptor.source_aggregator)
            }
            _ => Ok(None),
        }
    }

    /// Apply `aggregator` to this entity's values of `ty`.
    pub fn result(
        &self,
        ty: StatisticsType,
        aggregator: Aggregator,
    ) -> Result<Option<f64>, StatisticsError> {
        self.values(ty)
            .map(|values| aggregator.apply(&values))
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.counters.is_empty() && self.trials.is_empty()
    }
}

/// All statistics objects of one run plus the recording window.
///
/// Writes are silently dropped while the window is closed and for types the
/// catalog does not activate.
#[derive(Debug)]
pub struct StatisticsRegistry {
    catalog: Arc<StatisticsCatalog>,
    entries: Vec<Statistics>,
    recording: bool,
}

impl StatisticsRegistry {
    pub fn new(catalog: Arc<StatisticsCatalog>) -> Self {
        Self {
            catalog,
            entries: Vec::new(),
            recording: false,
        }
    }

    /// Create the statistics object for a new entity.
    pub fn register(&mut self, owner: impl Into<String>) -> StatisticsId {
        self.entries.push(Statistics::new(owner));
        StatisticsId(self.entries.len() - 1)
    }

    pub fn start_recording(&mut self) {
        debug!("Statistics recording started");
        self.recording = true;
    }

    pub fn stop_recording(&mut self) {
        debug!("Statistics recording stopped");
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn catalog(&self) -> &StatisticsCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: StatisticsId) -> Option<&Statistics> {
        self.entries.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statistics> {
        self.entries.iter()
    }

    pub fn add_sample(
        &mut self,
        id: StatisticsId,
        stat: SampleStat,
        value: f64,
    ) -> Result<(), StatisticsError> {
        if let Some(entry) = self.writable(id, stat.into())? {
            entry.samples.entry(stat).or_default().push(value);
        }
        Ok(())
    }

    /// Add a decimal amount to a running sum.
    pub fn increment(
        &mut self,
        id: StatisticsId,
        stat: CounterStat,
        value: f64,
    ) -> Result<(), StatisticsError> {
        if !value.is_finite() {
            return Err(StatisticsError::NonFinite(value));
        }
        if let Some(entry) = self.writable(id, stat.into())? {
            entry.counters.entry(stat).or_default().add(value)?;
        }
        Ok(())
    }

    /// Add an integer amount to a running sum.
    pub fn count(
        &mut self,
        id: StatisticsId,
        stat: CounterStat,
        amount: u64,
    ) -> Result<(), StatisticsError> {
        if let Some(entry) = self.writable(id, stat.into())? {
            entry.counters.entry(stat).or_default().add_count(amount);
        }
        Ok(())
    }

    pub fn add_trial(
        &mut self,
        id: StatisticsId,
        stat: TrialStat,
        outcome: bool,
    ) -> Result<(), StatisticsError> {
        if let Some(entry) = self.writable(id, stat.into())? {
            entry.trials.entry(stat).or_default().record(outcome);
        }
        Ok(())
    }

    /// The entry to write to, or `None` if the write is to be dropped.
    fn writable(
        &mut self,
        id: StatisticsId,
        ty: StatisticsType,
    ) -> Result<Option<&mut Statistics>, StatisticsError> {
        let active = self.recording && self.catalog.is_active(ty);
        let entry = self
            .entries
            .get_mut(id.0)
            .ok_or(StatisticsError::UnknownEntity(id))?;
        Ok(active.then_some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::StatisticsSettings;

    fn registry() -> StatisticsRegistry {
        StatisticsRegistry::new(Arc::new(StatisticsCatalog::default()))
    }

    #[test]
    fn test_writes_outside_window_are_dropped() {
        let mut registry = registry();
        let id = registry.register("client-0");

        registry.add_sample(id, SampleStat::ClientRoundTripMs, 1.0).unwrap();
        registry.start_recording();
        registry.add_sample(id, SampleStat::ClientRoundTripMs, 2.0).unwrap();
        registry.stop_recording();
        registry.add_sample(id, SampleStat::ClientRoundTripMs, 3.0).unwrap();

        let values = registry
            .get(id)
            .unwrap()
            .values(SampleStat::ClientRoundTripMs.into());
        assert_eq!(values, Some(RecordedValues::Samples(vec![2.0])));
    }

    #[test]
    fn test_source_result_uses_descriptor() {
        let mut registry = registry();
        let id = registry.register("client-0");
        registry.start_recording();
        registry.count(id, CounterStat::ClientPayloadBytesSent, 300).unwrap();
        registry.count(id, CounterStat::ClientPayloadBytesSent, 200).unwrap();
        registry.add_sample(id, SampleStat::ClientRoundTripMs, 5.0).unwrap();

        let catalog = StatisticsCatalog::default();
        let stats = registry.get(id).unwrap();
        assert_eq!(
            stats
                .source_result(CounterStat::ClientPayloadBytesSent.into(), &catalog)
                .unwrap(),
            Some(500.0)
        );
        // Raw samples have no source reduction.
        assert_eq!(
            stats
                .source_result(SampleStat::ClientRoundTripMs.into(), &catalog)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_channels() {
        let mut registry = registry();
        let id = registry.register("mix-0");
        registry.start_recording();

        registry.count(id, CounterStat::NodeBytesSent, 100).unwrap();
        registry.increment(id, CounterStat::NodeBytesSent, 0.5).unwrap();
        registry.add_trial(id, TrialStat::MixOutputDummy, true).unwrap();
        registry.add_trial(id, TrialStat::MixOutputDummy, false).unwrap();
        registry.add_trial(id, TrialStat::MixOutputDummy, false).unwrap();

        let stats = registry.get(id).unwrap();
        assert_eq!(
            stats
                .result(CounterStat::NodeBytesSent.into(), Aggregator::Sum)
                .unwrap(),
            Some(100.5)
        );
        assert_eq!(
            stats
                .result(TrialStat::MixOutputDummy.into(), Aggregator::Count)
                .unwrap(),
            Some(3.0)
        );
        assert_eq!(
            stats
                .result(SampleStat::ClientRoundTripMs.into(), Aggregator::Avg)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_inactive_types_are_not_recorded() {
        let mut settings = BTreeMap::new();
        settings.insert("node_bytes_sent".to_string(), StatisticsSettings::default());
        let catalog = StatisticsCatalog::from_settings(&settings).unwrap();
        let mut registry = StatisticsRegistry::new(Arc::new(catalog));
        let id = registry.register("proxy");
        registry.start_recording();

        registry.count(id, CounterStat::NodeBytesSent, 1).unwrap();
        registry.count(id, CounterStat::NodeBytesReceived, 1).unwrap();

        let stats = registry.get(id).unwrap();
        assert!(stats.values(CounterStat::NodeBytesSent.into()).is_some());
        assert!(stats.values(CounterStat::NodeBytesReceived.into()).is_none());
    }

    #[test]
    fn test_misuse_is_reported() {
        let mut registry = registry();
        let id = registry.register("client-0");
        assert!(registry
            .increment(id, CounterStat::ClientPayloadBytesSent, f64::NAN)
            .is_err());

        let mut other = self::registry();
        other.register("a");
        other.register("b");
        let foreign = other.register("c");
        assert!(matches!(
            registry.add_trial(foreign, TrialStat::MixOutputDummy, true),
            Err(StatisticsError::UnknownEntity(_))
        ));
    }
}
