//! Cross-entity collection of one run's statistics.

use std::collections::BTreeMap;

use super::{RecordedValues, StatisticsError, StatisticsRegistry, StatisticsType};

/// Collects every registered [`Statistics`](super::Statistics) object of a
/// run into one value sequence per statistics type.
pub struct GeneralStatistics;

impl GeneralStatistics {
    /// Collect `ty` across every entity of the run.
    ///
    /// Without a source aggregator, samples are concatenated, trial counts
    /// summed and each exact sum kept as one value. With one, every entity
    /// contributes its single aggregated scalar. Entities that never
    /// recorded `ty` are skipped. Returns `None` for inactive types.
    pub fn collect(
        registry: &StatisticsRegistry,
        ty: StatisticsType,
    ) -> Result<Option<RecordedValues>, StatisticsError> {
        let Some(descriptor) = registry.catalog().descriptor(ty).filter(|d| d.activated) else {
            return Ok(None);
        };

        let mut collected = RecordedValues::empty(descriptor.collected_kind(ty));
        for statistics in registry.iter() {
            if descriptor.source_aggregator.is_reduction() {
                if let Some(scalar) = statistics.source_result(ty, registry.catalog())? {
                    collected.merge(&RecordedValues::Scalars(vec![scalar]))?;
                }
            } else if let Some(values) = statistics.values(ty) {
                collected.merge(&values)?;
            }
        }
        Ok(Some(collected))
    }

    /// Collect every active type of the run.
    pub fn snapshot(
        registry: &StatisticsRegistry,
    ) -> Result<BTreeMap<StatisticsType, RecordedValues>, StatisticsError> {
        let mut snapshot = BTreeMap::new();
        for ty in registry.catalog().active_types() {
            if let Some(values) = Self::collect(registry, ty)? {
                snapshot.insert(ty, values);
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::statistics::{
        Aggregator, CounterStat, PreciseSum, SampleStat, StatisticsCatalog, StatisticsSettings,
        TrialCounts, TrialStat,
    };

    #[test]
    fn test_collection_without_source_aggregator() {
        let mut registry = StatisticsRegistry::new(Arc::new(StatisticsCatalog::default()));
        let a = registry.register("client-0");
        let b = registry.register("client-1");
        let idle = registry.register("client-2");
        registry.start_recording();

        registry.add_sample(a, SampleStat::ClientRoundTripMs, 10.0).unwrap();
        registry.add_sample(b, SampleStat::ClientRoundTripMs, 20.0).unwrap();
        registry.add_sample(b, SampleStat::ClientRoundTripMs, 30.0).unwrap();
        registry.count(a, CounterStat::NodeBytesSent, 5).unwrap();
        registry.count(b, CounterStat::NodeBytesSent, 7).unwrap();
        registry.add_trial(a, TrialStat::MixOutputDummy, true).unwrap();
        registry.add_trial(b, TrialStat::MixOutputDummy, false).unwrap();
        let _ = idle;

        let rtt = GeneralStatistics::collect(&registry, SampleStat::ClientRoundTripMs.into())
            .unwrap()
            .unwrap();
        assert_eq!(rtt, RecordedValues::Samples(vec![10.0, 20.0, 30.0]));

        let bytes = GeneralStatistics::collect(&registry, CounterStat::NodeBytesSent.into())
            .unwrap()
            .unwrap();
        let mut five = PreciseSum::new();
        five.add_count(5);
        let mut seven = PreciseSum::new();
        seven.add_count(7);
        assert_eq!(bytes, RecordedValues::Sums(vec![five, seven]));

        let dummies = GeneralStatistics::collect(&registry, TrialStat::MixOutputDummy.into())
            .unwrap()
            .unwrap();
        assert_eq!(
            dummies,
            RecordedValues::Trials(TrialCounts {
                successes: 1,
                failures: 1
            })
        );
    }

    #[test]
    fn test_collection_with_source_aggregator() {
        let mut settings = BTreeMap::new();
        settings.insert(
            "client_round_trip_ms".to_string(),
            StatisticsSettings {
                source: Some(Aggregator::Max),
                runs: Some(vec![Aggregator::Avg]),
                ..Default::default()
            },
        );
        let catalog = StatisticsCatalog::from_settings(&settings).unwrap();
        let mut registry = StatisticsRegistry::new(Arc::new(catalog));
        let a = registry.register("client-0");
        let b = registry.register("client-1");
        registry.start_recording();
        registry.add_sample(a, SampleStat::ClientRoundTripMs, 1.0).unwrap();
        registry.add_sample(a, SampleStat::ClientRoundTripMs, 4.0).unwrap();
        registry.add_sample(b, SampleStat::ClientRoundTripMs, 2.0).unwrap();

        let snapshot = GeneralStatistics::snapshot(&registry).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[&SampleStat::ClientRoundTripMs.into()],
            RecordedValues::Scalars(vec![4.0, 2.0])
        );
        assert!(
            GeneralStatistics::collect(&registry, CounterStat::NodeBytesSent.into())
                .unwrap()
                .is_none()
        );
    }
}
