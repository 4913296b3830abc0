//! Statistics recording and aggregation.
//!
//! Every instrumented entity (client, mix, proxy, connection) owns one
//! [`Statistics`] object inside the run's [`StatisticsRegistry`]. Writes are
//! gated by the registry's recording window. After a run,
//! [`GeneralStatistics`] collects each statistics type across all entities,
//! and the [`ResultSet`] keeps those collections per varying value and run.

pub mod aggregator;
pub mod catalog;
pub mod general;
pub mod precise_sum;
pub mod recorder;
pub mod result_set;
pub mod types;

pub use aggregator::{Aggregator, RecordedValues, TrialCounts, ValueKind};
pub use catalog::{StatisticsCatalog, StatisticsSettings};
pub use general::GeneralStatistics;
pub use precise_sum::PreciseSum;
pub use recorder::{Statistics, StatisticsId, StatisticsRegistry};
pub use result_set::{AggregateResult, ResultSet, ResultSetError, RunRecord};
pub use types::{
    Channel, CounterStat, Descriptor, PlotType, SampleStat, StatisticsType, TrialStat,
};

/// Misuse of the statistics subsystem. Always fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("cannot add non-finite value {0} to an exact sum")]
    NonFinite(f64),
    #[error("aggregator {aggregator:?} cannot reduce {kind:?}")]
    IncompatibleAggregator {
        aggregator: Aggregator,
        kind: ValueKind,
    },
    #[error("cannot merge {found:?} into {expected:?}")]
    IncompatibleValues { expected: ValueKind, found: ValueKind },
    #[error("unknown statistics entity {0:?}")]
    UnknownEntity(StatisticsId),
}
