//! Aggregators and the value sequences they reduce.

use serde::{Deserialize, Serialize};

use super::{PreciseSum, StatisticsError};

/// Reduction from a sequence of recorded values to one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    /// No reduction: keep the raw values.
    None,
    Avg,
    Sum,
    Min,
    Max,
    Median,
    Count,
    /// Population standard deviation.
    StdDev,
    /// Share of true outcomes among Bernoulli trials, in `[0, 1]`.
    Percentage,
}

/// Shape of a value sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Samples,
    Sums,
    Trials,
    Scalars,
}

/// Outcome counts of Bernoulli trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrialCounts {
    pub successes: u64,
    pub failures: u64,
}

impl TrialCounts {
    pub fn record(&mut self, outcome: bool) {
        if outcome {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn merge(&mut self, other: TrialCounts) {
        self.successes += other.successes;
        self.failures += other.failures;
    }
}

/// Values collected for one statistics type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum RecordedValues {
    /// Raw samples of every entity, concatenated.
    Samples(Vec<f64>),
    /// Trial counts of every entity, summed.
    Trials(TrialCounts),
    /// One exact sum per entity.
    Sums(Vec<PreciseSum>),
    /// One source-aggregated scalar per entity.
    Scalars(Vec<f64>),
}

impl RecordedValues {
    /// Empty sequence of the given kind.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Samples => RecordedValues::Samples(Vec::new()),
            ValueKind::Sums => RecordedValues::Sums(Vec::new()),
            ValueKind::Trials => RecordedValues::Trials(TrialCounts::default()),
            ValueKind::Scalars => RecordedValues::Scalars(Vec::new()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            RecordedValues::Samples(_) => ValueKind::Samples,
            RecordedValues::Trials(_) => ValueKind::Trials,
            RecordedValues::Sums(_) => ValueKind::Sums,
            RecordedValues::Scalars(_) => ValueKind::Scalars,
        }
    }

    /// Number of recorded values (trials count every outcome).
    pub fn len(&self) -> usize {
        match self {
            RecordedValues::Samples(values) | RecordedValues::Scalars(values) => values.len(),
            RecordedValues::Sums(sums) => sums.len(),
            RecordedValues::Trials(counts) => counts.total() as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append another sequence of the same kind: sequences concatenate,
    /// trial counts add up elementwise.
    pub fn merge(&mut self, other: &RecordedValues) -> Result<(), StatisticsError> {
        match (self, other) {
            (RecordedValues::Samples(values), RecordedValues::Samples(more))
            | (RecordedValues::Scalars(values), RecordedValues::Scalars(more)) => {
                values.extend_from_slice(more)
            }
            (RecordedValues::Sums(sums), RecordedValues::Sums(more)) => {
                sums.extend(more.iter().cloned())
            }
            (RecordedValues::Trials(counts), RecordedValues::Trials(more)) => counts.merge(*more),
            (mine, theirs) => {
                return Err(StatisticsError::IncompatibleValues {
                    expected: mine.kind(),
                    found: theirs.kind(),
                })
            }
        }
        Ok(())
    }
}

impl Aggregator {
    /// True for aggregators that produce a scalar.
    pub fn is_reduction(self) -> bool {
        self != Aggregator::None
    }

    /// Whether the aggregator can reduce values of `kind`.
    pub fn accepts(self, kind: ValueKind) -> bool {
        match (self, kind) {
            (Aggregator::None, _) => true,
            (Aggregator::Percentage, ValueKind::Trials) => true,
            (Aggregator::Percentage, _) => false,
            (Aggregator::Sum | Aggregator::Count, ValueKind::Trials) => true,
            (_, ValueKind::Trials) => false,
            _ => true,
        }
    }

    /// Reduce `values` to a scalar. Empty sequences reduce to `NaN`, except
    /// for sums and counts, which are zero.
    pub fn apply(self, values: &RecordedValues) -> Result<f64, StatisticsError> {
        if !self.is_reduction() || !self.accepts(values.kind()) {
            return Err(StatisticsError::IncompatibleAggregator {
                aggregator: self,
                kind: values.kind(),
            });
        }
        let result = match values {
            RecordedValues::Trials(counts) => match self {
                Aggregator::Percentage if counts.total() == 0 => f64::NAN,
                Aggregator::Percentage => counts.successes as f64 / counts.total() as f64,
                Aggregator::Sum => counts.successes as f64,
                _ => counts.total() as f64,
            },
            RecordedValues::Sums(sums) if self == Aggregator::Sum => {
                let mut total = PreciseSum::new();
                for sum in sums {
                    total += sum;
                }
                total.to_f64()
            }
            RecordedValues::Sums(sums) => {
                let values: Vec<f64> = sums.iter().map(PreciseSum::to_f64).collect();
                self.reduce(&values)
            }
            RecordedValues::Samples(values) | RecordedValues::Scalars(values) => {
                self.reduce(values)
            }
        };
        Ok(result)
    }

    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            Aggregator::Count => return values.len() as f64,
            Aggregator::Sum => return exact_sum(values),
            _ if values.is_empty() => return f64::NAN,
            _ => {}
        }
        match self {
            Aggregator::Avg => exact_sum(values) / values.len() as f64,
            Aggregator::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregator::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregator::Median => median(values),
            Aggregator::StdDev => {
                let mean = exact_sum(values) / values.len() as f64;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / values.len() as f64;
                variance.sqrt()
            }
            Aggregator::None | Aggregator::Percentage | Aggregator::Count | Aggregator::Sum => {
                f64::NAN
            }
        }
    }
}

/// Sum finite values without drift; falls back to plain summation if any
/// value is not finite.
fn exact_sum(values: &[f64]) -> f64 {
    let mut total = PreciseSum::new();
    for value in values {
        if total.add(*value).is_err() {
            return values.iter().sum();
        }
    }
    total.to_f64()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}
