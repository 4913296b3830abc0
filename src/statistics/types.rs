//! Statistics types and their descriptors.
//!
//! Each recorded metric belongs to exactly one input channel. The channel is
//! encoded in the key type: sample statistics are [`SampleStat`], running sums
//! are [`CounterStat`] and Bernoulli trials are [`TrialStat`]. Writing a value
//! to the wrong channel does not compile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use super::{Aggregator, ValueKind};

/// Declares a channel key enum together with its snake_case names.
macro_rules! statistic_keys {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

statistic_keys! {
    /// Statistics recorded as a growable sequence of samples.
    SampleStat {
        /// Time from request creation to each reply arriving at the client.
        ClientRoundTripMs => "client_round_trip_ms",
        /// Time from request creation to the request reaching the server.
        ClientRequestLatencyMs => "client_request_latency_ms",
        /// Time from reply creation at the server to arrival at the client.
        ClientReplyLatencyMs => "client_reply_latency_ms",
        /// Time from request creation to leaving the last mix.
        MixRequestLatencyMs => "mix_request_latency_ms",
    }
}

statistic_keys! {
    /// Statistics recorded as an exact running sum.
    CounterStat {
        ClientRequestsSent => "client_requests_sent",
        ClientRepliesReceived => "client_replies_received",
        ClientPayloadBytesSent => "client_payload_bytes_sent",
        ClientPayloadBytesReceived => "client_payload_bytes_received",
        NodeMessagesSent => "node_messages_sent",
        NodeMessagesReceived => "node_messages_received",
        NodeBytesSent => "node_bytes_sent",
        NodeBytesReceived => "node_bytes_received",
        ConnectionMessagesTransferred => "connection_messages_transferred",
        ConnectionBytesTransferred => "connection_bytes_transferred",
        ProxyRequestsReceived => "proxy_requests_received",
        ProxyDummiesDiscarded => "proxy_dummies_discarded",
    }
}

statistic_keys! {
    /// Statistics recorded as Bernoulli trials.
    TrialStat {
        /// Whether a mix message leaving a mix towards the proxy side was a dummy.
        MixOutputDummy => "mix_output_dummy",
        /// Whether a request reached the proxy still bundled in a mix message.
        ProxyRequestBundled => "proxy_request_bundled",
    }
}

/// Input channel of a statistics type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Samples,
    Counter,
    Trials,
}

/// Any statistics type, tagged with its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatisticsType {
    Sample(SampleStat),
    Counter(CounterStat),
    Trial(TrialStat),
}

impl StatisticsType {
    /// Every known statistics type, grouped by channel.
    pub fn all() -> impl Iterator<Item = StatisticsType> {
        SampleStat::ALL
            .iter()
            .copied()
            .map(StatisticsType::Sample)
            .chain(CounterStat::ALL.iter().copied().map(StatisticsType::Counter))
            .chain(TrialStat::ALL.iter().copied().map(StatisticsType::Trial))
    }

    pub fn name(self) -> &'static str {
        match self {
            StatisticsType::Sample(stat) => stat.name(),
            StatisticsType::Counter(stat) => stat.name(),
            StatisticsType::Trial(stat) => stat.name(),
        }
    }

    pub fn channel(self) -> Channel {
        match self {
            StatisticsType::Sample(_) => Channel::Samples,
            StatisticsType::Counter(_) => Channel::Counter,
            StatisticsType::Trial(_) => Channel::Trials,
        }
    }

    /// Built-in descriptor used when the experiment does not override it.
    pub fn default_descriptor(self) -> Descriptor {
        use Aggregator::*;

        let (source, runs, plot) = match self {
            StatisticsType::Sample(SampleStat::ClientRoundTripMs) => {
                (None, vec![Median, Avg, Min, Max], "latency")
            }
            StatisticsType::Sample(SampleStat::ClientRequestLatencyMs) => {
                (None, vec![Median, Avg], "latency")
            }
            StatisticsType::Sample(SampleStat::ClientReplyLatencyMs) => {
                (None, vec![Median, Avg], "latency")
            }
            StatisticsType::Sample(SampleStat::MixRequestLatencyMs) => {
                (None, vec![Median, Avg, Max], "latency")
            }
            StatisticsType::Counter(CounterStat::ClientRequestsSent)
            | StatisticsType::Counter(CounterStat::ClientRepliesReceived) => {
                (None, vec![Sum], "messages")
            }
            StatisticsType::Counter(CounterStat::ClientPayloadBytesSent)
            | StatisticsType::Counter(CounterStat::ClientPayloadBytesReceived) => {
                (Sum, vec![Sum, Avg], "traffic")
            }
            StatisticsType::Counter(CounterStat::NodeMessagesSent)
            | StatisticsType::Counter(CounterStat::NodeMessagesReceived) => {
                (None, vec![Sum, Max], "messages")
            }
            StatisticsType::Counter(CounterStat::NodeBytesSent)
            | StatisticsType::Counter(CounterStat::NodeBytesReceived) => {
                (None, vec![Sum, Max], "traffic")
            }
            StatisticsType::Counter(CounterStat::ConnectionMessagesTransferred) => {
                (None, vec![Sum], "messages")
            }
            StatisticsType::Counter(CounterStat::ConnectionBytesTransferred) => {
                (None, vec![Sum, Avg], "traffic")
            }
            StatisticsType::Counter(CounterStat::ProxyRequestsReceived)
            | StatisticsType::Counter(CounterStat::ProxyDummiesDiscarded) => {
                (None, vec![Sum], "messages")
            }
            StatisticsType::Trial(_) => (None, vec![Percentage], "ratios"),
        };

        Descriptor {
            activated: true,
            source_aggregator: source,
            run_aggregators: runs,
            plot_type: PlotType::LineChart,
            destination_plot: plot.to_string(),
        }
    }
}

impl fmt::Display for StatisticsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StatisticsType {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SampleStat::from_name(name)
            .map(StatisticsType::Sample)
            .or_else(|| CounterStat::from_name(name).map(StatisticsType::Counter))
            .or_else(|| TrialStat::from_name(name).map(StatisticsType::Trial))
            .ok_or_else(|| format!("unknown statistics type '{}'", name))
    }
}

impl Serialize for StatisticsType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl From<SampleStat> for StatisticsType {
    fn from(stat: SampleStat) -> Self {
        StatisticsType::Sample(stat)
    }
}

impl From<CounterStat> for StatisticsType {
    fn from(stat: CounterStat) -> Self {
        StatisticsType::Counter(stat)
    }
}

impl From<TrialStat> for StatisticsType {
    fn from(stat: TrialStat) -> Self {
        StatisticsType::Trial(stat)
    }
}

/// How a plot consumer should draw a destination plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlotType {
    #[default]
    LineChart,
    BarChart,
}

/// How a statistics type is recorded and aggregated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub activated: bool,
    /// Reduction applied per entity before cross-entity collection.
    pub source_aggregator: Aggregator,
    /// Reductions applied to the merged values of all runs.
    pub run_aggregators: Vec<Aggregator>,
    pub plot_type: PlotType,
    pub destination_plot: String,
}

impl Descriptor {
    /// Kind of values cross-entity collection produces for `ty`.
    pub fn collected_kind(&self, ty: StatisticsType) -> ValueKind {
        if self.source_aggregator != Aggregator::None {
            return ValueKind::Scalars;
        }
        match ty.channel() {
            Channel::Samples => ValueKind::Samples,
            Channel::Counter => ValueKind::Sums,
            Channel::Trials => ValueKind::Trials,
        }
    }

    /// Check that every aggregator fits the values it will be applied to.
    pub fn validate(&self, ty: StatisticsType) -> Result<(), String> {
        let raw = match ty.channel() {
            Channel::Samples => ValueKind::Samples,
            Channel::Counter => ValueKind::Sums,
            Channel::Trials => ValueKind::Trials,
        };
        if self.source_aggregator != Aggregator::None && !self.source_aggregator.accepts(raw) {
            return Err(format!(
                "source aggregator {:?} cannot reduce {:?} of '{}'",
                self.source_aggregator, raw, ty
            ));
        }
        let collected = self.collected_kind(ty);
        for aggregator in &self.run_aggregators {
            if *aggregator == Aggregator::None || !aggregator.accepts(collected) {
                return Err(format!(
                    "run aggregator {:?} cannot reduce {:?} of '{}'",
                    aggregator, collected, ty
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for ty in StatisticsType::all() {
            assert_eq!(ty.name().parse::<StatisticsType>(), Ok(ty));
        }
        assert!("no_such_statistic".parse::<StatisticsType>().is_err());
    }

    #[test]
    fn test_default_descriptors_fit_their_channel() {
        for ty in StatisticsType::all() {
            let descriptor = ty.default_descriptor();
            assert!(descriptor.validate(ty).is_ok(), "{}", ty);
        }
    }
}
