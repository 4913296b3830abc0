//! Experiment configuration.
//!
//! The YAML layout mirrors the sections below. Durations use humantime
//! notation (`"10ms"`, `"5m"`). Unknown keys are rejected, so a typo in a
//! property name, or in the varying key, fails before any run starts.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::ReplySpec;
use crate::statistics::{StatisticsCatalog, StatisticsSettings};

/// Where traffic is routed through the mix cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationMode {
    /// Requests go directly to the proxy, replies come back through the mixes.
    SimplexReply,
    /// Requests go through the mixes, replies come back directly.
    SimplexWithFeedback,
    /// Both directions use the mixes.
    #[default]
    Duplex,
}

impl CommunicationMode {
    pub fn requests_via_mixes(self) -> bool {
        self != CommunicationMode::SimplexReply
    }

    pub fn replies_via_mixes(self) -> bool {
        self != CommunicationMode::SimplexWithFeedback
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficModelKind {
    #[default]
    ConstantRate,
    ClosedLoop,
}

/// Complete experiment description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    pub topology: TopologyConfig,
    #[serde(default)]
    pub mix: MixConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub statistics: BTreeMap<String, StatisticsSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Validation runs per varying value.
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Virtual time at which statistics recording starts.
    #[serde(default, with = "humantime_serde")]
    pub start_recording: Duration,
    /// Virtual time at which recording stops and the run ends.
    #[serde(default, with = "humantime_serde")]
    pub stop_time: Option<Duration>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub varying: Option<VaryingParameter>,
}

/// One property varied across the experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaryingParameter {
    /// Dotted property path, e.g. `topology.mixes`.
    pub key: String,
    pub values: Vec<serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    pub clients: u32,
    #[serde(default)]
    pub mixes: u32,
    #[serde(default)]
    pub mode: CommunicationMode,
    /// The distant proxy accepts bundled mix messages, including dummies.
    #[serde(default)]
    pub receiver_supports_dummy_traffic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixConfig {
    /// Time a mix needs to process 1000 requests.
    #[serde(default, with = "humantime_serde")]
    pub request_processing_time: Duration,
    /// Time a mix needs to process 1000 replies.
    #[serde(default, with = "humantime_serde")]
    pub reply_processing_time: Duration,
    /// Bytes added by wrapping transport messages into a mix message.
    #[serde(default)]
    pub header_size: u64,
}

impl MixConfig {
    pub fn request_time_per_message(&self) -> Duration {
        self.request_processing_time / 1000
    }

    pub fn reply_time_per_message(&self) -> Duration {
        self.reply_processing_time / 1000
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default)]
    pub client: LinkConfig,
    #[serde(default)]
    pub mix: LinkConfig,
    #[serde(default)]
    pub proxy: LinkConfig,
}

/// Delay box parameters of one node role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    #[serde(default, with = "humantime_serde")]
    pub latency: Duration,
    /// Bytes per second, unlimited if absent.
    #[serde(default)]
    pub upload_bandwidth: Option<u64>,
    /// Bytes per second, unlimited if absent.
    #[serde(default)]
    pub download_bandwidth: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrafficConfig {
    #[serde(default)]
    pub model: TrafficModelKind,
    /// Time between two requests of one client (constant rate).
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    /// Pause after a completed transaction (closed loop, must be non-zero).
    #[serde(default, with = "humantime_serde")]
    pub think_time: Duration,
    /// Requests per client, unlimited if absent.
    #[serde(default)]
    pub requests_per_client: Option<u64>,
    pub request_size: u64,
    #[serde(default)]
    pub replies: Vec<ReplySpec>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid experiment configuration: {0}")]
    InvalidExperiment(String),
    #[error("Invalid topology configuration: {0}")]
    InvalidTopology(String),
    #[error("Invalid traffic configuration: {0}")]
    InvalidTraffic(String),
    #[error("Invalid statistics configuration: {0}")]
    InvalidStatistics(String),
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.runs == 0 {
            return Err(ValidationError::InvalidGeneral(
                "runs must be at least 1".to_string(),
            ));
        }
        if let Some(stop_time) = self.general.stop_time {
            if stop_time <= self.general.start_recording {
                return Err(ValidationError::InvalidGeneral(format!(
                    "stop_time ({:?}) must be later than start_recording ({:?})",
                    stop_time, self.general.start_recording
                )));
            }
        }

        if let Some(varying) = &self.experiment.varying {
            if varying.key.trim().is_empty() {
                return Err(ValidationError::InvalidExperiment(
                    "varying key cannot be empty".to_string(),
                ));
            }
            if varying.values.is_empty() {
                return Err(ValidationError::InvalidExperiment(format!(
                    "varying parameter '{}' has no values",
                    varying.key
                )));
            }
        }

        if self.topology.clients == 0 {
            return Err(ValidationError::InvalidTopology(
                "at least one client is required".to_string(),
            ));
        }

        self.validate_traffic()?;

        StatisticsCatalog::from_settings(&self.statistics)
            .map_err(ValidationError::InvalidStatistics)?;

        Ok(())
    }

    fn validate_traffic(&self) -> Result<(), ValidationError> {
        let traffic = &self.traffic;
        match traffic.model {
            TrafficModelKind::ConstantRate => match traffic.interval {
                None => {
                    return Err(ValidationError::InvalidTraffic(
                        "constant_rate traffic needs an interval".to_string(),
                    ))
                }
                Some(interval) if interval.is_zero() => {
                    return Err(ValidationError::InvalidTraffic(
                        "time between sends cannot be zero".to_string(),
                    ))
                }
                Some(_) => {}
            },
            TrafficModelKind::ClosedLoop => {
                if self.topology.mode == CommunicationMode::SimplexReply {
                    return Err(ValidationError::InvalidTraffic(
                        "closed_loop traffic is not supported in simplex_reply mode".to_string(),
                    ));
                }
                if traffic.think_time.is_zero() {
                    return Err(ValidationError::InvalidTraffic(
                        "closed_loop traffic needs a non-zero think_time".to_string(),
                    ));
                }
            }
        }

        if self.general.stop_time.is_none() && traffic.requests_per_client.is_none() {
            return Err(ValidationError::InvalidTraffic(
                "without general.stop_time, requests_per_client must bound the run".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of values the experiment iterates over (at least one).
    pub fn varying_len(&self) -> usize {
        self.experiment
            .varying
            .as_ref()
            .map_or(1, |varying| varying.values.len())
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            runs: default_runs(),
            start_recording: Duration::ZERO,
            stop_time: None,
            log_level: Some("info".to_string()),
        }
    }
}

fn default_seed() -> u64 {
    12345
}

fn default_runs() -> u32 {
    1
}
