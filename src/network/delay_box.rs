//! Per-node propagation delay.

use std::fmt::Debug;
use std::time::Duration;

use crate::sim::VirtualTime;

/// Computes how long a message of a given size spends leaving and entering
/// a node.
pub trait DelayBox: Debug + Send {
    /// Delay applied by the sending node.
    fn send_delay(&self, length: u64) -> VirtualTime;
    /// Delay applied by the receiving node.
    fn receive_delay(&self, length: u64) -> VirtualTime;
}

/// Fixed one-way latency plus transmission time at the node's bandwidth.
///
/// Latency is charged once, on the sending side. A missing bandwidth means
/// the link never limits transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicDelayBox {
    pub latency: Duration,
    /// Bytes per second.
    pub upload_bandwidth: Option<u64>,
    /// Bytes per second.
    pub download_bandwidth: Option<u64>,
}

impl BasicDelayBox {
    pub fn new(
        latency: Duration,
        upload_bandwidth: Option<u64>,
        download_bandwidth: Option<u64>,
    ) -> Self {
        Self {
            latency,
            upload_bandwidth,
            download_bandwidth,
        }
    }
}

fn transmission_time(length: u64, bandwidth: Option<u64>) -> Duration {
    match bandwidth {
        Some(bytes_per_second) if bytes_per_second > 0 => {
            let nanos = u128::from(length) * 1_000_000_000 / u128::from(bytes_per_second);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
        _ => Duration::ZERO,
    }
}

impl DelayBox for BasicDelayBox {
    fn send_delay(&self, length: u64) -> VirtualTime {
        self.latency + transmission_time(length, self.upload_bandwidth)
    }

    fn receive_delay(&self, length: u64) -> VirtualTime {
        transmission_time(length, self.download_bandwidth)
    }
}
