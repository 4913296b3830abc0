//! Client traffic models.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;

use crate::plugin::{RequestSpec, TrafficModel};
use crate::sim::VirtualTime;

/// Uniform offset in `[0, span)`, so clients do not send in lockstep.
fn random_offset(span: Duration, rng: &mut StdRng) -> Duration {
    if span.is_zero() {
        Duration::ZERO
    } else {
        rng.gen_range(Duration::ZERO..span)
    }
}

/// Open loop: one request every `interval`, regardless of replies.
#[derive(Debug, Clone)]
pub struct ConstantRate {
    interval: Duration,
    request: RequestSpec,
    budget: Option<u64>,
}

impl ConstantRate {
    pub fn new(interval: Duration, request: RequestSpec, budget: Option<u64>) -> Self {
        Self {
            interval,
            request,
            budget,
        }
    }
}

impl TrafficModel for ConstantRate {
    fn initial_delay(&mut self, rng: &mut StdRng) -> VirtualTime {
        random_offset(self.interval, rng)
    }

    fn next_request(&mut self) -> RequestSpec {
        self.request.clone()
    }

    fn after_send(&mut self) -> Option<VirtualTime> {
        Some(self.interval)
    }

    fn after_transaction(&mut self) -> Option<VirtualTime> {
        None
    }

    fn budget(&self) -> Option<u64> {
        self.budget
    }
}

/// Closed loop: the next request leaves `think_time` after the previous
/// transaction completed.
#[derive(Debug, Clone)]
pub struct ClosedLoop {
    think_time: Duration,
    request: RequestSpec,
    budget: Option<u64>,
}

impl ClosedLoop {
    pub fn new(think_time: Duration, request: RequestSpec, budget: Option<u64>) -> Self {
        Self {
            think_time,
            request,
            budget,
        }
    }
}

impl TrafficModel for ClosedLoop {
    fn initial_delay(&mut self, rng: &mut StdRng) -> VirtualTime {
        random_offset(self.think_time, rng)
    }

    fn next_request(&mut self) -> RequestSpec {
        self.request.clone()
    }

    fn after_send(&mut self) -> Option<VirtualTime> {
        None
    }

    fn after_transaction(&mut self) -> Option<VirtualTime> {
        Some(self.think_time)
    }

    fn budget(&self) -> Option<u64> {
        self.budget
    }
}
