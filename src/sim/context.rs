//! Per-run simulation context.
//!
//! Everything a run mutates besides the topology lives here: identifier
//! allocators, the statistics registry with its recording window, and the
//! run's random number generator. A new run gets a new context, so nothing
//! leaks from one run into the next and independent runs can execute on
//! different threads.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::network::{ConnectionId, NodeId};
use crate::statistics::{StatisticsCatalog, StatisticsRegistry};

/// Hands out identifiers that are unique within one run.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_node: u32,
    next_connection: u32,
    next_message: u64,
    next_transaction: u64,
}

impl IdAllocator {
    pub fn node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn connection(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        id
    }

    pub fn message(&mut self) -> u64 {
        let id = self.next_message;
        self.next_message += 1;
        id
    }

    pub fn transaction(&mut self) -> u64 {
        let id = self.next_transaction;
        self.next_transaction += 1;
        id
    }
}

/// Mutable state owned by a single run.
#[derive(Debug)]
pub struct RunContext {
    pub ids: IdAllocator,
    pub statistics: StatisticsRegistry,
    pub rng: StdRng,
}

impl RunContext {
    pub fn new(seed: u64, catalog: Arc<StatisticsCatalog>) -> Self {
        Self {
            ids: IdAllocator::default(),
            statistics: StatisticsRegistry::new(catalog),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_restarts_identifiers() {
        let catalog = Arc::new(StatisticsCatalog::default());

        let mut first = RunContext::new(1, catalog.clone());
        assert_eq!(first.ids.node(), NodeId(0));
        assert_eq!(first.ids.node(), NodeId(1));
        assert_eq!(first.ids.message(), 0);
        first.statistics.register("client-0");

        let mut second = RunContext::new(1, catalog);
        assert_eq!(second.ids.node(), NodeId(0));
        assert_eq!(second.ids.connection(), ConnectionId(0));
        assert_eq!(second.ids.message(), 0);
        assert_eq!(second.statistics.len(), 0);
    }
}
