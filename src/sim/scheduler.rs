//! Event scheduler and virtual clock.
//!
//! Events are kept in a binary heap ordered by execution time. Events
//! scheduled for the same time run in the order they were scheduled, which
//! makes a run fully reproducible for a fixed seed.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use log::{debug, trace};

use crate::network::NodeId;
use crate::sim::{Event, EventKind, SimError, Target, VirtualTime};

/// Heap entry. `BinaryHeap` is a max heap, so the comparison is reversed.
#[derive(Debug)]
struct Pending(Event);

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.0.time().cmp(&self.0.time()) {
            Ordering::Equal => other.0.sequence().cmp(&self.0.sequence()),
            ordering => ordering,
        }
    }
}

/// Owns the pending events and the current virtual time.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: VirtualTime,
    queue: BinaryHeap<Pending>,
    next_sequence: u64,
    executed: u64,
    voters: BTreeSet<NodeId>,
    votes: BTreeSet<NodeId>,
    stopped: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Queue an event. Scheduling into the past is a wiring bug and aborts
    /// the run.
    pub fn schedule(&mut self, mut event: Event) -> Result<(), SimError> {
        if event.time() < self.now {
            return Err(SimError::ScheduledInPast {
                scheduled: event.time(),
                now: self.now,
            });
        }
        event.set_sequence(self.next_sequence);
        self.next_sequence += 1;
        trace!(
            "schedule {} for {:?} at {:?}",
            event.kind().name(),
            event.target(),
            event.time()
        );
        self.queue.push(Pending(event));
        Ok(())
    }

    /// Queue an event `delay` after the current time.
    pub fn schedule_in(
        &mut self,
        delay: VirtualTime,
        target: Target,
        kind: impl Into<EventKind>,
    ) -> Result<(), SimError> {
        let time = self.now + delay;
        self.schedule(Event::new(target, time, kind))
    }

    /// Remove the earliest event and advance the clock to its time.
    /// Returns `None` once the run has been stopped or nothing is pending.
    pub fn next_event(&mut self) -> Option<Event> {
        if self.stopped {
            return None;
        }
        let Pending(event) = self.queue.pop()?;
        self.now = event.time();
        self.executed += 1;
        Some(event)
    }

    /// Register a node whose vote is required before the run may end early.
    pub fn register_voter(&mut self, voter: NodeId) {
        self.voters.insert(voter);
    }

    /// Record that `voter` has no further work. The run stops once every
    /// registered voter has voted.
    pub fn vote_for_stop(&mut self, voter: NodeId) {
        self.votes.insert(voter);
        debug!(
            "{:?} voted for stop ({}/{} votes)",
            voter,
            self.votes.intersection(&self.voters).count(),
            self.voters.len()
        );
        if self.all_voted() {
            debug!("all voters agreed, stopping at {:?}", self.now);
            self.stopped = true;
        }
    }

    /// End the run after the current event.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// True when every registered voter has voted.
    pub fn all_voted(&self) -> bool {
        !self.voters.is_empty() && self.voters.is_subset(&self.votes)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn executed_events(&self) -> u64 {
        self.executed
    }
}
