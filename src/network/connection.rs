//! Connections between two nodes and the two-stage delay crossing.
//!
//! A message crosses a connection in three steps, driven by the two flags
//! in its header:
//!
//! 1. neither flag set: wait for the sender's send delay, set the first flag;
//! 2. first flag set: wait for the receiver's receive delay, set the second
//!    flag and charge the sender's counters;
//! 3. both flags set: clear them, charge the receiver's counters and hand
//!    the event to the receiver.
//!
//! Connections are oriented from the client side towards the proxy side.
//! Replies travel them backwards, so sender and receiver are resolved from
//! the message direction before every step.

use log::trace;

use crate::network::{ConnectionId, DelayBox, NodeId};
use crate::sim::{Event, RunContext, Scheduler, SimError, Target};
use crate::statistics::{CounterStat, StatisticsId};

/// Node lookups a connection needs while a message crosses it.
pub trait NodeDirectory {
    fn delay_box(&self, node: NodeId) -> Result<&dyn DelayBox, SimError>;
    fn statistics(&self, node: NodeId) -> Result<StatisticsId, SimError>;
}

/// A directed pair of nodes. Stateless apart from its statistics; the
/// crossing state travels with the message.
#[derive(Debug, Clone)]
pub struct NetworkConnection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub destination: NodeId,
    pub statistics: StatisticsId,
}

impl NetworkConnection {
    pub fn new(
        id: ConnectionId,
        source: NodeId,
        destination: NodeId,
        statistics: StatisticsId,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            statistics,
        }
    }

    /// Advance `event` by one crossing step. Returns the event once it has
    /// arrived and must be executed by its new target right away.
    pub fn cross(
        &self,
        mut event: Event,
        directory: &impl NodeDirectory,
        scheduler: &mut Scheduler,
        ctx: &mut RunContext,
    ) -> Result<Option<Event>, SimError> {
        let now = scheduler.now();
        let name = event.kind().name();
        let header = event
            .kind_mut()
            .message_header_mut()
            .ok_or(SimError::NotAMessage {
                connection: self.id,
                event: name,
            })?;

        let (sender, receiver) = if header.is_request {
            (self.source, self.destination)
        } else {
            (self.destination, self.source)
        };
        let length = header.length;

        match (
            header.passed_first_delay_box(),
            header.passed_second_delay_box(),
        ) {
            (false, false) => {
                header.set_passed_first_delay_box();
                let delay = directory.delay_box(sender)?.send_delay(length);
                event.reuse(Target::Connection(self.id), now + delay);
                scheduler.schedule(event)?;
                Ok(None)
            }
            (true, false) => {
                header.set_passed_second_delay_box();
                let delay = directory.delay_box(receiver)?.receive_delay(length);
                let stats = directory.statistics(sender)?;
                ctx.statistics.count(stats, CounterStat::NodeBytesSent, length)?;
                ctx.statistics.count(stats, CounterStat::NodeMessagesSent, 1)?;
                event.reuse(Target::Connection(self.id), now + delay);
                scheduler.schedule(event)?;
                Ok(None)
            }
            (true, true) => {
                header.clear_delay_box_flags();
                let stats = directory.statistics(receiver)?;
                ctx.statistics.count(stats, CounterStat::NodeBytesReceived, length)?;
                ctx.statistics.count(stats, CounterStat::NodeMessagesReceived, 1)?;
                ctx.statistics
                    .count(self.statistics, CounterStat::ConnectionBytesTransferred, length)?;
                ctx.statistics
                    .count(self.statistics, CounterStat::ConnectionMessagesTransferred, 1)?;
                trace!(
                    "{} arrived at {:?} over connection {:?}",
                    name,
                    receiver,
                    self.id
                );
                event.retarget(Target::Node(receiver));
                Ok(Some(event))
            }
            (false, true) => Err(SimError::CorruptCrossing {
                connection: self.id,
                event: name,
            }),
        }
    }
}
