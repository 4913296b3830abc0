//! Errors that abort a simulation run.
//!
//! Every variant is a wiring or protocol-confusion bug in the topology or in
//! a plug-in. None of them are retried; the run stops at the first one.

use crate::network::{ConnectionId, NodeId};
use crate::sim::VirtualTime;
use crate::statistics::StatisticsError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("event scheduled at {scheduled:?} but the clock is already at {now:?}")]
    ScheduledInPast {
        scheduled: VirtualTime,
        now: VirtualTime,
    },
    #[error("node {node} cannot handle event {event}")]
    UnexpectedEvent { node: String, event: &'static str },
    #[error("event {event} on connection {connection:?} carries no network message")]
    NotAMessage {
        connection: ConnectionId,
        event: &'static str,
    },
    #[error("event {event} on connection {connection:?} passed the second delay box before the first")]
    CorruptCrossing {
        connection: ConnectionId,
        event: &'static str,
    },
    #[error("node {node} has no route towards {destination:?}")]
    NoRoute { node: String, destination: NodeId },
    #[error("node {node} received {event} for a message with is_request={is_request}")]
    DirectionMismatch {
        node: String,
        event: &'static str,
        is_request: bool,
    },
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),
    #[error(transparent)]
    Statistics(#[from] StatisticsError),
}
