//! Routing state shared by clients, mixes and the distant proxy.

use std::collections::BTreeMap;

use crate::network::{ConnectionId, DelayBox, NodeId};
use crate::sim::{Event, EventKind, Scheduler, SimError, Target, VirtualTime};
use crate::statistics::StatisticsId;

/// Identity, connections and delay box of one topology participant.
///
/// Both routing tables are keyed by the message's routing key: requests by
/// the distant proxy's id, replies by the owning client's id. A node with a
/// single neighbour uses the same map as one with many.
#[derive(Debug)]
pub struct NetworkNode {
    pub identifier: String,
    pub id: NodeId,
    /// Next hop towards the distant proxy.
    outbound: BTreeMap<NodeId, ConnectionId>,
    /// Previous hop towards the owning client.
    inbound: BTreeMap<NodeId, ConnectionId>,
    delay_box: Box<dyn DelayBox>,
    pub statistics: StatisticsId,
}

impl NetworkNode {
    pub fn new(
        identifier: impl Into<String>,
        id: NodeId,
        delay_box: Box<dyn DelayBox>,
        statistics: StatisticsId,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            id,
            outbound: BTreeMap::new(),
            inbound: BTreeMap::new(),
            delay_box,
            statistics,
        }
    }

    pub fn delay_box(&self) -> &dyn DelayBox {
        self.delay_box.as_ref()
    }

    pub fn add_outbound(&mut self, key: NodeId, connection: ConnectionId) {
        self.outbound.insert(key, connection);
    }

    pub fn add_inbound(&mut self, key: NodeId, connection: ConnectionId) {
        self.inbound.insert(key, connection);
    }

    pub fn outbound(&self) -> &BTreeMap<NodeId, ConnectionId> {
        &self.outbound
    }

    pub fn inbound(&self) -> &BTreeMap<NodeId, ConnectionId> {
        &self.inbound
    }

    /// Hand a message-carrying event to the connection towards the proxy.
    pub fn send_to_next_hop(
        &self,
        kind: impl Into<EventKind>,
        delay: VirtualTime,
        scheduler: &mut Scheduler,
    ) -> Result<(), SimError> {
        self.send(&self.outbound, kind.into(), delay, scheduler)
    }

    /// Hand a message-carrying event to the connection towards its client.
    pub fn send_to_previous_hop(
        &self,
        kind: impl Into<EventKind>,
        delay: VirtualTime,
        scheduler: &mut Scheduler,
    ) -> Result<(), SimError> {
        self.send(&self.inbound, kind.into(), delay, scheduler)
    }

    fn send(
        &self,
        routes: &BTreeMap<NodeId, ConnectionId>,
        kind: EventKind,
        delay: VirtualTime,
        scheduler: &mut Scheduler,
    ) -> Result<(), SimError> {
        let key = kind
            .message_header()
            .map(|header| header.route_key())
            .ok_or_else(|| SimError::UnexpectedEvent {
                node: self.identifier.clone(),
                event: kind.name(),
            })?;
        let connection = routes.get(&key).ok_or_else(|| SimError::NoRoute {
            node: self.identifier.clone(),
            destination: key,
        })?;
        let time = scheduler.now() + delay;
        scheduler.schedule(Event::new(Target::Connection(*connection), time, kind))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::network::{BasicDelayBox, MessageHeader, MixMessage};
    use crate::node::MixEvent;

    fn node() -> NetworkNode {
        let mut node = NetworkNode::new(
            "mix-0",
            NodeId(5),
            Box::new(BasicDelayBox::new(Duration::ZERO, None, None)),
            crate::statistics::StatisticsRegistry::new(Default::default()).register("mix-0"),
        );
        node.add_outbound(NodeId(9), ConnectionId(1));
        node.add_inbound(NodeId(0), ConnectionId(0));
        node
    }

    fn message(is_request: bool) -> MixMessage {
        MixMessage {
            header: MessageHeader::new(is_request, 10, NodeId(0), NodeId(9), Duration::ZERO),
            dummy: false,
            transports: Vec::new(),
        }
    }

    #[test]
    fn test_routes_by_direction() {
        let node = node();
        let mut scheduler = Scheduler::new();

        node.send_to_next_hop(
            MixEvent::IncomingRequest(message(true)),
            Duration::from_millis(3),
            &mut scheduler,
        )
        .unwrap();
        node.send_to_previous_hop(
            MixEvent::IncomingReply(message(false)),
            Duration::ZERO,
            &mut scheduler,
        )
        .unwrap();

        let first = scheduler.next_event().unwrap();
        assert_eq!(first.target(), Target::Connection(ConnectionId(0)));
        let second = scheduler.next_event().unwrap();
        assert_eq!(second.target(), Target::Connection(ConnectionId(1)));
        assert_eq!(second.time(), Duration::from_millis(3));
    }

    #[test]
    fn test_missing_route_is_fatal() {
        let node = node();
        let mut scheduler = Scheduler::new();
        let result = node.send_to_previous_hop(
            MixEvent::IncomingRequest(message(true)),
            Duration::ZERO,
            &mut scheduler,
        );
        assert!(matches!(
            result,
            Err(SimError::NoRoute {
                destination: NodeId(9),
                ..
            })
        ));

        let result =
            node.send_to_next_hop(MixEvent::ProcessedRequest(message(true)), Duration::ZERO, &mut scheduler);
        assert!(matches!(result, Err(SimError::UnexpectedEvent { .. })));
    }
}
