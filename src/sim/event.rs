//! Events and their targets.

use crate::network::message::MessageHeader;
use crate::network::{ConnectionId, NodeId};
use crate::node::{ClientEvent, MixEvent, ProxyEvent};
use crate::sim::VirtualTime;

/// Who executes an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A client, mix or distant proxy.
    Node(NodeId),
    /// A message in transit on a connection.
    Connection(ConnectionId),
    /// The simulator itself (recording window, hard stop).
    Simulator,
}

/// Events handled by the simulator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Open the statistics recording window.
    StartRecording,
    /// Close the recording window and end the run.
    StopRecording,
}

/// Event type, namespaced per node role. Payloads travel inside the variant,
/// so the event owns its attachment and hands it to whoever executes it.
#[derive(Debug)]
pub enum EventKind {
    Control(ControlEvent),
    Client(ClientEvent),
    Mix(MixEvent),
    Proxy(ProxyEvent),
}

impl EventKind {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Control(ControlEvent::StartRecording) => "START_RECORDING",
            EventKind::Control(ControlEvent::StopRecording) => "STOP_RECORDING",
            EventKind::Client(event) => event.name(),
            EventKind::Mix(event) => event.name(),
            EventKind::Proxy(event) => event.name(),
        }
    }

    /// Header of the network message this event carries across a connection,
    /// if it carries one.
    pub fn message_header(&self) -> Option<&MessageHeader> {
        match self {
            EventKind::Control(_) => None,
            EventKind::Client(ClientEvent::IncomingReply(message)) => Some(message.header()),
            EventKind::Client(_) => None,
            EventKind::Mix(MixEvent::IncomingRequest(message))
            | EventKind::Mix(MixEvent::IncomingReply(message)) => Some(&message.header),
            EventKind::Mix(MixEvent::ReplyFromDistantProxy(message)) => Some(&message.header),
            EventKind::Mix(_) => None,
            EventKind::Proxy(ProxyEvent::IncomingRequest(message)) => Some(&message.header),
            EventKind::Proxy(ProxyEvent::IncomingMixRequest(message)) => Some(&message.header),
            EventKind::Proxy(ProxyEvent::ReplyFromServer(_)) => None,
        }
    }

    pub fn message_header_mut(&mut self) -> Option<&mut MessageHeader> {
        match self {
            EventKind::Control(_) => None,
            EventKind::Client(ClientEvent::IncomingReply(message)) => Some(message.header_mut()),
            EventKind::Client(_) => None,
            EventKind::Mix(MixEvent::IncomingRequest(message))
            | EventKind::Mix(MixEvent::IncomingReply(message)) => Some(&mut message.header),
            EventKind::Mix(MixEvent::ReplyFromDistantProxy(message)) => Some(&mut message.header),
            EventKind::Mix(_) => None,
            EventKind::Proxy(ProxyEvent::IncomingRequest(message)) => Some(&mut message.header),
            EventKind::Proxy(ProxyEvent::IncomingMixRequest(message)) => {
                Some(&mut message.header)
            }
            EventKind::Proxy(ProxyEvent::ReplyFromServer(_)) => None,
        }
    }
}

impl From<ClientEvent> for EventKind {
    fn from(event: ClientEvent) -> Self {
        EventKind::Client(event)
    }
}

impl From<MixEvent> for EventKind {
    fn from(event: MixEvent) -> Self {
        EventKind::Mix(event)
    }
}

impl From<ProxyEvent> for EventKind {
    fn from(event: ProxyEvent) -> Self {
        EventKind::Proxy(event)
    }
}

impl From<ControlEvent> for EventKind {
    fn from(event: ControlEvent) -> Self {
        EventKind::Control(event)
    }
}

/// A unit of work scheduled for a target at a virtual time.
///
/// Events may be rescheduled in place: a connection moves the same event
/// back into the scheduler for each delay stage. Since the event is moved,
/// its attachment can only ever belong to one logical chain.
#[derive(Debug)]
pub struct Event {
    target: Target,
    time: VirtualTime,
    kind: EventKind,
    sequence: u64,
}

impl Event {
    pub fn new(target: Target, time: VirtualTime, kind: impl Into<EventKind>) -> Self {
        Self {
            target,
            time,
            kind: kind.into(),
            sequence: 0,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn time(&self) -> VirtualTime {
        self.time
    }

    /// Schedule-order id; assigned by the scheduler.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut EventKind {
        &mut self.kind
    }

    pub fn into_kind(self) -> EventKind {
        self.kind
    }

    /// Prepare the event for another trip through the scheduler.
    pub fn reuse(&mut self, target: Target, time: VirtualTime) {
        self.target = target;
        self.time = time;
    }

    /// Point the event at a new target without changing its time.
    pub fn retarget(&mut self, target: Target) {
        self.target = target;
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}
