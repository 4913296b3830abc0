//! Network topology primitives: messages, delay boxes, connections and the
//! routing part shared by every node.

pub mod connection;
pub mod delay_box;
pub mod message;
pub mod node;

use std::fmt;

pub use connection::{NetworkConnection, NodeDirectory};
pub use delay_box::{BasicDelayBox, DelayBox};
pub use message::{MessageHeader, MixMessage, NetworkMessage, ReplySpec, TransportMessage};
pub use node::NetworkNode;

/// Numeric node id, unique within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Numeric connection id, unique within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ConnectionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
