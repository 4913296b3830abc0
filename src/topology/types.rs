//! Topology type definitions.

use crate::network::NodeId;

/// Node ids of one run, by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub clients: Vec<NodeId>,
    /// Mix cascade, first mix first.
    pub mixes: Vec<NodeId>,
    pub proxy: NodeId,
}

/// One connection to create and the routes it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    /// Client-side end.
    pub source: NodeId,
    /// Proxy-side end.
    pub destination: NodeId,
    /// Routing keys installed in the source's outbound table (requests).
    pub outbound_keys: Vec<NodeId>,
    /// Routing keys installed in the destination's inbound table (replies).
    pub inbound_keys: Vec<NodeId>,
}

impl LinkPlan {
    pub fn is_used(&self) -> bool {
        !self.outbound_keys.is_empty() || !self.inbound_keys.is_empty()
    }
}
