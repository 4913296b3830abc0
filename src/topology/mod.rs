//! Network topology module.
//!
//! This module plans the connections of the client / mix cascade / proxy
//! chain for a communication mode and builds the nodes of one run.

pub mod builder;
pub mod connections;
pub mod types;

use std::collections::BTreeMap;

use crate::network::{ConnectionId, DelayBox, NetworkConnection, NodeDirectory, NodeId};
use crate::node::Node;
use crate::sim::SimError;
use crate::statistics::StatisticsId;

pub use builder::build_topology;
pub use connections::plan_links;
pub use types::{LinkPlan, Roster};

/// Nodes and connections of one run.
#[derive(Debug)]
pub struct Topology {
    nodes: BTreeMap<NodeId, Node>,
    connections: BTreeMap<ConnectionId, NetworkConnection>,
    roster: Roster,
}

impl Topology {
    pub fn new(
        nodes: BTreeMap<NodeId, Node>,
        connections: BTreeMap<ConnectionId, NetworkConnection>,
        roster: Roster,
    ) -> Self {
        Self {
            nodes,
            connections,
            roster,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SimError> {
        self.nodes.get_mut(&id).ok_or(SimError::UnknownNode(id))
    }

    pub fn connection(&self, id: ConnectionId) -> Result<&NetworkConnection, SimError> {
        self.connections
            .get(&id)
            .ok_or(SimError::UnknownConnection(id))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn clients(&self) -> &[NodeId] {
        &self.roster.clients
    }

    pub fn mixes(&self) -> &[NodeId] {
        &self.roster.mixes
    }

    pub fn proxy(&self) -> NodeId {
        self.roster.proxy
    }
}

impl NodeDirectory for Topology {
    fn delay_box(&self, node: NodeId) -> Result<&dyn DelayBox, SimError> {
        self.node(node)
            .map(|n| n.network().delay_box())
            .ok_or(SimError::UnknownNode(node))
    }

    fn statistics(&self, node: NodeId) -> Result<StatisticsId, SimError> {
        self.node(node)
            .map(|n| n.network().statistics)
            .ok_or(SimError::UnknownNode(node))
    }
}
