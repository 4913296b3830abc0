//! Builds the nodes and connections of one run from the configuration.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::{Config, LinkConfig, TrafficModelKind};
use crate::network::{BasicDelayBox, NetworkConnection, NetworkNode, NodeId};
use crate::node::mix::MixRole;
use crate::node::{Client, DistantProxy, Mix, Node, ReplyRoute};
use crate::plugin::{
    ClosedLoop, ConstantRate, PassThroughClientStyle, PassThroughOutput, RequestSpec,
    TrafficModel,
};
use crate::sim::{RunContext, SimError};
use crate::topology::connections::plan_links;
use crate::topology::types::Roster;
use crate::topology::Topology;

fn delay_box(link: &LinkConfig) -> Box<BasicDelayBox> {
    Box::new(BasicDelayBox::new(
        link.latency,
        link.upload_bandwidth,
        link.download_bandwidth,
    ))
}

fn traffic_model(config: &Config) -> Box<dyn TrafficModel> {
    let traffic = &config.traffic;
    let request = RequestSpec {
        size: traffic.request_size,
        replies: traffic.replies.clone(),
    };
    match traffic.model {
        TrafficModelKind::ConstantRate => Box::new(ConstantRate::new(
            traffic.interval.unwrap_or_default(),
            request,
            traffic.requests_per_client,
        )),
        TrafficModelKind::ClosedLoop => Box::new(ClosedLoop::new(
            traffic.think_time,
            request,
            traffic.requests_per_client,
        )),
    }
}

/// Create every node and connection. Ids are taken from the run context in
/// the order clients, mixes, proxy, then connections.
pub fn build_topology(config: &Config, ctx: &mut RunContext) -> Result<Topology, SimError> {
    let topology = &config.topology;
    let roster = Roster {
        clients: (0..topology.clients).map(|_| ctx.ids.node()).collect(),
        mixes: (0..topology.mixes).map(|_| ctx.ids.node()).collect(),
        proxy: ctx.ids.node(),
    };

    let mut network: BTreeMap<NodeId, NetworkNode> = BTreeMap::new();
    for (index, &id) in roster.clients.iter().enumerate() {
        let identifier = format!("client-{}", index);
        let stats = ctx.statistics.register(identifier.clone());
        network.insert(id, NetworkNode::new(identifier, id, delay_box(&config.network.client), stats));
    }
    for (index, &id) in roster.mixes.iter().enumerate() {
        let identifier = format!("mix-{}", index);
        let stats = ctx.statistics.register(identifier.clone());
        network.insert(id, NetworkNode::new(identifier, id, delay_box(&config.network.mix), stats));
    }
    let stats = ctx.statistics.register("proxy");
    network.insert(
        roster.proxy,
        NetworkNode::new("proxy", roster.proxy, delay_box(&config.network.proxy), stats),
    );

    let mut connections = BTreeMap::new();
    for link in plan_links(&roster, topology.mode) {
        let id = ctx.ids.connection();
        let stats = ctx
            .statistics
            .register(format!("connection-{}-{}", link.source.0, link.destination.0));
        for key in &link.outbound_keys {
            network
                .get_mut(&link.source)
                .ok_or(SimError::UnknownNode(link.source))?
                .add_outbound(*key, id);
        }
        for key in &link.inbound_keys {
            network
                .get_mut(&link.destination)
                .ok_or(SimError::UnknownNode(link.destination))?
                .add_inbound(*key, id);
        }
        debug!(
            "connection {:?}: {:?} -> {:?} ({} request routes, {} reply routes)",
            id,
            link.source,
            link.destination,
            link.outbound_keys.len(),
            link.inbound_keys.len()
        );
        connections.insert(
            id,
            NetworkConnection::new(id, link.source, link.destination, stats),
        );
    }

    let has_mixes = !roster.mixes.is_empty();
    let direct_requests = !(has_mixes && topology.mode.requests_via_mixes());
    let reply_route = if has_mixes && topology.mode.replies_via_mixes() {
        ReplyRoute::ViaMixes
    } else {
        ReplyRoute::Direct
    };

    let mut take = |id: NodeId| network.remove(&id).ok_or(SimError::UnknownNode(id));
    let mut nodes = BTreeMap::new();
    for &id in &roster.clients {
        let client = Client::new(
            take(id)?,
            roster.proxy,
            direct_requests,
            Box::new(PassThroughClientStyle {
                header_size: config.mix.header_size,
            }),
            traffic_model(config),
        );
        nodes.insert(id, Node::Client(client));
    }
    let last_index = roster.mixes.len().saturating_sub(1);
    for (index, &id) in roster.mixes.iter().enumerate() {
        let role = MixRole {
            first: index == 0,
            last: index == last_index,
            request_processing_time: config.mix.request_time_per_message(),
            reply_processing_time: config.mix.reply_time_per_message(),
            receiver_supports_dummy_traffic: topology.receiver_supports_dummy_traffic,
        };
        let output = Box::new(PassThroughOutput::new(config.mix.header_size));
        nodes.insert(id, Node::Mix(Mix::new(take(id)?, role, output)));
    }
    let proxy = DistantProxy::new(
        take(roster.proxy)?,
        reply_route,
        topology.receiver_supports_dummy_traffic,
    );
    nodes.insert(roster.proxy, Node::Proxy(proxy));

    info!(
        "Built topology: {} clients, {} mixes, {} connections ({:?})",
        roster.clients.len(),
        roster.mixes.len(),
        connections.len(),
        topology.mode
    );

    Ok(Topology::new(nodes, connections, roster))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CommunicationMode;
    use crate::network::ConnectionId;
    use crate::statistics::StatisticsCatalog;

    fn config(clients: u32, mixes: u32, mode: CommunicationMode) -> Config {
        let yaml = format!(
            r#"
general:
  stop_time: 10s
topology:
  clients: {}
  mixes: {}
  mode: {}
traffic:
  interval: 10ms
  request_size: 100
"#,
            clients,
            mixes,
            serde_yaml::to_string(&mode).unwrap().trim()
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_ids_follow_roles() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        let topology = build_topology(&config(2, 3, CommunicationMode::Duplex), &mut ctx).unwrap();

        assert_eq!(topology.clients(), &[NodeId(0), NodeId(1)]);
        assert_eq!(topology.mixes(), &[NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(topology.proxy(), NodeId(5));
        assert_eq!(topology.connection_count(), 5);

        let Some(Node::Mix(first)) = topology.node(NodeId(2)) else {
            panic!("expected a mix");
        };
        assert!(first.is_first() && !first.is_last());
        assert_eq!(first.node.inbound().len(), 2);
        let Some(Node::Mix(last)) = topology.node(NodeId(4)) else {
            panic!("expected a mix");
        };
        assert!(last.is_last());
        assert_eq!(
            last.node.outbound().get(&NodeId(5)),
            Some(&ConnectionId(4))
        );
    }

    #[test]
    fn test_single_mix_is_first_and_last() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        let topology =
            build_topology(&config(1, 1, CommunicationMode::SimplexReply), &mut ctx).unwrap();
        let Some(Node::Mix(mix)) = topology.node(NodeId(1)) else {
            panic!("expected a mix");
        };
        assert!(mix.is_first() && mix.is_last());
        // Client statistics, mix, proxy and one per connection.
        assert_eq!(ctx.statistics.len(), 3 + topology.connection_count());
    }
}
