//! Connection planning.
//!
//! The model is a fan-in from every client to the first mix, a linear mix
//! cascade and the distant proxy behind the last mix. Which links exist and
//! which routes they carry depends on the communication mode: a direction
//! that bypasses the mixes uses a direct client to proxy link.

use crate::config::CommunicationMode;
use crate::topology::types::{LinkPlan, Roster};

/// Plan every connection of the topology.
///
/// Requests are keyed by the proxy id and installed on the client side of a
/// link. Replies are keyed by the owning client id and installed on the
/// proxy side. Links that would carry no route are omitted.
pub fn plan_links(roster: &Roster, mode: CommunicationMode) -> Vec<LinkPlan> {
    let proxy = roster.proxy;
    let has_mixes = !roster.mixes.is_empty();
    let requests_via_mixes = has_mixes && mode.requests_via_mixes();
    let replies_via_mixes = has_mixes && mode.replies_via_mixes();

    let request_keys = |via_mixes: bool| if via_mixes { vec![proxy] } else { Vec::new() };

    let mut links = Vec::new();

    if let Some((&first, _)) = roster.mixes.split_first() {
        for &client in &roster.clients {
            links.push(LinkPlan {
                source: client,
                destination: first,
                outbound_keys: request_keys(requests_via_mixes),
                inbound_keys: if replies_via_mixes { vec![client] } else { Vec::new() },
            });
        }

        let chain = roster.mixes.iter().copied().chain(std::iter::once(proxy));
        for (source, destination) in roster.mixes.iter().copied().zip(chain.skip(1)) {
            links.push(LinkPlan {
                source,
                destination,
                outbound_keys: request_keys(requests_via_mixes),
                inbound_keys: if replies_via_mixes {
                    roster.clients.clone()
                } else {
                    Vec::new()
                },
            });
        }
    }

    if !requests_via_mixes || !replies_via_mixes {
        for &client in &roster.clients {
            links.push(LinkPlan {
                source: client,
                destination: proxy,
                outbound_keys: request_keys(!requests_via_mixes),
                inbound_keys: if replies_via_mixes { Vec::new() } else { vec![client] },
            });
        }
    }

    links.retain(LinkPlan::is_used);
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeId;

    fn roster(clients: u32, mixes: u32) -> Roster {
        Roster {
            clients: (0..clients).map(NodeId).collect(),
            mixes: (clients..clients + mixes).map(NodeId).collect(),
            proxy: NodeId(clients + mixes),
        }
    }

    #[test]
    fn test_duplex_cascade() {
        let links = plan_links(&roster(2, 2), CommunicationMode::Duplex);
        let pairs: Vec<(u32, u32)> = links
            .iter()
            .map(|link| (link.source.0, link.destination.0))
            .collect();
        assert_eq!(pairs, vec![(0, 2), (1, 2), (2, 3), (3, 4)]);
        assert!(links.iter().all(|link| link.outbound_keys == vec![NodeId(4)]));
        assert_eq!(links[1].inbound_keys, vec![NodeId(1)]);
        assert_eq!(links[3].inbound_keys, vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn test_simplex_reply_sends_requests_directly() {
        let links = plan_links(&roster(1, 1), CommunicationMode::SimplexReply);
        assert_eq!(links.len(), 3);
        let direct = &links[2];
        assert_eq!((direct.source, direct.destination), (NodeId(0), NodeId(2)));
        assert_eq!(direct.outbound_keys, vec![NodeId(2)]);
        assert!(direct.inbound_keys.is_empty());
        assert!(links[0].outbound_keys.is_empty());
        assert_eq!(links[0].inbound_keys, vec![NodeId(0)]);
    }

    #[test]
    fn test_simplex_with_feedback_replies_directly() {
        let links = plan_links(&roster(1, 2), CommunicationMode::SimplexWithFeedback);
        let direct = links.last().unwrap();
        assert_eq!((direct.source, direct.destination), (NodeId(0), NodeId(3)));
        assert!(direct.outbound_keys.is_empty());
        assert_eq!(direct.inbound_keys, vec![NodeId(0)]);
        assert!(links[..links.len() - 1]
            .iter()
            .all(|link| link.inbound_keys.is_empty()));
    }

    #[test]
    fn test_without_mixes_everything_is_direct() {
        for mode in [
            CommunicationMode::Duplex,
            CommunicationMode::SimplexReply,
            CommunicationMode::SimplexWithFeedback,
        ] {
            let links = plan_links(&roster(3, 0), mode);
            assert_eq!(links.len(), 3);
            for (index, link) in links.iter().enumerate() {
                assert_eq!(link.destination, NodeId(3));
                assert_eq!(link.outbound_keys, vec![NodeId(3)]);
                assert_eq!(link.inbound_keys, vec![NodeId(index as u32)]);
            }
        }
    }
}
