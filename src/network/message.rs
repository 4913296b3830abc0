//! Network messages.
//!
//! A [`TransportMessage`] carries one end-to-end payload between a client
//! and the distant proxy. A [`MixMessage`] bundles zero or more transport
//! messages for the hops between clients and mixes; an empty one flagged as
//! dummy is cover traffic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::NodeId;
use crate::sim::VirtualTime;

/// Routing and crossing state shared by every message variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub is_request: bool,
    /// Size on the wire in bytes.
    pub length: u64,
    /// Client the message belongs to. Replies are routed by this id.
    pub owner: NodeId,
    /// Distant proxy the request travels to. Requests are routed by this id.
    pub destination: NodeId,
    pub creation_time: VirtualTime,
    passed_first_delay_box: bool,
    passed_second_delay_box: bool,
}

impl MessageHeader {
    pub fn new(
        is_request: bool,
        length: u64,
        owner: NodeId,
        destination: NodeId,
        creation_time: VirtualTime,
    ) -> Self {
        Self {
            is_request,
            length,
            owner,
            destination,
            creation_time,
            passed_first_delay_box: false,
            passed_second_delay_box: false,
        }
    }

    /// Routing key for the current direction.
    pub fn route_key(&self) -> NodeId {
        if self.is_request {
            self.destination
        } else {
            self.owner
        }
    }

    pub fn passed_first_delay_box(&self) -> bool {
        self.passed_first_delay_box
    }

    pub fn passed_second_delay_box(&self) -> bool {
        self.passed_second_delay_box
    }

    pub(crate) fn set_passed_first_delay_box(&mut self) {
        self.passed_first_delay_box = true;
    }

    pub(crate) fn set_passed_second_delay_box(&mut self) {
        self.passed_second_delay_box = true;
    }

    pub(crate) fn clear_delay_box_flags(&mut self) {
        self.passed_first_delay_box = false;
        self.passed_second_delay_box = false;
    }
}

/// One scheduled reply of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplySpec {
    /// Reply payload size in bytes.
    pub size: u64,
    /// Server-side delay before the reply is sent.
    #[serde(default, with = "humantime_serde")]
    pub delay: Duration,
}

/// End-to-end message between a client and the distant proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub header: MessageHeader,
    pub id: u64,
    pub transaction_id: u64,
    /// Replies the server sends for this request. Empty on replies.
    pub replies: Vec<ReplySpec>,
    /// Position of this reply in its transaction's reply schedule.
    pub reply_index: Option<usize>,
}

impl TransportMessage {
    pub fn request(
        header: MessageHeader,
        id: u64,
        transaction_id: u64,
        replies: Vec<ReplySpec>,
    ) -> Self {
        Self {
            header,
            id,
            transaction_id,
            replies,
            reply_index: None,
        }
    }

    pub fn reply(header: MessageHeader, id: u64, transaction_id: u64, reply_index: usize) -> Self {
        Self {
            header,
            id,
            transaction_id,
            replies: Vec::new(),
            reply_index: Some(reply_index),
        }
    }

    /// Whether this reply is the last one of its transaction.
    pub fn is_last_reply(&self, expected: usize) -> bool {
        self.reply_index.is_some_and(|index| index + 1 == expected)
    }
}

/// Message exchanged between clients and mixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixMessage {
    pub header: MessageHeader,
    pub dummy: bool,
    pub transports: Vec<TransportMessage>,
}

impl MixMessage {
    /// Bundle transport messages; `overhead` is added to their payload size.
    pub fn bundle(
        transports: Vec<TransportMessage>,
        overhead: u64,
        owner: NodeId,
        destination: NodeId,
        now: VirtualTime,
    ) -> Self {
        let is_request = transports.first().map_or(true, |t| t.header.is_request);
        let payload: u64 = transports.iter().map(|t| t.header.length).sum();
        Self {
            header: MessageHeader::new(is_request, payload + overhead, owner, destination, now),
            dummy: false,
            transports,
        }
    }

    /// Empty cover message.
    pub fn dummy(
        is_request: bool,
        length: u64,
        owner: NodeId,
        destination: NodeId,
        now: VirtualTime,
    ) -> Self {
        Self {
            header: MessageHeader::new(is_request, length, owner, destination, now),
            dummy: true,
            transports: Vec::new(),
        }
    }
}

/// Either message variant, as it arrives at a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMessage {
    Transport(TransportMessage),
    Mix(MixMessage),
}

impl NetworkMessage {
    pub fn header(&self) -> &MessageHeader {
        match self {
            NetworkMessage::Transport(message) => &message.header,
            NetworkMessage::Mix(message) => &message.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut MessageHeader {
        match self {
            NetworkMessage::Transport(message) => &mut message.header,
            NetworkMessage::Mix(message) => &mut message.header,
        }
    }

    /// The transport messages this message carries.
    pub fn into_transports(self) -> Vec<TransportMessage> {
        match self {
            NetworkMessage::Transport(message) => vec![message],
            NetworkMessage::Mix(message) => message.transports,
        }
    }
}

impl From<TransportMessage> for NetworkMessage {
    fn from(message: TransportMessage) -> Self {
        NetworkMessage::Transport(message)
    }
}

impl From<MixMessage> for NetworkMessage {
    fn from(message: MixMessage) -> Self {
        NetworkMessage::Mix(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(is_request: bool, length: u64) -> MessageHeader {
        MessageHeader::new(is_request, length, NodeId(0), NodeId(3), Duration::ZERO)
    }

    #[test]
    fn test_route_key_follows_direction() {
        assert_eq!(header(true, 1).route_key(), NodeId(3));
        assert_eq!(header(false, 1).route_key(), NodeId(0));
    }

    #[test]
    fn test_bundle_size_and_direction() {
        let transports = vec![
            TransportMessage::request(header(true, 100), 0, 0, Vec::new()),
            TransportMessage::request(header(true, 50), 1, 1, Vec::new()),
        ];
        let bundle = MixMessage::bundle(transports, 16, NodeId(0), NodeId(3), Duration::ZERO);
        assert_eq!(bundle.header.length, 166);
        assert!(bundle.header.is_request);
        assert!(!bundle.dummy);
        assert_eq!(NetworkMessage::from(bundle).into_transports().len(), 2);
    }

    #[test]
    fn test_last_reply() {
        let reply = TransportMessage::reply(header(false, 10), 5, 2, 1);
        assert!(reply.is_last_reply(2));
        assert!(!reply.is_last_reply(3));
    }
}
