//! Concrete topology participants.
//!
//! Every node kind has its own closed event enum. Events reaching a node of
//! another kind are wiring bugs and abort the run.

pub mod client;
pub mod mix;
pub mod proxy;
pub mod server;

use crate::network::{MixMessage, NetworkMessage, NetworkNode, TransportMessage};
use crate::sim::{EventKind, RunContext, Scheduler, SimError};

pub use client::Client;
pub use mix::Mix;
pub use proxy::{DistantProxy, ReplyRoute};
pub use server::Server;

/// Mutable run state a node may touch while executing an event.
pub struct Env<'a> {
    pub scheduler: &'a mut Scheduler,
    pub ctx: &'a mut RunContext,
}

#[derive(Debug)]
pub enum ClientEvent {
    /// Time for the traffic model to send its next request.
    SendNextRequest,
    /// A reply arrived, directly from the proxy or through the first mix.
    IncomingReply(NetworkMessage),
    /// The request of a transaction has been handed to the server.
    RequestReachedServer(TransportMessage),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendNextRequest => "CLIENT_SEND_NEXT_REQUEST",
            ClientEvent::IncomingReply(_) => "CLIENT_INCOMING_REPLY",
            ClientEvent::RequestReachedServer(_) => "CLIENT_REQUEST_REACHED_SERVER",
        }
    }
}

#[derive(Debug)]
pub enum MixEvent {
    IncomingRequest(MixMessage),
    ProcessedRequest(MixMessage),
    IncomingReply(MixMessage),
    ProcessedReply(MixMessage),
    /// A server reply relayed by the distant proxy to the last mix.
    ReplyFromDistantProxy(TransportMessage),
}

impl MixEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MixEvent::IncomingRequest(_) => "MIX_INCOMING_REQUEST",
            MixEvent::ProcessedRequest(_) => "MIX_PROCESSED_REQUEST",
            MixEvent::IncomingReply(_) => "MIX_INCOMING_REPLY",
            MixEvent::ProcessedReply(_) => "MIX_PROCESSED_REPLY",
            MixEvent::ReplyFromDistantProxy(_) => "MIX_REPLY_FROM_DISTANT_PROXY",
        }
    }
}

#[derive(Debug)]
pub enum ProxyEvent {
    /// A single transport message, unbundled by the last mix or sent
    /// directly by a client.
    IncomingRequest(TransportMessage),
    /// A mix message still bundling its transport messages.
    IncomingMixRequest(MixMessage),
    /// The server's reply is due.
    ReplyFromServer(TransportMessage),
}

impl ProxyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProxyEvent::IncomingRequest(_) => "PROXY_INCOMING_REQUEST",
            ProxyEvent::IncomingMixRequest(_) => "PROXY_INCOMING_MIX_REQUEST",
            ProxyEvent::ReplyFromServer(_) => "PROXY_REPLY_FROM_SERVER",
        }
    }
}

/// Any node of the topology.
#[derive(Debug)]
pub enum Node {
    Client(Client),
    Mix(Mix),
    Proxy(DistantProxy),
}

impl Node {
    pub fn network(&self) -> &NetworkNode {
        match self {
            Node::Client(client) => &client.node,
            Node::Mix(mix) => &mix.node,
            Node::Proxy(proxy) => &proxy.node,
        }
    }

    /// Execute an event addressed to this node.
    pub fn execute(&mut self, kind: EventKind, env: &mut Env<'_>) -> Result<(), SimError> {
        match (self, kind) {
            (Node::Client(client), EventKind::Client(event)) => client.execute(event, env),
            (Node::Mix(mix), EventKind::Mix(event)) => mix.execute(event, env),
            (Node::Proxy(proxy), EventKind::Proxy(event)) => proxy.execute(event, env),
            (node, kind) => Err(SimError::UnexpectedEvent {
                node: node.network().identifier.clone(),
                event: kind.name(),
            }),
        }
    }
}
