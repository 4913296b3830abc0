//! Pluggable node policies.
//!
//! The nodes only route and account; every decision about *what* to send
//! is delegated to one of these traits. Implementations never touch the
//! scheduler directly. They push the messages they want emitted into an
//! outbox, and the owning node forwards them.

pub mod output;
pub mod send_style;
pub mod traffic;

use std::fmt::Debug;

use rand::rngs::StdRng;

use crate::network::{MixMessage, NetworkMessage, ReplySpec, TransportMessage};
use crate::sim::VirtualTime;

pub use output::{PassThroughOutput, PassThroughReplyStyle};
pub use send_style::PassThroughClientStyle;
pub use traffic::{ClosedLoop, ConstantRate};

/// Messages a mix policy wants to put out.
#[derive(Debug, Default)]
pub struct MixOutbox {
    requests: Vec<MixMessage>,
    replies: Vec<MixMessage>,
}

impl MixOutbox {
    pub fn push_request(&mut self, message: MixMessage) {
        self.requests.push(message);
    }

    pub fn push_reply(&mut self, message: MixMessage) {
        self.replies.push(message);
    }

    pub fn into_parts(self) -> (Vec<MixMessage>, Vec<MixMessage>) {
        (self.requests, self.replies)
    }
}

/// Messages a client send style produced.
#[derive(Debug, Default)]
pub struct ClientOutbox {
    to_mixes: Vec<MixMessage>,
    delivered: Vec<TransportMessage>,
}

impl ClientOutbox {
    /// Queue a mix message for the first mix.
    pub fn send(&mut self, message: MixMessage) {
        self.to_mixes.push(message);
    }

    /// Hand a decrypted reply to the client's traffic model.
    pub fn deliver(&mut self, reply: TransportMessage) {
        self.delivered.push(reply);
    }

    pub fn into_parts(self) -> (Vec<MixMessage>, Vec<TransportMessage>) {
        (self.to_mixes, self.delivered)
    }
}

/// When and what a mix emits.
pub trait OutputStrategy: Debug + Send {
    fn incoming_request(&mut self, request: MixMessage, now: VirtualTime, outbox: &mut MixOutbox);
    fn incoming_reply(&mut self, reply: MixMessage, now: VirtualTime, outbox: &mut MixOutbox);
    /// Reply wrapper used when this strategy runs on the last mix.
    fn mix_send_style(&mut self) -> Option<&mut dyn MixSendStyle>;
}

/// Turns server replies into mix messages at the last mix.
pub trait MixSendStyle: Debug + Send {
    fn incoming_data_from_server(
        &mut self,
        reply: TransportMessage,
        now: VirtualTime,
        outbox: &mut MixOutbox,
    );
}

/// Client side of the mix protocol.
pub trait ClientSendStyle: Debug + Send {
    fn incoming_request_from_user(
        &mut self,
        request: TransportMessage,
        now: VirtualTime,
        outbox: &mut ClientOutbox,
    );
    fn incoming_decrypted_reply(&mut self, reply: NetworkMessage, outbox: &mut ClientOutbox);
}

/// Payload of the next request a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub size: u64,
    pub replies: Vec<ReplySpec>,
}

/// Traffic generation of one client.
pub trait TrafficModel: Debug + Send {
    /// Delay between the start of the run and the first request.
    fn initial_delay(&mut self, rng: &mut StdRng) -> VirtualTime;
    fn next_request(&mut self) -> RequestSpec;
    /// Delay until the next request once one has been sent, for open-loop
    /// models.
    fn after_send(&mut self) -> Option<VirtualTime>;
    /// Delay until the next request once a transaction has completed, for
    /// closed-loop models.
    fn after_transaction(&mut self) -> Option<VirtualTime>;
    /// Number of requests to send, unbounded if `None`.
    fn budget(&self) -> Option<u64>;
}
