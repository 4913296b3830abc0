//! Client node: the traffic source.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::network::{MessageHeader, NetworkMessage, NetworkNode, NodeId, TransportMessage};
use crate::node::{ClientEvent, Env, MixEvent, ProxyEvent};
use crate::plugin::{ClientOutbox, ClientSendStyle, TrafficModel};
use crate::sim::{as_millis_f64, SimError, Target, VirtualTime};
use crate::statistics::{CounterStat, SampleStat};

/// A transaction waiting for its replies.
#[derive(Debug, Clone, Copy)]
struct Outstanding {
    created: VirtualTime,
    expected_replies: usize,
    received_replies: usize,
    reached_server: bool,
}

impl Outstanding {
    fn is_complete(&self) -> bool {
        self.reached_server && self.received_replies >= self.expected_replies
    }
}

#[derive(Debug)]
pub struct Client {
    pub node: NetworkNode,
    proxy: NodeId,
    /// Requests bypass the mixes and go straight to the proxy.
    direct_requests: bool,
    send_style: Box<dyn ClientSendStyle>,
    traffic: Box<dyn TrafficModel>,
    outstanding: BTreeMap<u64, Outstanding>,
    sent: u64,
    voted: bool,
}

impl Client {
    pub fn new(
        node: NetworkNode,
        proxy: NodeId,
        direct_requests: bool,
        send_style: Box<dyn ClientSendStyle>,
        traffic: Box<dyn TrafficModel>,
    ) -> Self {
        Self {
            node,
            proxy,
            direct_requests,
            send_style,
            traffic,
            outstanding: BTreeMap::new(),
            sent: 0,
            voted: false,
        }
    }

    pub fn requests_sent(&self) -> u64 {
        self.sent
    }

    pub fn outstanding_transactions(&self) -> usize {
        self.outstanding.len()
    }

    /// Register for stop voting if the traffic is finite and schedule the
    /// first request.
    pub fn start(&mut self, env: &mut Env<'_>) -> Result<(), SimError> {
        if self.traffic.budget().is_some() {
            env.scheduler.register_voter(self.node.id);
        }
        let delay = self.traffic.initial_delay(&mut env.ctx.rng);
        env.scheduler
            .schedule_in(delay, Target::Node(self.node.id), ClientEvent::SendNextRequest)?;
        self.vote_if_done(env);
        Ok(())
    }

    pub fn execute(&mut self, event: ClientEvent, env: &mut Env<'_>) -> Result<(), SimError> {
        match event {
            ClientEvent::SendNextRequest => self.send_next_request(env),
            ClientEvent::RequestReachedServer(request) => self.request_reached_server(request, env),
            ClientEvent::IncomingReply(message) => self.incoming_reply(message, env),
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.traffic.budget().is_some_and(|budget| self.sent >= budget)
    }

    fn send_next_request(&mut self, env: &mut Env<'_>) -> Result<(), SimError> {
        if self.budget_exhausted() {
            return Ok(());
        }
        self.send_message(env)?;
        if let Some(delay) = self.traffic.after_send() {
            if !self.budget_exhausted() {
                env.scheduler.schedule_in(
                    delay,
                    Target::Node(self.node.id),
                    ClientEvent::SendNextRequest,
                )?;
            }
        }
        Ok(())
    }

    /// Create the next request, account for it and hand it to the network.
    pub fn send_message(&mut self, env: &mut Env<'_>) -> Result<(), SimError> {
        let now = env.scheduler.now();
        let spec = self.traffic.next_request();
        let header = MessageHeader::new(true, spec.size, self.node.id, self.proxy, now);
        let transaction_id = env.ctx.ids.transaction();
        let request = TransportMessage::request(
            header,
            env.ctx.ids.message(),
            transaction_id,
            spec.replies,
        );

        let stats = self.node.statistics;
        env.ctx
            .statistics
            .count(stats, CounterStat::ClientRequestsSent, 1)?;
        env.ctx
            .statistics
            .count(stats, CounterStat::ClientPayloadBytesSent, spec.size)?;
        self.outstanding.insert(
            transaction_id,
            Outstanding {
                created: now,
                expected_replies: request.replies.len(),
                received_replies: 0,
                reached_server: false,
            },
        );
        self.sent += 1;
        trace!(
            "{} sends transaction {} ({} bytes)",
            self.node.identifier,
            transaction_id,
            spec.size
        );

        if self.direct_requests {
            return self.node.send_to_next_hop(
                ProxyEvent::IncomingRequest(request),
                VirtualTime::ZERO,
                env.scheduler,
            );
        }
        let mut outbox = ClientOutbox::default();
        self.send_style
            .incoming_request_from_user(request, now, &mut outbox);
        let (to_mixes, delivered) = outbox.into_parts();
        for message in to_mixes {
            self.node.send_to_next_hop(
                MixEvent::IncomingRequest(message),
                VirtualTime::ZERO,
                env.scheduler,
            )?;
        }
        for reply in delivered {
            self.incoming_message(reply, env)?;
        }
        Ok(())
    }

    fn request_reached_server(
        &mut self,
        request: TransportMessage,
        env: &mut Env<'_>,
    ) -> Result<(), SimError> {
        let now = env.scheduler.now();
        let latency = now.saturating_sub(request.header.creation_time);
        env.ctx.statistics.add_sample(
            self.node.statistics,
            SampleStat::ClientRequestLatencyMs,
            as_millis_f64(latency),
        )?;
        if let Some(outstanding) = self.outstanding.get_mut(&request.transaction_id) {
            outstanding.reached_server = true;
        }
        self.complete_if_done(request.transaction_id, env)
    }

    fn incoming_reply(&mut self, message: NetworkMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        if message.header().is_request {
            return Err(SimError::DirectionMismatch {
                node: self.node.identifier.clone(),
                event: "CLIENT_INCOMING_REPLY",
                is_request: true,
            });
        }
        match message {
            NetworkMessage::Transport(reply) => self.incoming_message(reply, env),
            NetworkMessage::Mix(_) => {
                let mut outbox = ClientOutbox::default();
                self.send_style.incoming_decrypted_reply(message, &mut outbox);
                let (_, delivered) = outbox.into_parts();
                for reply in delivered {
                    self.incoming_message(reply, env)?;
                }
                Ok(())
            }
        }
    }

    /// One end-to-end reply arrived.
    fn incoming_message(&mut self, reply: TransportMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        let now = env.scheduler.now();
        let stats = self.node.statistics;
        env.ctx
            .statistics
            .count(stats, CounterStat::ClientRepliesReceived, 1)?;
        env.ctx
            .statistics
            .count(stats, CounterStat::ClientPayloadBytesReceived, reply.header.length)?;
        env.ctx.statistics.add_sample(
            stats,
            SampleStat::ClientReplyLatencyMs,
            as_millis_f64(now.saturating_sub(reply.header.creation_time)),
        )?;

        let Some(outstanding) = self.outstanding.get_mut(&reply.transaction_id) else {
            debug!(
                "{} got a reply for unknown transaction {}",
                self.node.identifier, reply.transaction_id
            );
            return Ok(());
        };
        outstanding.received_replies += 1;
        env.ctx.statistics.add_sample(
            stats,
            SampleStat::ClientRoundTripMs,
            as_millis_f64(now.saturating_sub(outstanding.created)),
        )?;
        self.complete_if_done(reply.transaction_id, env)
    }

    fn complete_if_done(&mut self, transaction_id: u64, env: &mut Env<'_>) -> Result<(), SimError> {
        let complete = self
            .outstanding
            .get(&transaction_id)
            .is_some_and(Outstanding::is_complete);
        if !complete {
            return Ok(());
        }
        self.outstanding.remove(&transaction_id);

        if let Some(delay) = self.traffic.after_transaction() {
            if !self.budget_exhausted() {
                env.scheduler.schedule_in(
                    delay,
                    Target::Node(self.node.id),
                    ClientEvent::SendNextRequest,
                )?;
            }
        }
        self.vote_if_done(env);
        Ok(())
    }

    fn vote_if_done(&mut self, env: &mut Env<'_>) {
        if !self.voted && self.budget_exhausted() && self.outstanding.is_empty() {
            self.voted = true;
            env.scheduler.vote_for_stop(self.node.id);
        }
    }
}
