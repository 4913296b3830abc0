//! Distant proxy: the exit of the mix network.

use log::trace;

use crate::network::{MixMessage, NetworkMessage, NetworkNode, TransportMessage};
use crate::node::{ClientEvent, Env, MixEvent, ProxyEvent, Server};
use crate::sim::{Event, SimError, Target, VirtualTime};
use crate::statistics::{CounterStat, TrialStat};

/// Path server replies take back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyRoute {
    /// Straight over the client's direct connection.
    Direct,
    /// Through the last mix, which wraps them with its send style.
    ViaMixes,
}

#[derive(Debug)]
pub struct DistantProxy {
    pub node: NetworkNode,
    server: Server,
    reply_route: ReplyRoute,
    supports_dummy_traffic: bool,
}

impl DistantProxy {
    pub fn new(node: NetworkNode, reply_route: ReplyRoute, supports_dummy_traffic: bool) -> Self {
        Self {
            node,
            server: Server,
            reply_route,
            supports_dummy_traffic,
        }
    }

    pub fn execute(&mut self, event: ProxyEvent, env: &mut Env<'_>) -> Result<(), SimError> {
        match event {
            ProxyEvent::IncomingRequest(request) => {
                self.expect_request(request.header.is_request, "PROXY_INCOMING_REQUEST")?;
                env.ctx
                    .statistics
                    .add_trial(self.node.statistics, TrialStat::ProxyRequestBundled, false)?;
                self.terminate(request, env)
            }
            ProxyEvent::IncomingMixRequest(message) => self.unbundle(message, env),
            ProxyEvent::ReplyFromServer(reply) => self.relay_reply(reply, env),
        }
    }

    fn expect_request(&self, is_request: bool, event: &'static str) -> Result<(), SimError> {
        if is_request {
            Ok(())
        } else {
            Err(SimError::DirectionMismatch {
                node: self.node.identifier.clone(),
                event,
                is_request,
            })
        }
    }

    /// Bundled requests only reach a proxy that speaks the mix protocol.
    fn unbundle(&mut self, message: MixMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        const EVENT: &str = "PROXY_INCOMING_MIX_REQUEST";
        if !self.supports_dummy_traffic {
            return Err(SimError::UnexpectedEvent {
                node: self.node.identifier.clone(),
                event: EVENT,
            });
        }
        self.expect_request(message.header.is_request, EVENT)?;

        if message.dummy {
            trace!("{} discarding dummy", self.node.identifier);
            return env
                .ctx
                .statistics
                .count(self.node.statistics, CounterStat::ProxyDummiesDiscarded, 1)
                .map_err(SimError::from);
        }
        for request in message.transports {
            env.ctx
                .statistics
                .add_trial(self.node.statistics, TrialStat::ProxyRequestBundled, true)?;
            self.terminate(request, env)?;
        }
        Ok(())
    }

    /// Hand a request to the server and tell its client it got there.
    fn terminate(&mut self, request: TransportMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        env.ctx
            .statistics
            .count(self.node.statistics, CounterStat::ProxyRequestsReceived, 1)?;

        let now = env.scheduler.now();
        for (delay, reply) in self.server.incoming_message(&request, now, &mut env.ctx.ids) {
            self.send_reply_in(delay, reply, env)?;
        }

        let owner = request.header.owner;
        env.scheduler.schedule(Event::new(
            Target::Node(owner),
            now,
            ClientEvent::RequestReachedServer(request),
        ))
    }

    /// Schedule a server reply `delay` from now.
    pub fn send_reply_in(
        &self,
        delay: VirtualTime,
        reply: TransportMessage,
        env: &mut Env<'_>,
    ) -> Result<(), SimError> {
        let time = env.scheduler.now() + delay;
        env.scheduler.schedule(Event::new(
            Target::Node(self.node.id),
            time,
            ProxyEvent::ReplyFromServer(reply),
        ))
    }

    fn relay_reply(&mut self, reply: TransportMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        if reply.header.is_request {
            return Err(SimError::DirectionMismatch {
                node: self.node.identifier.clone(),
                event: "PROXY_REPLY_FROM_SERVER",
                is_request: true,
            });
        }
        match self.reply_route {
            ReplyRoute::Direct => self.node.send_to_previous_hop(
                ClientEvent::IncomingReply(NetworkMessage::Transport(reply)),
                VirtualTime::ZERO,
                env.scheduler,
            ),
            ReplyRoute::ViaMixes => self.node.send_to_previous_hop(
                MixEvent::ReplyFromDistantProxy(reply),
                VirtualTime::ZERO,
                env.scheduler,
            ),
        }
    }
}
