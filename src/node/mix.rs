//! Mix node.

use log::trace;

use crate::network::{MixMessage, NetworkMessage, NetworkNode, TransportMessage};
use crate::node::{ClientEvent, Env, MixEvent, ProxyEvent};
use crate::plugin::{MixOutbox, OutputStrategy};
use crate::sim::{as_millis_f64, Event, SimError, Target, VirtualTime};
use crate::statistics::{SampleStat, TrialStat};

/// Position of a mix in the cascade and its per-message costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixRole {
    /// Neighbours the clients.
    pub first: bool,
    /// Neighbours the distant proxy.
    pub last: bool,
    pub request_processing_time: VirtualTime,
    pub reply_processing_time: VirtualTime,
    /// Whether the proxy accepts bundled (possibly dummy) mix messages.
    pub receiver_supports_dummy_traffic: bool,
}

#[derive(Debug)]
pub struct Mix {
    pub node: NetworkNode,
    role: MixRole,
    output: Box<dyn OutputStrategy>,
}

impl Mix {
    pub fn new(node: NetworkNode, role: MixRole, output: Box<dyn OutputStrategy>) -> Self {
        Self { node, role, output }
    }

    pub fn is_first(&self) -> bool {
        self.role.first
    }

    pub fn is_last(&self) -> bool {
        self.role.last
    }

    pub fn execute(&mut self, event: MixEvent, env: &mut Env<'_>) -> Result<(), SimError> {
        let name = event.name();
        match event {
            MixEvent::IncomingRequest(message) => {
                self.expect_direction(message.header.is_request, true, name)?;
                let time = env.scheduler.now() + self.role.request_processing_time;
                env.scheduler.schedule(Event::new(
                    Target::Node(self.node.id),
                    time,
                    MixEvent::ProcessedRequest(message),
                ))
            }
            MixEvent::ProcessedRequest(message) => {
                self.expect_direction(message.header.is_request, true, name)?;
                let mut outbox = MixOutbox::default();
                self.output
                    .incoming_request(message, env.scheduler.now(), &mut outbox);
                self.flush(outbox, env)
            }
            MixEvent::IncomingReply(message) => {
                self.expect_direction(message.header.is_request, false, name)?;
                let time = env.scheduler.now() + self.role.reply_processing_time;
                env.scheduler.schedule(Event::new(
                    Target::Node(self.node.id),
                    time,
                    MixEvent::ProcessedReply(message),
                ))
            }
            MixEvent::ProcessedReply(message) => {
                self.expect_direction(message.header.is_request, false, name)?;
                let mut outbox = MixOutbox::default();
                self.output
                    .incoming_reply(message, env.scheduler.now(), &mut outbox);
                self.flush(outbox, env)
            }
            MixEvent::ReplyFromDistantProxy(reply) => self.reply_from_distant_proxy(reply, name, env),
        }
    }

    fn expect_direction(
        &self,
        is_request: bool,
        expected: bool,
        event: &'static str,
    ) -> Result<(), SimError> {
        if is_request == expected {
            Ok(())
        } else {
            Err(SimError::DirectionMismatch {
                node: self.node.identifier.clone(),
                event,
                is_request,
            })
        }
    }

    fn reply_from_distant_proxy(
        &mut self,
        reply: TransportMessage,
        name: &'static str,
        env: &mut Env<'_>,
    ) -> Result<(), SimError> {
        self.expect_direction(reply.header.is_request, false, name)?;
        let unexpected = || SimError::UnexpectedEvent {
            node: self.node.identifier.clone(),
            event: name,
        };
        if !self.role.last {
            return Err(unexpected());
        }
        let now = env.scheduler.now();
        let mut outbox = MixOutbox::default();
        let style = self.output.mix_send_style().ok_or_else(unexpected)?;
        style.incoming_data_from_server(reply, now, &mut outbox);
        self.flush(outbox, env)
    }

    fn flush(&mut self, outbox: MixOutbox, env: &mut Env<'_>) -> Result<(), SimError> {
        let (requests, replies) = outbox.into_parts();
        for request in requests {
            self.put_out_request(request, env)?;
        }
        for reply in replies {
            self.put_out_reply(reply, env)?;
        }
        Ok(())
    }

    /// Forward a processed request towards the proxy.
    ///
    /// A last mix in front of a proxy that does not understand mix messages
    /// unbundles them and sends every transport message on its own; dummies
    /// end there.
    pub fn put_out_request(&mut self, message: MixMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        let stats = self.node.statistics;
        env.ctx
            .statistics
            .add_trial(stats, TrialStat::MixOutputDummy, message.dummy)?;

        if !self.role.last {
            return self.node.send_to_next_hop(
                MixEvent::IncomingRequest(message),
                VirtualTime::ZERO,
                env.scheduler,
            );
        }

        let now = env.scheduler.now();
        for transport in &message.transports {
            let latency = now.saturating_sub(transport.header.creation_time);
            env.ctx
                .statistics
                .add_sample(stats, SampleStat::MixRequestLatencyMs, as_millis_f64(latency))?;
        }

        if self.role.receiver_supports_dummy_traffic {
            return self.node.send_to_next_hop(
                ProxyEvent::IncomingMixRequest(message),
                VirtualTime::ZERO,
                env.scheduler,
            );
        }
        if message.dummy {
            trace!("{} dropping dummy at the exit", self.node.identifier);
            return Ok(());
        }
        for transport in message.transports {
            self.node.send_to_next_hop(
                ProxyEvent::IncomingRequest(transport),
                VirtualTime::ZERO,
                env.scheduler,
            )?;
        }
        Ok(())
    }

    /// Forward a processed reply towards its client.
    pub fn put_out_reply(&mut self, message: MixMessage, env: &mut Env<'_>) -> Result<(), SimError> {
        if self.role.first {
            self.node.send_to_previous_hop(
                ClientEvent::IncomingReply(NetworkMessage::Mix(message)),
                VirtualTime::ZERO,
                env.scheduler,
            )
        } else {
            self.node.send_to_previous_hop(
                MixEvent::IncomingReply(message),
                VirtualTime::ZERO,
                env.scheduler,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::network::{BasicDelayBox, ConnectionId, MessageHeader, NodeId};
    use crate::plugin::PassThroughOutput;
    use crate::sim::{EventKind, RunContext, Scheduler};
    use crate::statistics::{Aggregator, StatisticsCatalog};

    const PROXY: NodeId = NodeId(9);

    fn mix(ctx: &mut RunContext, first: bool, last: bool, dummies: bool) -> Mix {
        let stats = ctx.statistics.register("mix-0");
        let mut node = NetworkNode::new(
            "mix-0",
            NodeId(4),
            Box::new(BasicDelayBox::new(Duration::ZERO, None, None)),
            stats,
        );
        node.add_outbound(PROXY, ConnectionId(7));
        node.add_inbound(NodeId(0), ConnectionId(1));
        let role = MixRole {
            first,
            last,
            request_processing_time: Duration::from_micros(500),
            reply_processing_time: Duration::from_micros(250),
            receiver_supports_dummy_traffic: dummies,
        };
        Mix::new(node, role, Box::new(PassThroughOutput::new(16)))
    }

    fn bundle(n: u64, created: Duration) -> MixMessage {
        let transports = (0..n)
            .map(|i| {
                let header = MessageHeader::new(true, 100, NodeId(0), PROXY, created);
                TransportMessage::request(header, i, i, Vec::new())
            })
            .collect();
        MixMessage::bundle(transports, 16, NodeId(0), PROXY, created)
    }

    fn drain(scheduler: &mut Scheduler) -> Vec<Event> {
        std::iter::from_fn(|| scheduler.next_event()).collect()
    }

    #[test]
    fn test_last_mix_unbundles_for_plain_proxy() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        ctx.statistics.start_recording();
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(Event::new(
                Target::Simulator,
                Duration::from_millis(30),
                crate::sim::ControlEvent::StartRecording,
            ))
            .unwrap();
        scheduler.next_event();
        let mut mix = mix(&mut ctx, true, true, false);

        let mut env = Env {
            scheduler: &mut scheduler,
            ctx: &mut ctx,
        };
        mix.put_out_request(bundle(3, Duration::from_millis(10)), &mut env)
            .unwrap();

        let events = drain(&mut scheduler);
        assert_eq!(events.len(), 3);
        for event in events {
            assert_eq!(event.target(), Target::Connection(ConnectionId(7)));
            assert!(matches!(
                event.into_kind(),
                EventKind::Proxy(ProxyEvent::IncomingRequest(_))
            ));
        }
        let stats = ctx.statistics.get(mix.node.statistics).unwrap();
        assert_eq!(
            stats.values(SampleStat::MixRequestLatencyMs.into()),
            Some(crate::statistics::RecordedValues::Samples(vec![20.0; 3]))
        );
        assert_eq!(
            stats
                .result(TrialStat::MixOutputDummy.into(), Aggregator::Percentage)
                .unwrap(),
            Some(0.0)
        );
    }

    #[test]
    fn test_dummy_is_dropped_at_exit() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        let mut scheduler = Scheduler::new();
        let mut mix = mix(&mut ctx, false, true, false);
        let mut env = Env {
            scheduler: &mut scheduler,
            ctx: &mut ctx,
        };
        let dummy = MixMessage::dummy(true, 116, NodeId(0), PROXY, Duration::ZERO);
        mix.put_out_request(dummy, &mut env).unwrap();
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_last_mix_keeps_bundle_for_dummy_aware_proxy() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        let mut scheduler = Scheduler::new();
        let mut mix = mix(&mut ctx, false, true, true);
        let mut env = Env {
            scheduler: &mut scheduler,
            ctx: &mut ctx,
        };
        mix.put_out_request(bundle(2, Duration::ZERO), &mut env).unwrap();

        let events = drain(&mut scheduler);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events.into_iter().next().map(Event::into_kind),
            Some(EventKind::Proxy(ProxyEvent::IncomingMixRequest(_)))
        ));
    }

    #[test]
    fn test_processing_time_and_reply_path() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        let mut scheduler = Scheduler::new();
        let mut mix = mix(&mut ctx, true, false, false);

        let mut reply = bundle(1, Duration::ZERO);
        reply.header.is_request = false;
        let mut env = Env {
            scheduler: &mut scheduler,
            ctx: &mut ctx,
        };
        mix.execute(MixEvent::IncomingReply(reply), &mut env).unwrap();

        let processed = scheduler.next_event().unwrap();
        assert_eq!(processed.time(), Duration::from_micros(250));
        assert_eq!(processed.target(), Target::Node(NodeId(4)));
        let EventKind::Mix(event) = processed.into_kind() else {
            panic!("expected a mix event");
        };
        let mut env = Env {
            scheduler: &mut scheduler,
            ctx: &mut ctx,
        };
        mix.execute(event, &mut env).unwrap();

        let out = scheduler.next_event().unwrap();
        assert_eq!(out.target(), Target::Connection(ConnectionId(1)));
        assert!(matches!(
            out.into_kind(),
            EventKind::Client(ClientEvent::IncomingReply(NetworkMessage::Mix(_)))
        ));
    }

    #[test]
    fn test_direction_mismatch_is_fatal() {
        let mut ctx = RunContext::new(0, Arc::new(StatisticsCatalog::default()));
        let mut scheduler = Scheduler::new();
        let mut mix = mix(&mut ctx, true, true, false);
        let mut env = Env {
            scheduler: &mut scheduler,
            ctx: &mut ctx,
        };
        let result = mix.execute(MixEvent::IncomingReply(bundle(1, Duration::ZERO)), &mut env);
        assert!(matches!(result, Err(SimError::DirectionMismatch { .. })));

        let mut middle = Mix::new(
            NetworkNode::new(
                "mix-1",
                NodeId(5),
                Box::new(BasicDelayBox::new(Duration::ZERO, None, None)),
                env.ctx.statistics.register("mix-1"),
            ),
            MixRole {
                first: false,
                last: false,
                request_processing_time: Duration::ZERO,
                reply_processing_time: Duration::ZERO,
                receiver_supports_dummy_traffic: false,
            },
            Box::new(PassThroughOutput::new(16)),
        );
        let header = MessageHeader::new(false, 10, NodeId(0), PROXY, Duration::ZERO);
        let result = middle.execute(
            MixEvent::ReplyFromDistantProxy(TransportMessage::reply(header, 0, 0, 0)),
            &mut env,
        );
        assert!(matches!(result, Err(SimError::UnexpectedEvent { .. })));
    }
}
