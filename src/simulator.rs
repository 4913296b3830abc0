//! One simulation run: topology, scheduler and the event loop.

use std::sync::Arc;

use log::{debug, info, trace};

use crate::config::Config;
use crate::network::NodeId;
use crate::node::{Env, Node};
use crate::sim::{ControlEvent, Event, EventKind, RunContext, Scheduler, SimError, Target};
use crate::statistics::{GeneralStatistics, RunRecord, StatisticsCatalog};
use crate::topology::{build_topology, Topology};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The configured stop time was reached.
    StopTime,
    /// Every client with a finite budget voted for stop.
    AllVoted,
    /// No event was left to execute.
    QueueDrained,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub record: RunRecord,
    pub end_reason: EndReason,
}

/// A single run. Owns everything the run mutates.
#[derive(Debug)]
pub struct Simulator {
    scheduler: Scheduler,
    ctx: RunContext,
    topology: Topology,
    stop_time_reached: bool,
}

impl Simulator {
    /// Build the topology, schedule the recording window and start every
    /// client.
    pub fn new(
        config: &Config,
        seed: u64,
        catalog: Arc<StatisticsCatalog>,
    ) -> Result<Self, SimError> {
        let mut ctx = RunContext::new(seed, catalog);
        let topology = build_topology(config, &mut ctx)?;
        let mut scheduler = Scheduler::new();

        scheduler.schedule(Event::new(
            Target::Simulator,
            config.general.start_recording,
            EventKind::Control(ControlEvent::StartRecording),
        ))?;
        if let Some(stop_time) = config.general.stop_time {
            scheduler.schedule(Event::new(
                Target::Simulator,
                stop_time,
                EventKind::Control(ControlEvent::StopRecording),
            ))?;
        }

        let mut simulator = Self {
            scheduler,
            ctx,
            topology,
            stop_time_reached: false,
        };
        let clients: Vec<NodeId> = simulator.topology.clients().to_vec();
        for id in clients {
            let mut env = Env {
                scheduler: &mut simulator.scheduler,
                ctx: &mut simulator.ctx,
            };
            if let Node::Client(client) = simulator.topology.node_mut(id)? {
                client.start(&mut env)?;
            }
        }
        debug!("Run seeded with {}, {} events pending", seed, simulator.scheduler.pending());
        Ok(simulator)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Execute events until the run stops, then collect its statistics.
    pub fn run(mut self) -> Result<RunOutcome, SimError> {
        while let Some(event) = self.scheduler.next_event() {
            self.dispatch(event)?;
        }

        let end_reason = if self.stop_time_reached {
            EndReason::StopTime
        } else if self.scheduler.all_voted() {
            EndReason::AllVoted
        } else {
            EndReason::QueueDrained
        };
        if self.ctx.statistics.is_recording() {
            self.ctx.statistics.stop_recording();
        }

        let now = self.scheduler.now();
        info!(
            "Run finished at {:?} ({:?}), {} events executed, {} still pending",
            now,
            end_reason,
            self.scheduler.executed_events(),
            self.scheduler.pending()
        );

        let record = RunRecord {
            values: GeneralStatistics::snapshot(&self.ctx.statistics)?,
            simulated_duration: now,
            clients: self.topology.clients().len(),
            mixes: self.topology.mixes().len(),
            executed_events: self.scheduler.executed_events(),
        };
        Ok(RunOutcome { record, end_reason })
    }

    fn dispatch(&mut self, event: Event) -> Result<(), SimError> {
        trace!(
            "{:?} executing {} on {:?}",
            event.time(),
            event.kind().name(),
            event.target()
        );
        match event.target() {
            Target::Simulator => self.control(event.into_kind()),
            Target::Connection(id) => {
                let connection = self.topology.connection(id)?.clone();
                let arrived =
                    connection.cross(event, &self.topology, &mut self.scheduler, &mut self.ctx)?;
                match arrived {
                    Some(event) => self.dispatch(event),
                    None => Ok(()),
                }
            }
            Target::Node(id) => {
                let mut env = Env {
                    scheduler: &mut self.scheduler,
                    ctx: &mut self.ctx,
                };
                self.topology.node_mut(id)?.execute(event.into_kind(), &mut env)
            }
        }
    }

    fn control(&mut self, kind: EventKind) -> Result<(), SimError> {
        match kind {
            EventKind::Control(ControlEvent::StartRecording) => {
                self.ctx.statistics.start_recording();
                Ok(())
            }
            EventKind::Control(ControlEvent::StopRecording) => {
                self.ctx.statistics.stop_recording();
                self.stop_time_reached = true;
                self.scheduler.stop();
                Ok(())
            }
            other => Err(SimError::UnexpectedEvent {
                node: "simulator".to_string(),
                event: other.name(),
            }),
        }
    }
}
