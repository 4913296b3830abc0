//! Discrete-event simulation core.
//!
//! This module contains the virtual clock, the event type, the scheduler
//! that drains pending events in time order, and the per-run context that
//! owns every mutable counter of a run.

pub mod context;
pub mod error;
pub mod event;
pub mod scheduler;

use std::time::Duration;

pub use context::{IdAllocator, RunContext};
pub use error::SimError;
pub use event::{ControlEvent, Event, EventKind, Target};
pub use scheduler::Scheduler;

/// Simulation time. Advanced only by executing events, never by the wall clock.
pub type VirtualTime = Duration;

/// Convert a virtual time span to fractional milliseconds for statistics.
pub fn as_millis_f64(time: VirtualTime) -> f64 {
    time.as_secs_f64() * 1000.0
}
