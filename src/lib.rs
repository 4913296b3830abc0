//! # MixSim - Discrete-event simulator for mix network performance
//!
//! This library simulates clients that exchange request/reply transactions
//! with a distant proxy, either directly or through a cascade of mixes, and
//! measures latency and traffic under a virtual clock.
//!
//! ## Architecture
//!
//! - `sim`: virtual clock, events, scheduler and per-run context
//! - `network`: messages, delay boxes, connections and routing tables
//! - `node`: client, mix, distant proxy and server behaviour
//! - `plugin`: output strategies, send styles and traffic models
//! - `statistics`: recording, cross-entity collection and result sets
//! - `topology`: connection planning and node construction for one run
//! - `simulator`: the event loop of one run
//! - `config` / `config_loader`: YAML experiment files and the varying parameter
//! - `orchestrator`: runs every (value, run) pair and assembles the results
//! - `report`: JSON, text and plot table output
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use mixsim::config_loader::load_config;
//! use mixsim::orchestrator::run_experiment;
//!
//! let config = load_config(Path::new("experiment.yaml"))?;
//! let results = run_experiment(&config)?;
//! assert!(results.is_complete());
//! # Ok::<(), color_eyre::Report>(())
//! ```

pub mod config;
pub mod config_loader;
pub mod network;
pub mod node;
pub mod orchestrator;
pub mod plugin;
pub mod report;
pub mod sim;
pub mod simulator;
pub mod statistics;
pub mod topology;

pub use config::Config;
pub use simulator::{EndReason, RunOutcome, Simulator};
pub use statistics::ResultSet;
