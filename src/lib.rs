//! Block-oriented discrete-time simulation engine.
//!
//! A simulation is a directed graph of models connected by typed signals.
//! Build it with [`graph::ModelGraph`], [`finalize`](graph::ModelGraph::finalize)
//! it into a [`rt::Simulation`], then step it one cycle at a time. Every cycle
//! executes each model once, producers before consumers, and each signal moves
//! one block of up to its maximum block size.

pub mod config;
pub mod error;
pub mod graph;
#[doc(hidden)]
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod model;
pub mod models;
pub mod plan;
pub mod rt;
pub mod signal;

pub use config::SimConfig;
pub use error::{ConfigError, SimError};
pub use graph::ModelGraph;
pub use model::{ExecContext, ExecStatus, InitContext, ModelId, Ports, PracSimModel};
pub use rt::{CycleReport, RunSummary, Simulation};
pub use signal::{Sample, SampleKind, Signal, SignalId};
