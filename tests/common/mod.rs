//! Shared test models.
#![allow(dead_code)]

use pracsim::{
    ExecContext, ExecStatus, InitContext, ModelGraph, ModelId, Ports, PracSimModel, SimConfig,
    SimError, Signal,
};
use std::cell::RefCell;
use std::rc::Rc;

pub type Log = Rc<RefCell<Vec<String>>>;

/// Passes the first input's valid length to every output and logs each lifecycle call.
/// With no inputs it fills its outputs completely.
pub struct Relay {
    inputs: Vec<Signal<f32>>,
    outputs: Vec<Signal<f32>>,
    log: Log,
}

impl Relay {
    pub fn build(
        ports: &mut Ports<'_>,
        inputs: &[Signal<f32>],
        outputs: &[Signal<f32>],
        log: &Log,
    ) -> Result<Self, SimError> {
        for &s in inputs {
            ports.declare_as_input(s)?;
        }
        for &s in outputs {
            ports.declare_as_output(s)?;
        }
        Ok(Self {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            log: Rc::clone(log),
        })
    }
}

impl PracSimModel for Relay {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        self.log.borrow_mut().push(format!("init {}", ctx.name()));
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        self.log.borrow_mut().push(ctx.name().to_string());
        let upstream = match self.inputs.first() {
            Some(&s) => Some(ctx.valid_length(s)?),
            None => None,
        };
        for &o in &self.outputs {
            let n = match upstream {
                Some(n) => n,
                None => ctx.max_block_size(o)?,
            };
            ctx.set_valid_length(o, n)?;
        }
        Ok(ExecStatus::Complete)
    }
}

/// Graph whose unanchored sources default to `block` samples per cycle.
pub fn graph_with_default_block(block: usize) -> ModelGraph {
    ModelGraph::with_config(SimConfig::default().with_default_block_size(block))
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn add_relay(
    graph: &mut ModelGraph,
    name: &str,
    inputs: &[Signal<f32>],
    outputs: &[Signal<f32>],
    log: &Log,
) -> ModelId {
    graph
        .add_model(name, None, |p| Relay::build(p, inputs, outputs, log))
        .unwrap()
}

/// Names executed in the log, without initialization entries.
pub fn executed(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|e| !e.starts_with("init "))
        .cloned()
        .collect()
}

/// Route `tracing` output through the test harness capture.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
