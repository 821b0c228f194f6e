use pracsim::models::{Gain, RateChanger, RateChangerParams, VectorSource};
use pracsim::{
    ExecContext, ExecStatus, ModelGraph, Ports, PracSimModel, SimError, Signal,
};
use proptest::prelude::*;

/// Claims one sample more than its output can hold on the given cycle.
struct Overrun {
    input: Signal<f32>,
    output: Signal<f32>,
    on_cycle: u64,
}

impl Overrun {
    fn build(
        ports: &mut Ports<'_>,
        input: Signal<f32>,
        output: Signal<f32>,
        on_cycle: u64,
    ) -> Result<Self, SimError> {
        ports.declare_as_input(input)?;
        ports.declare_as_output(output)?;
        Ok(Self {
            input,
            output,
            on_cycle,
        })
    }
}

impl PracSimModel for Overrun {
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let n = ctx.valid_length(self.input)?;
        let n = if ctx.cycle() == self.on_cycle {
            ctx.max_block_size(self.output)? + 1
        } else {
            n
        };
        ctx.set_valid_length(self.output, n)?;
        Ok(ExecStatus::Complete)
    }
}

/// Panics on the given cycle.
struct Fuse {
    input: Signal<f32>,
    on_cycle: u64,
}

impl PracSimModel for Fuse {
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let block = ctx.read_view(self.input)?;
        if ctx.cycle() == self.on_cycle {
            panic!("fuse blown with {} samples pending", block.len());
        }
        Ok(ExecStatus::Complete)
    }
}

fn source(graph: &mut ModelGraph, block: usize) -> Signal<f32> {
    let x = graph.float_signal("x");
    graph.anchor(x, 1.0, block).unwrap();
    graph
        .add_model("src", None, |p| VectorSource::repeating(p, x, vec![0.5, -0.5, 0.25]))
        .unwrap();
    x
}

#[test]
fn overrun_is_reported_and_poisons() {
    let mut graph = ModelGraph::new();
    let x = source(&mut graph, 8);
    let y = graph.float_signal("y");
    graph
        .add_model("overrun", None, |p| Overrun::build(p, x, y, 1))
        .unwrap();
    let mut sim = graph.finalize().unwrap();
    sim.step().unwrap();
    match sim.step().unwrap_err() {
        SimError::BlockSizeExceeded {
            signal,
            requested,
            max,
        } => {
            assert_eq!(signal, "y");
            assert_eq!((requested, max), (9, 8));
        }
        other => panic!("unexpected error: {other}"),
    }
    // the failed call left the previous length in place
    assert_eq!(sim.valid_length(y).unwrap(), 8);
    assert!(matches!(sim.step(), Err(SimError::Poisoned)));
}

#[test]
fn contained_panic_is_reported_once() {
    let mut graph = ModelGraph::new();
    let x = source(&mut graph, 4);
    graph
        .add_model("fuse", None, |p| {
            p.declare_as_input(x)?;
            Ok(Fuse {
                input: x,
                on_cycle: 3,
            })
        })
        .unwrap();
    let mut sim = graph.finalize().unwrap();
    for _ in 0..3 {
        sim.step_contained().unwrap();
    }
    match sim.step_contained().unwrap_err() {
        SimError::ModelPanicked { model, cycle } => {
            assert_eq!(model, "fuse");
            assert_eq!(cycle, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sim.is_poisoned());
    assert!(matches!(sim.step_contained(), Err(SimError::Poisoned)));
    // teardown still runs after a contained failure
    sim.teardown().unwrap();
}

proptest! {
    #[test]
    fn rt_no_panic_fuzz(block in 1usize..64, gain in -4.0f32..4.0, decim in 1usize..9, cycles in 1u64..20) {
        let mut graph = ModelGraph::new();
        let x = source(&mut graph, block);
        let (y, z) = (graph.float_signal("y"), graph.float_signal("z"));
        graph.add_model("gain", None, |p| Gain::new(p, x, y, gain)).unwrap();
        graph
            .add_model("down", None, |p| {
                RateChanger::new(p, y, z, RateChangerParams::decimate(decim))
            })
            .unwrap();
        let mut sim = graph.finalize().unwrap();
        for _ in 0..cycles {
            let report = sim.step_contained();
            prop_assert!(report.is_ok(), "cycle failed: {:?}", report);
            prop_assert!(sim.valid_length(z).unwrap() <= sim.block_size(z).unwrap());
        }
    }
}
