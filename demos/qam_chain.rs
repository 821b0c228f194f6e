// demos/qam_chain.rs
use num_complex::Complex32;
use pracsim::models::{
    BitGenerator, MeanSquareError, MseProbe, QuadModParams, QuadratureModulator,
};
use pracsim::{
    ExecContext, ExecStatus, InitContext, ModelGraph, Ports, PracSimModel, SimConfig, SimError,
    Signal,
};

/// Maps bit pairs onto unit-amplitude QPSK I and Q levels.
struct BitsToQpsk {
    bits: Signal<bool>,
    i_out: Signal<f32>,
    q_out: Signal<f32>,
}

impl BitsToQpsk {
    fn new(
        ports: &mut Ports<'_>,
        bits: Signal<bool>,
        i_out: Signal<f32>,
        q_out: Signal<f32>,
    ) -> Result<Self, SimError> {
        ports.declare_as_input(bits)?;
        ports.declare_as_output(i_out)?;
        ports.declare_as_output(q_out)?;
        Ok(Self { bits, i_out, q_out })
    }
}

impl PracSimModel for BitsToQpsk {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        let block = ctx.input_block_size(self.bits)?;
        if block % 2 != 0 {
            return Err(ctx.incompatible(self.bits, "bit block size must be even"));
        }
        let symbol_intvl = 2.0 * ctx.input_samp_intvl(self.bits)?;
        for out in [self.i_out, self.q_out] {
            ctx.set_block_size(out, block / 2)?;
            ctx.set_samp_intvl(out, symbol_intvl)?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let bits = ctx.read_view(self.bits)?;
        let mut i_out = ctx.write_view(self.i_out)?;
        let mut q_out = ctx.write_view(self.q_out)?;
        let level = std::f32::consts::FRAC_1_SQRT_2;
        let level_of = |b: bool| if b { level } else { -level };
        let symbols = bits.len() / 2;
        for (k, pair) in bits.chunks_exact(2).enumerate() {
            i_out[k] = level_of(pair[0]);
            q_out[k] = level_of(pair[1]);
        }
        ctx.set_valid_length(self.i_out, symbols)?;
        ctx.set_valid_length(self.q_out, symbols)?;
        Ok(ExecStatus::Complete)
    }
}

fn imbalance_db(amp_unbal: f64, phase_unbal_deg: f64) -> f64 {
    let config = SimConfig::default()
        .with_cycles(200)
        .with_default_block_size(512)
        .with_default_samp_intvl(1.0 / 1.0e6);
    let mut graph = ModelGraph::with_config(config);
    let bits = graph.bit_signal("bits");
    let (i, q) = (graph.float_signal("i"), graph.float_signal("q"));
    let ideal = graph.complex_signal("ideal");
    let skewed = graph.complex_signal("skewed");

    graph
        .add_model("tx", None, |p| BitGenerator::new(p, bits, 7))
        .unwrap();
    graph
        .add_model("mapper", None, |p| BitsToQpsk::new(p, bits, i, q))
        .unwrap();
    graph
        .add_model("ideal_mod", None, |p| {
            QuadratureModulator::new(p, i, q, ideal, QuadModParams::default())
        })
        .unwrap();
    graph
        .add_model("skewed_mod", None, |p| {
            QuadratureModulator::new(p, i, q, skewed, QuadModParams {
                amp_unbal,
                phase_unbal_deg,
            })
        })
        .unwrap();
    let probe = MseProbe::default();
    let handle = probe.clone();
    graph
        .add_model("mse", None, |p| {
            MeanSquareError::<Complex32>::new(p, skewed, ideal, handle)
        })
        .unwrap();

    let mut sim = graph.finalize().unwrap();
    sim.run_configured().unwrap();
    sim.teardown().unwrap();
    probe.normalized_db()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{:>8} {:>10} {:>12}", "gain", "phase", "error (dB)");
    for (amp, phase) in [(1.05, 0.0), (1.0, 2.0), (1.05, 2.0), (1.1, 5.0)] {
        println!("{amp:>8.2} {phase:>10.1} {:>12.2}", imbalance_db(amp, phase));
    }
}
