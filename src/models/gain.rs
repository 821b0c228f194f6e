//! Constant gain.

use crate::error::SimError;
use crate::model::{ExecContext, ExecStatus, Ports, PracSimModel};
use crate::models::Analog;
use crate::signal::Signal;

/// Multiplies every sample by a fixed factor. Output format is inherited from the input.
pub struct Gain<T: Analog> {
    input: Signal<T>,
    output: Signal<T>,
    gain: f32,
}

impl<T: Analog> Gain<T> {
    /// Fails construction if `gain` is NaN or infinite.
    pub fn new(
        ports: &mut Ports<'_>,
        input: Signal<T>,
        output: Signal<T>,
        gain: f32,
    ) -> Result<Self, SimError> {
        if !gain.is_finite() {
            return Err(ports.invalid_parameter("gain", "must be finite").into());
        }
        ports.declare_as_input(input)?;
        ports.declare_as_output(output)?;
        Ok(Self {
            input,
            output,
            gain,
        })
    }
}

impl<T: Analog> PracSimModel for Gain<T> {
    fn model_name(&self) -> &'static str {
        "Gain"
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let input = ctx.read_view(self.input)?;
        let mut out = ctx.write_view(self.output)?;
        for (o, &x) in out.iter_mut().zip(input.iter()) {
            *o = x * self.gain;
        }
        ctx.set_valid_length(self.output, input.len())?;
        Ok(ExecStatus::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModelGraph;
    use crate::harness::capture;
    use crate::models::VectorSource;
    use num_complex::Complex32;

    #[test]
    fn gain_scales_complex_samples() {
        let mut graph = ModelGraph::new();
        let x = graph.complex_signal("x");
        let y = graph.complex_signal("y");
        graph.anchor(x, 1.0, 2).unwrap();
        graph
            .add_model("src", None, |p| {
                VectorSource::repeating(p, x, vec![Complex32::new(1.0, -2.0)])
            })
            .unwrap();
        graph.add_model("g", None, |p| Gain::new(p, x, y, 3.0)).unwrap();
        let mut sim = graph.finalize().unwrap();
        assert_eq!(sim.block_size(y).unwrap(), 2);
        let frames = capture(&mut sim, y, 1).unwrap();
        assert_eq!(frames[0], vec![Complex32::new(3.0, -6.0); 2]);
    }

    #[test]
    fn gain_passes_short_blocks_through() {
        let mut graph = ModelGraph::new();
        let x = graph.float_signal("x");
        let y = graph.float_signal("y");
        graph.anchor(x, 1.0, 4).unwrap();
        graph
            .add_model("src", None, |p| VectorSource::new(p, x, vec![1.0; 6]))
            .unwrap();
        graph.add_model("g", None, |p| Gain::new(p, x, y, -0.5)).unwrap();
        let mut sim = graph.finalize().unwrap();
        let frames = capture(&mut sim, y, 2).unwrap();
        assert_eq!(frames, vec![vec![-0.5; 4], vec![-0.5; 2]]);
    }

    #[test]
    fn non_finite_gain_is_rejected() {
        let mut graph = ModelGraph::new();
        let x = graph.float_signal("x");
        let y = graph.float_signal("y");
        assert!(graph
            .add_model("g", None, |p| Gain::new(p, x, y, f32::NAN))
            .is_err());
    }
}
