//! Rational rate change by linear interpolation.
//!
//! The output rate is `interp / decim` times the input rate. Output sample `j`
//! sits at input position `j * decim / interp`; positions between two input
//! samples are linearly interpolated. Input that has not been consumed yet is
//! carried into the next cycle, so the output valid length varies from cycle to
//! cycle and may be zero while input accumulates.

use crate::error::SimError;
use crate::invariant_ppt::{assert_invariant, RATE_CHANGER_DRAINS};
use crate::model::{ExecContext, ExecStatus, InitContext, Ports, PracSimModel};
use crate::models::Analog;
use crate::signal::Signal;
use tracing::debug;

/// Static parameters of a [`RateChanger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateChangerParams {
    /// Interpolation factor L
    pub interp: usize,
    /// Decimation factor M
    pub decim: usize,
    /// Require every input block to map to a whole number of output samples
    pub whole_blocks: bool,
}

impl RateChangerParams {
    /// Integer decimation by `factor`.
    pub fn decimate(factor: usize) -> Self {
        Self {
            interp: 1,
            decim: factor,
            whole_blocks: false,
        }
    }

    /// Integer interpolation by `factor`.
    pub fn interpolate(factor: usize) -> Self {
        Self {
            interp: factor,
            decim: 1,
            whole_blocks: false,
        }
    }
}

/// Where the rate changer is in its cycle-to-cycle behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChangerState {
    /// Last cycle produced nothing; waiting for more input.
    AccumulatingInput,
    /// Last cycle produced at least one sample.
    ProducingOutput,
}

/// Rate-adapting model: one input, one output, variable output valid length.
pub struct RateChanger<T: Analog> {
    params: RateChangerParams,
    input: Signal<T>,
    output: Signal<T>,
    carry: Vec<T>,
    // next output position in units of 1/interp input samples, relative to carry[0]
    position: usize,
    nominal: usize,
    state: RateChangerState,
}

impl<T: Analog> RateChanger<T> {
    /// Declare ports and validate parameters.
    pub fn new(
        ports: &mut Ports<'_>,
        input: Signal<T>,
        output: Signal<T>,
        params: RateChangerParams,
    ) -> Result<Self, SimError> {
        if params.interp == 0 {
            return Err(ports.invalid_parameter("interp", "must be positive").into());
        }
        if params.decim == 0 {
            return Err(ports.invalid_parameter("decim", "must be positive").into());
        }
        ports.declare_as_input(input)?;
        ports.declare_as_output(output)?;
        Ok(Self {
            params,
            input,
            output,
            carry: Vec::new(),
            position: 0,
            nominal: 0,
            state: RateChangerState::AccumulatingInput,
        })
    }

    /// Current state.
    pub fn state(&self) -> RateChangerState {
        self.state
    }

    /// Nominal output samples per cycle, `floor(B * L / M)`.
    pub fn nominal_output(&self) -> usize {
        self.nominal
    }

    /// Input samples held over for the next cycle.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }
}

impl<T: Analog> PracSimModel for RateChanger<T> {
    fn model_name(&self) -> &'static str {
        "RateChanger"
    }

    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        let RateChangerParams {
            interp,
            decim,
            whole_blocks,
        } = self.params;
        let in_block = ctx.input_block_size(self.input)?;
        let in_intvl = ctx.input_samp_intvl(self.input)?;

        let scaled = in_block * interp;
        if whole_blocks && scaled % decim != 0 {
            return Err(ctx.incompatible(
                self.output,
                format!("input block {in_block} * {interp} is not a multiple of {decim}"),
            ));
        }
        self.nominal = scaled / decim;
        let capacity = if whole_blocks {
            self.nominal
        } else {
            self.nominal + 1
        };

        match ctx.block_size(self.output)? {
            Some(anchored) if anchored < capacity => {
                return Err(ctx.incompatible(
                    self.output,
                    format!("anchored at {anchored}, needs at least {capacity}"),
                ));
            }
            Some(anchored) => ctx.set_block_size(self.output, anchored)?,
            None => ctx.set_block_size(self.output, capacity.max(1))?,
        }
        ctx.set_samp_intvl(self.output, in_intvl * decim as f64 / interp as f64)?;

        self.carry = Vec::with_capacity(in_block + 2);
        self.position = 0;
        self.state = RateChangerState::AccumulatingInput;
        assert_invariant(
            RATE_CHANGER_DRAINS,
            capacity.max(1) >= self.nominal,
            "output capacity covers the nominal output per cycle",
            Some(ctx.name()),
        );
        debug!(
            model = ctx.name(),
            interp, decim, in_block, nominal = self.nominal, capacity, "rate changer initialized"
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        {
            let input = ctx.read_view(self.input)?;
            self.carry.extend_from_slice(&input);
        }
        let (interp, decim) = (self.params.interp, self.params.decim);
        let mut out = ctx.write_view(self.output)?;
        let mut n = 0;
        while n < out.len() {
            let idx = self.position / interp;
            let rem = self.position % interp;
            let needed = if rem == 0 { idx + 1 } else { idx + 2 };
            if needed > self.carry.len() {
                break;
            }
            out[n] = if rem == 0 {
                self.carry[idx]
            } else {
                let (a, b) = (self.carry[idx], self.carry[idx + 1]);
                a + (b - a) * (rem as f32 / interp as f32)
            };
            n += 1;
            self.position += decim;
        }
        let consumed = (self.position / interp).min(self.carry.len());
        self.carry.drain(..consumed);
        self.position -= consumed * interp;
        ctx.set_valid_length(self.output, n)?;

        self.state = if n == 0 {
            RateChangerState::AccumulatingInput
        } else {
            RateChangerState::ProducingOutput
        };
        if n < self.nominal.max(1) {
            Ok(ExecStatus::Partial)
        } else {
            Ok(ExecStatus::Complete)
        }
    }
}
