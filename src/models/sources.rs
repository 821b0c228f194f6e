//! Source models: they have outputs only and take their format from the
//! output anchor or the simulation defaults.

use crate::error::SimError;
use crate::model::{ExecContext, ExecStatus, InitContext, Ports, PracSimModel};
use crate::signal::{Sample, Signal};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::TAU;
use tracing::debug;

/// Parameters of a [`ToneGenerator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParams {
    /// Frequency in Hz
    pub freq_hz: f64,
    /// Peak amplitude
    pub amplitude: f32,
    /// Initial phase in degrees
    pub phase_deg: f64,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            freq_hz: 1.0,
            amplitude: 1.0,
            phase_deg: 0.0,
        }
    }
}

/// Real sinusoid, continuous in phase across cycles.
pub struct ToneGenerator {
    output: Signal<f32>,
    params: ToneParams,
    phase: f64,
    phase_step: f64,
}

impl ToneGenerator {
    /// Sine source on `output`. Rejects a negative or non-finite frequency and a
    /// non-finite amplitude.
    pub fn new(
        ports: &mut Ports<'_>,
        output: Signal<f32>,
        params: ToneParams,
    ) -> Result<Self, SimError> {
        if !(params.freq_hz.is_finite() && params.freq_hz >= 0.0) {
            return Err(ports
                .invalid_parameter("freq_hz", "must be finite and non-negative")
                .into());
        }
        if !params.amplitude.is_finite() {
            return Err(ports.invalid_parameter("amplitude", "must be finite").into());
        }
        ports.declare_as_output(output)?;
        Ok(Self {
            output,
            params,
            phase: 0.0,
            phase_step: 0.0,
        })
    }
}

impl PracSimModel for ToneGenerator {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        let format = ctx.source_format(self.output)?;
        self.phase = self.params.phase_deg.to_radians();
        self.phase_step = TAU * self.params.freq_hz * format.samp_intvl;
        debug!(
            model = ctx.name(),
            freq_hz = self.params.freq_hz,
            block_size = format.block_size,
            "tone generator initialized"
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let mut out = ctx.write_view(self.output)?;
        for v in out.iter_mut() {
            *v = self.params.amplitude * self.phase.sin() as f32;
            self.phase = (self.phase + self.phase_step) % TAU;
        }
        ctx.set_valid_length(self.output, out.len())?;
        Ok(ExecStatus::Complete)
    }
}

/// Plays a fixed sequence of samples, one block per cycle.
///
/// Reports [`ExecStatus::Exhausted`] from the cycle that delivers the last
/// sample onward unless it is set to repeat.
pub struct VectorSource<T: Sample> {
    output: Signal<T>,
    data: Vec<T>,
    cursor: usize,
    repeat: bool,
}

impl<T: Sample> VectorSource<T> {
    /// Play `data` once, then report exhaustion.
    pub fn new(ports: &mut Ports<'_>, output: Signal<T>, data: Vec<T>) -> Result<Self, SimError> {
        ports.declare_as_output(output)?;
        Ok(Self {
            output,
            data,
            cursor: 0,
            repeat: false,
        })
    }

    /// Loop over the data forever.
    pub fn repeating(
        ports: &mut Ports<'_>,
        output: Signal<T>,
        data: Vec<T>,
    ) -> Result<Self, SimError> {
        if data.is_empty() {
            return Err(ports
                .invalid_parameter("data", "cannot repeat an empty sequence")
                .into());
        }
        let mut source = Self::new(ports, output, data)?;
        source.repeat = true;
        Ok(source)
    }
}

impl<T: Sample> PracSimModel for VectorSource<T> {
    fn model_name(&self) -> &'static str {
        "VectorSource"
    }

    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        ctx.source_format(self.output)?;
        self.cursor = 0;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let mut out = ctx.write_view(self.output)?;
        let mut n = 0;
        while n < out.len() {
            if self.cursor == self.data.len() {
                if !self.repeat {
                    break;
                }
                self.cursor = 0;
            }
            let take = (out.len() - n).min(self.data.len() - self.cursor);
            out[n..n + take].copy_from_slice(&self.data[self.cursor..self.cursor + take]);
            n += take;
            self.cursor += take;
        }
        ctx.set_valid_length(self.output, n)?;
        if !self.repeat && self.cursor == self.data.len() {
            Ok(ExecStatus::Exhausted)
        } else {
            Ok(ExecStatus::Complete)
        }
    }
}

/// Equiprobable random bits from a seeded ChaCha8 stream.
pub struct BitGenerator {
    output: Signal<bool>,
    seed: u64,
    rng: ChaCha8Rng,
}

impl BitGenerator {
    /// Fair random bits from a ChaCha8 stream seeded with `seed`.
    ///
    /// The stream restarts from the seed at every initialize, so two runs of
    /// the same graph produce the same bits.
    pub fn new(ports: &mut Ports<'_>, output: Signal<bool>, seed: u64) -> Result<Self, SimError> {
        ports.declare_as_output(output)?;
        Ok(Self {
            output,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Seed the stream was started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl PracSimModel for BitGenerator {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        ctx.source_format(self.output)?;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let mut out = ctx.write_view(self.output)?;
        for bit in out.iter_mut() {
            *bit = self.rng.random_bool(0.5);
        }
        ctx.set_valid_length(self.output, out.len())?;
        Ok(ExecStatus::Complete)
    }
}
