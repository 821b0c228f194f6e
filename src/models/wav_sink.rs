//! Writes a real signal to a mono 32-bit float WAV file.

use crate::error::SimError;
use crate::model::{ExecContext, ExecStatus, InitContext, Ports, PracSimModel};
use crate::signal::Signal;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info};

/// File sink. The file is created at initialize with a sample rate of
/// `1 / samp_intvl` and finalized at teardown.
pub struct WavSink {
    input: Signal<f32>,
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    written: u64,
}

impl WavSink {
    /// Write `input` to `path` as 32-bit float mono.
    pub fn new(
        ports: &mut Ports<'_>,
        input: Signal<f32>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, SimError> {
        ports.declare_as_input(input)?;
        Ok(Self {
            input,
            path: path.into(),
            writer: None,
            written: 0,
        })
    }
}

impl PracSimModel for WavSink {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        let samp_intvl = ctx.input_samp_intvl(self.input)?;
        let rate = (1.0 / samp_intvl).round();
        if !(1.0..=u32::MAX as f64).contains(&rate) {
            return Err(ctx.incompatible(
                self.input,
                format!("sample interval {samp_intvl} gives no usable WAV sample rate"),
            ));
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate as u32,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        self.writer = Some(WavWriter::create(&self.path, spec)?);
        self.written = 0;
        debug!(model = ctx.name(), path = %self.path.display(), sample_rate = spec.sample_rate, "WAV file created");
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let block = ctx.read_view(self.input)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ctx.fault("WAV writer not open"))?;
        for &s in block.iter() {
            writer.write_sample(s)?;
        }
        self.written += block.len() as u64;
        Ok(ExecStatus::Complete)
    }

    fn teardown(&mut self) -> Result<(), SimError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            info!(path = %self.path.display(), samples = self.written, "WAV file written");
        }
        Ok(())
    }
}
