//! Quadrature modulator with amplitude and phase imbalance.

use crate::error::SimError;
use crate::model::{ExecContext, ExecStatus, InitContext, Ports, PracSimModel};
use crate::signal::Signal;
use num_complex::Complex32;
use std::f32::consts::PI;

/// Imbalance of the quadrature branch relative to the in-phase branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadModParams {
    /// Gain of the Q branch (1.0 = balanced)
    pub amp_unbal: f64,
    /// Phase error of the Q branch in degrees (0.0 = balanced)
    pub phase_unbal_deg: f64,
}

impl Default for QuadModParams {
    fn default() -> Self {
        Self {
            amp_unbal: 1.0,
            phase_unbal_deg: 0.0,
        }
    }
}

/// Combines I and Q into a complex envelope:
/// `I - sin(phi)*a*Q + j*cos(phi)*a*Q`.
///
/// Optionally also emits the magnitude and the phase in degrees.
pub struct QuadratureModulator {
    i_in: Signal<f32>,
    q_in: Signal<f32>,
    cmpx_out: Signal<Complex32>,
    polar: Option<(Signal<f32>, Signal<f32>)>,
    real_unbal: f32,
    imag_unbal: f32,
}

impl QuadratureModulator {
    /// Complex output only.
    pub fn new(
        ports: &mut Ports<'_>,
        i_in: Signal<f32>,
        q_in: Signal<f32>,
        cmpx_out: Signal<Complex32>,
        params: QuadModParams,
    ) -> Result<Self, SimError> {
        if !params.amp_unbal.is_finite() {
            return Err(ports.invalid_parameter("amp_unbal", "must be finite").into());
        }
        if !params.phase_unbal_deg.is_finite() {
            return Err(ports
                .invalid_parameter("phase_unbal_deg", "must be finite")
                .into());
        }
        ports.declare_as_input(i_in)?;
        ports.declare_as_input(q_in)?;
        ports.declare_as_output(cmpx_out)?;
        let phase_rad = params.phase_unbal_deg.to_radians();
        Ok(Self {
            i_in,
            q_in,
            cmpx_out,
            polar: None,
            real_unbal: (phase_rad.cos() * params.amp_unbal) as f32,
            imag_unbal: (phase_rad.sin() * params.amp_unbal) as f32,
        })
    }

    /// Complex output plus magnitude and phase (degrees) outputs.
    pub fn with_polar(
        ports: &mut Ports<'_>,
        i_in: Signal<f32>,
        q_in: Signal<f32>,
        cmpx_out: Signal<Complex32>,
        mag_out: Signal<f32>,
        phase_out: Signal<f32>,
        params: QuadModParams,
    ) -> Result<Self, SimError> {
        let mut qm = Self::new(ports, i_in, q_in, cmpx_out, params)?;
        ports.declare_as_output(mag_out)?;
        ports.declare_as_output(phase_out)?;
        qm.polar = Some((mag_out, phase_out));
        Ok(qm)
    }
}

impl PracSimModel for QuadratureModulator {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        let (i_block, q_block) = (
            ctx.input_block_size(self.i_in)?,
            ctx.input_block_size(self.q_in)?,
        );
        if i_block != q_block {
            return Err(ctx.incompatible(
                self.q_in,
                format!("I block size {i_block} differs from Q block size {q_block}"),
            ));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let i_in = ctx.read_view(self.i_in)?;
        let q_in = ctx.read_view(self.q_in)?;
        if i_in.len() != q_in.len() {
            return Err(ctx.fault(format!(
                "I has {} valid samples, Q has {}",
                i_in.len(),
                q_in.len()
            )));
        }
        let n = i_in.len();
        let mut out = ctx.write_view(self.cmpx_out)?;
        for ((o, &i), &q) in out.iter_mut().zip(i_in.iter()).zip(q_in.iter()) {
            *o = Complex32::new(i - self.imag_unbal * q, self.real_unbal * q);
        }
        ctx.set_valid_length(self.cmpx_out, n)?;

        if let Some((mag_sig, phase_sig)) = self.polar {
            let mut mag = ctx.write_view(mag_sig)?;
            let mut phase = ctx.write_view(phase_sig)?;
            for ((z, m), p) in out[..n].iter().zip(mag.iter_mut()).zip(phase.iter_mut()) {
                *m = z.norm();
                *p = 180.0 * z.im.atan2(z.re) / PI;
            }
            ctx.set_valid_length(mag_sig, n)?;
            ctx.set_valid_length(phase_sig, n)?;
        }
        Ok(ExecStatus::Complete)
    }
}
