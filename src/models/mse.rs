//! Mean-square error between a signal and a reference.

use crate::error::SimError;
use crate::model::{ExecContext, ExecStatus, InitContext, Ports, PracSimModel};
use crate::models::Analog;
use crate::signal::Signal;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct MseTotals {
    error_energy: f64,
    ref_energy: f64,
    samples: u64,
}

/// Read-only handle to the running totals of a [`MeanSquareError`] sink.
#[derive(Debug, Clone, Default)]
pub struct MseProbe {
    totals: Rc<RefCell<MseTotals>>,
}

impl MseProbe {
    /// Samples compared so far.
    pub fn samples(&self) -> u64 {
        self.totals.borrow().samples
    }

    /// Average squared error per sample.
    pub fn mean_square_error(&self) -> f64 {
        let t = self.totals.borrow();
        if t.samples == 0 {
            0.0
        } else {
            t.error_energy / t.samples as f64
        }
    }

    /// Error energy relative to reference energy.
    pub fn normalized(&self) -> f64 {
        let t = self.totals.borrow();
        if t.ref_energy == 0.0 {
            0.0
        } else {
            t.error_energy / t.ref_energy
        }
    }

    /// [`normalized`](Self::normalized) in dB.
    pub fn normalized_db(&self) -> f64 {
        10.0 * self.normalized().log10()
    }
}

/// Sink accumulating `|x - ref|^2` and `|ref|^2` over the whole run.
pub struct MeanSquareError<T: Analog> {
    input: Signal<T>,
    reference: Signal<T>,
    probe: MseProbe,
}

impl<T: Analog> MeanSquareError<T> {
    /// Compare `input` against `reference`; results accumulate in `probe`,
    /// which is reset when the simulation initializes.
    pub fn new(
        ports: &mut Ports<'_>,
        input: Signal<T>,
        reference: Signal<T>,
        probe: MseProbe,
    ) -> Result<Self, SimError> {
        ports.declare_as_input(input)?;
        ports.declare_as_input(reference)?;
        Ok(Self {
            input,
            reference,
            probe,
        })
    }
}

impl<T: Analog> PracSimModel for MeanSquareError<T> {
    fn model_name(&self) -> &'static str {
        "MeanSquareError"
    }

    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        let a = ctx.input_block_size(self.input)?;
        let b = ctx.input_block_size(self.reference)?;
        if a != b {
            return Err(ctx.incompatible(
                self.reference,
                format!("input block size {a} differs from reference block size {b}"),
            ));
        }
        *self.probe.totals.borrow_mut() = MseTotals::default();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let x = ctx.read_view(self.input)?;
        let r = ctx.read_view(self.reference)?;
        if x.len() != r.len() {
            return Err(ctx.fault(format!(
                "input has {} valid samples, reference has {}",
                x.len(),
                r.len()
            )));
        }
        let mut totals = self.probe.totals.borrow_mut();
        for (&a, &b) in x.iter().zip(r.iter()) {
            totals.error_energy += (a - b).power();
            totals.ref_energy += b.power();
        }
        totals.samples += x.len() as u64;
        Ok(ExecStatus::Complete)
    }

    fn teardown(&mut self) -> Result<(), SimError> {
        info!(
            samples = self.probe.samples(),
            mse = self.probe.mean_square_error(),
            normalized_db = self.probe.normalized_db(),
            "mean-square error"
        );
        Ok(())
    }
}
