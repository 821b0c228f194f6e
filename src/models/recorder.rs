//! Diagnostic sink that keeps every block it sees.
//!
//! Each cycle pushes a fresh `Vec`, so this sink allocates in the cycle loop.
//! Use it for tests and short runs.

use crate::error::SimError;
use crate::model::{ExecContext, ExecStatus, Ports, PracSimModel};
use crate::signal::{Sample, Signal};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared view of what a [`SignalRecorder`] captured.
#[derive(Debug)]
pub struct Recording<T> {
    frames: Rc<RefCell<Vec<Vec<T>>>>,
}

impl<T> Clone for Recording<T> {
    fn clone(&self) -> Self {
        Self {
            frames: Rc::clone(&self.frames),
        }
    }
}

impl<T> Default for Recording<T> {
    fn default() -> Self {
        Self {
            frames: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Sample> Recording<T> {
    /// One entry per executed cycle.
    pub fn frames(&self) -> Vec<Vec<T>> {
        self.frames.borrow().clone()
    }

    /// Valid length seen in each cycle.
    pub fn valid_lengths(&self) -> Vec<usize> {
        self.frames.borrow().iter().map(Vec::len).collect()
    }

    /// All frames back to back.
    pub fn concatenated(&self) -> Vec<T> {
        self.frames.borrow().concat()
    }
}

/// Records the valid samples of one signal every cycle.
pub struct SignalRecorder<T: Sample> {
    input: Signal<T>,
    recording: Recording<T>,
}

impl<T: Sample> SignalRecorder<T> {
    /// Record `input` into `recording`.
    pub fn new(
        ports: &mut Ports<'_>,
        input: Signal<T>,
        recording: Recording<T>,
    ) -> Result<Self, SimError> {
        ports.declare_as_input(input)?;
        Ok(Self { input, recording })
    }
}

impl<T: Sample> PracSimModel for SignalRecorder<T> {
    fn model_name(&self) -> &'static str {
        "SignalRecorder"
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
        let block = ctx.read_view(self.input)?;
        self.recording.frames.borrow_mut().push(block.to_vec());
        Ok(ExecStatus::Complete)
    }
}
