//! Test harness: step a simulation and collect what a signal carried.

use crate::error::SimError;
use crate::rt::Simulation;
use crate::signal::{Sample, Signal};

/// Step `cycles` times, copying the valid samples of `signal` after each cycle.
///
/// Exhaustion does not stop the capture.
pub fn capture<T: Sample>(
    sim: &mut Simulation,
    signal: Signal<T>,
    cycles: u64,
) -> Result<Vec<Vec<T>>, SimError> {
    let mut frames = Vec::with_capacity(cycles as usize);
    for _ in 0..cycles {
        sim.step()?;
        frames.push(sim.read_view(signal)?.to_vec());
    }
    Ok(frames)
}

/// Valid lengths of `signal` over `cycles` steps.
pub fn valid_lengths<T: Sample>(
    sim: &mut Simulation,
    signal: Signal<T>,
    cycles: u64,
) -> Result<Vec<usize>, SimError> {
    let mut lengths = Vec::with_capacity(cycles as usize);
    for _ in 0..cycles {
        sim.step()?;
        lengths.push(sim.valid_length(signal)?);
    }
    Ok(lengths)
}
