//! Leaf models shipped with the engine.

use crate::signal::Sample;
use num_complex::Complex32;
use std::ops::{Add, Mul, Sub};

pub mod gain;
pub mod mse;
pub mod quadmod;
pub mod rate_changer;
pub mod recorder;
pub mod sources;
pub mod wav_sink;

pub use gain::Gain;
pub use mse::{MeanSquareError, MseProbe};
pub use quadmod::{QuadModParams, QuadratureModulator};
pub use rate_changer::{RateChanger, RateChangerParams, RateChangerState};
pub use recorder::{Recording, SignalRecorder};
pub use sources::{BitGenerator, ToneGenerator, ToneParams, VectorSource};
pub use wav_sink::WavSink;

/// Sample types that support linear arithmetic (real or complex baseband).
pub trait Analog: Sample + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self> {
    /// Instantaneous power `|x|^2`.
    fn power(self) -> f64;
}

impl Analog for f32 {
    fn power(self) -> f64 {
        let x = self as f64;
        x * x
    }
}

impl Analog for Complex32 {
    fn power(self) -> f64 {
        self.norm_sqr() as f64
    }
}
