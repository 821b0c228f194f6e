//! Error types for graph construction and cycle execution.

use thiserror::Error;

/// Configuration-class errors.
///
/// These are detected once, while the topology is built, finalized and
/// initialized. None of them can occur after the first cycle has started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Two models both declared the same signal as an output.
    #[error("signal {signal} has two producers: {first}, {second}")]
    DuplicateProducer {
        /// Signal name
        signal: String,
        /// Model that registered first
        first: String,
        /// Model that tried to register second
        second: String,
    },

    /// A signal is consumed but nothing produces it.
    #[error("signal {signal} has no producer but is consumed by: {}", consumers.join(", "))]
    MissingProducer {
        /// Signal name
        signal: String,
        /// Consuming model names
        consumers: Vec<String>,
    },

    /// A model declared the same signal as both input and output.
    #[error("model {model} both produces and consumes signal {signal}")]
    SelfLoop {
        /// Model name
        model: String,
        /// Signal name
        signal: String,
    },

    /// No execution order exists.
    #[error("same-cycle dependency cycle among models: {}", models.join(", "))]
    CycleDetected {
        /// Models that could not be scheduled
        models: Vec<String>,
    },

    /// Connected block sizes or sample intervals do not agree.
    #[error("model {model}, signal {signal}: incompatible block size ({detail})")]
    IncompatibleBlockSize {
        /// Model name
        model: String,
        /// Signal name
        signal: String,
        /// What did not match
        detail: String,
    },

    /// No block size could be derived for a signal.
    #[error("signal {signal} (produced by {producer}) has no block size; anchor it or set a default")]
    UnsizedSignal {
        /// Signal name
        signal: String,
        /// Producing model name
        producer: String,
    },

    /// A static model parameter is out of range.
    #[error("model {model}: invalid parameter {parameter} ({detail})")]
    InvalidParameter {
        /// Model name
        model: String,
        /// Parameter name
        parameter: String,
        /// Why it was rejected
        detail: String,
    },

    /// A model's construction closure returned an error, leaving an empty slot.
    #[error("model {model} failed construction and was never registered")]
    IncompleteModel {
        /// Model name
        model: String,
    },

    /// A handle refers to a signal this graph does not own.
    #[error("unknown signal id {0}")]
    UnknownSignal(usize),
}

/// Errors surfaced by the simulation API.
#[derive(Debug, Error)]
pub enum SimError {
    /// Topology or sizing error, see [`ConfigError`].
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A producer reported more valid samples than the signal holds.
    #[error("signal {signal}: valid length {requested} exceeds maximum block size {max}")]
    BlockSizeExceeded {
        /// Signal name
        signal: String,
        /// Requested valid length
        requested: usize,
        /// Maximum block size
        max: usize,
    },

    /// A model touched a signal it did not declare (or in the wrong direction).
    #[error("model {model} accessed undeclared signal {signal}")]
    UndeclaredAccess {
        /// Model name
        model: String,
        /// Signal name
        signal: String,
    },

    /// A model returned without setting the valid length of one of its outputs.
    #[error("model {model} did not set the valid length of output {signal}")]
    ValidLengthNotSet {
        /// Model name
        model: String,
        /// Signal name
        signal: String,
    },

    /// A view on the signal is still held elsewhere.
    #[error("signal {signal} is already borrowed")]
    BufferBusy {
        /// Signal name
        signal: String,
    },

    /// Model-specific fatal condition.
    #[error("model {model}: {detail}")]
    ModelFault {
        /// Model name
        model: String,
        /// Description
        detail: String,
    },

    /// A model panicked inside a contained step.
    #[error("model {model} panicked during cycle {cycle}")]
    ModelPanicked {
        /// Model name
        model: String,
        /// Cycle number
        cycle: u64,
    },

    /// A previous contained step failed; the simulation refuses to continue.
    #[error("simulation aborted by an earlier failure")]
    Poisoned,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV writer error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl SimError {
    /// True for the configuration class.
    pub fn is_config(&self) -> bool {
        matches!(self, SimError::Config(_))
    }
}
