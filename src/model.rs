//! Model lifecycle contract and the contexts handed to each lifecycle step.

#![forbid(unsafe_code)]

use crate::config::SimConfig;
use crate::error::{ConfigError, SimError};
use crate::signal::{Sample, Signal, SignalId, SignalSlot};
use std::cell::{Ref, RefMut};
use std::fmt;

/// Identifier of a model, assigned in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub usize);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Normal completion.
    Complete,
    /// Fewer valid samples than nominal were produced (still accumulating input).
    Partial,
    /// A finite source has nothing more to produce.
    Exhausted,
}

/// A processing block.
///
/// Models are built inside [`ModelGraph::add_model`](crate::graph::ModelGraph::add_model),
/// where they declare their ports through [`Ports`]. After the graph is
/// finalized each model is initialized once, in execution order, then executed
/// once per cycle.
pub trait PracSimModel {
    /// Short type name for diagnostics.
    fn model_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Derive block sizes and allocate state. Upstream models are already initialized.
    fn initialize(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), SimError> {
        Ok(())
    }

    /// Process one cycle.
    ///
    /// Must set the valid length of every declared output before returning.
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError>;

    /// Release resources at the end of the run.
    fn teardown(&mut self) -> Result<(), SimError> {
        Ok(())
    }
}

/// Port declaration handle passed to a model while it is being constructed.
pub struct Ports<'a> {
    model: ModelId,
    name: &'a str,
    names: &'a [String],
    signals: &'a mut [SignalSlot],
    inputs: Vec<SignalId>,
    outputs: Vec<SignalId>,
}

impl<'a> Ports<'a> {
    pub(crate) fn new(
        model: ModelId,
        name: &'a str,
        names: &'a [String],
        signals: &'a mut [SignalSlot],
    ) -> Self {
        Self {
            model,
            name,
            names,
            signals,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Id the model will be registered under.
    pub fn model_id(&self) -> ModelId {
        self.model
    }

    /// Qualified instance name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Register this model as a consumer of `signal`.
    pub fn declare_as_input<T: Sample>(&mut self, signal: Signal<T>) -> Result<(), ConfigError> {
        let slot = typed_slot_mut::<T>(self.signals, signal.id())?;
        slot.declare_consumer(self.model);
        self.inputs.push(signal.id());
        Ok(())
    }

    /// Register this model as the sole producer of `signal`.
    pub fn declare_as_output<T: Sample>(&mut self, signal: Signal<T>) -> Result<(), ConfigError> {
        let slot = typed_slot_mut::<T>(self.signals, signal.id())?;
        if let Err(existing) = slot.declare_producer(self.model) {
            return Err(ConfigError::DuplicateProducer {
                signal: slot.name().to_string(),
                first: self
                    .names
                    .get(existing.0)
                    .cloned()
                    .unwrap_or_else(|| existing.to_string()),
                second: self.name.to_string(),
            });
        }
        self.outputs.push(signal.id());
        Ok(())
    }

    /// Build an `InvalidParameter` error for this model.
    pub fn invalid_parameter(&self, parameter: &str, detail: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParameter {
            model: self.name.to_string(),
            parameter: parameter.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn into_ports(self) -> (Vec<SignalId>, Vec<SignalId>) {
        (self.inputs, self.outputs)
    }
}

fn typed_slot_mut<T: Sample>(
    signals: &mut [SignalSlot],
    id: SignalId,
) -> Result<&mut SignalSlot, ConfigError> {
    match signals.get_mut(id.0) {
        Some(slot) if slot.kind() == T::KIND => Ok(slot),
        _ => Err(ConfigError::UnknownSignal(id.0)),
    }
}

/// Block size and sample interval resolved for a source output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceFormat {
    /// Samples per cycle
    pub block_size: usize,
    /// Seconds per sample
    pub samp_intvl: f64,
}

/// Context for [`PracSimModel::initialize`].
pub struct InitContext<'a> {
    name: &'a str,
    inputs: &'a [SignalId],
    outputs: &'a [SignalId],
    signals: &'a mut [SignalSlot],
    config: &'a SimConfig,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(
        name: &'a str,
        inputs: &'a [SignalId],
        outputs: &'a [SignalId],
        signals: &'a mut [SignalSlot],
        config: &'a SimConfig,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs,
            signals,
            config,
        }
    }

    /// Qualified instance name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Simulation-wide configuration.
    pub fn config(&self) -> &SimConfig {
        self.config
    }

    fn declared(&self, id: SignalId) -> bool {
        self.inputs.contains(&id) || self.outputs.contains(&id)
    }

    fn slot(&self, id: SignalId) -> Result<&SignalSlot, SimError> {
        if !self.declared(id) {
            return Err(self.undeclared(id));
        }
        self.signals
            .get(id.0)
            .ok_or(SimError::Config(ConfigError::UnknownSignal(id.0)))
    }

    fn output_slot_mut(&mut self, id: SignalId) -> Result<&mut SignalSlot, SimError> {
        if !self.outputs.contains(&id) {
            return Err(self.undeclared(id));
        }
        self.signals
            .get_mut(id.0)
            .ok_or(SimError::Config(ConfigError::UnknownSignal(id.0)))
    }

    fn undeclared(&self, id: SignalId) -> SimError {
        SimError::UndeclaredAccess {
            model: self.name.to_string(),
            signal: self
                .signals
                .get(id.0)
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    /// Maximum block size of a declared port, if known yet.
    pub fn block_size<T: Sample>(&self, signal: Signal<T>) -> Result<Option<usize>, SimError> {
        Ok(self.slot(signal.id())?.max_block_size())
    }

    /// Sample interval of a declared port, if known yet.
    pub fn samp_intvl<T: Sample>(&self, signal: Signal<T>) -> Result<Option<f64>, SimError> {
        Ok(self.slot(signal.id())?.samp_intvl())
    }

    /// Block size of an input; upstream producers are initialized first so this is always known.
    pub fn input_block_size<T: Sample>(&self, signal: Signal<T>) -> Result<usize, SimError> {
        let slot = self.slot(signal.id())?;
        slot.max_block_size().ok_or_else(|| {
            SimError::Config(ConfigError::UnsizedSignal {
                signal: slot.name().to_string(),
                producer: "<upstream>".to_string(),
            })
        })
    }

    /// Sample interval of an input, falling back to the configured default.
    pub fn input_samp_intvl<T: Sample>(&self, signal: Signal<T>) -> Result<f64, SimError> {
        Ok(self
            .slot(signal.id())?
            .samp_intvl()
            .unwrap_or(self.config.default_samp_intvl))
    }

    /// Fix the maximum block size of an output.
    ///
    /// Fails if the output is anchored to a different size.
    pub fn set_block_size<T: Sample>(
        &mut self,
        signal: Signal<T>,
        block_size: usize,
    ) -> Result<(), SimError> {
        let model = self.name.to_string();
        let slot = self.output_slot_mut(signal.id())?;
        if block_size == 0 {
            return Err(SimError::Config(ConfigError::IncompatibleBlockSize {
                model,
                signal: slot.name().to_string(),
                detail: "block size must be positive".to_string(),
            }));
        }
        slot.size_by_producer(block_size).map_err(|existing| {
            SimError::Config(ConfigError::IncompatibleBlockSize {
                model,
                signal: slot.name().to_string(),
                detail: format!("requested {block_size}, already fixed at {existing}"),
            })
        })
    }

    /// Fix the sample interval of an output.
    pub fn set_samp_intvl<T: Sample>(
        &mut self,
        signal: Signal<T>,
        samp_intvl: f64,
    ) -> Result<(), SimError> {
        let model = self.name.to_string();
        let slot = self.output_slot_mut(signal.id())?;
        slot.time_by_producer(samp_intvl).map_err(|existing| {
            SimError::Config(ConfigError::IncompatibleBlockSize {
                model,
                signal: slot.name().to_string(),
                detail: format!("sample interval {samp_intvl} conflicts with {existing}"),
            })
        })
    }

    /// Resolve the format of a source output from its anchor or the configured defaults.
    pub fn source_format<T: Sample>(&mut self, signal: Signal<T>) -> Result<SourceFormat, SimError> {
        let default_block = self.config.default_block_size;
        let default_intvl = self.config.default_samp_intvl;
        let producer = self.name.to_string();
        let slot = self.output_slot_mut(signal.id())?;
        let block_size = match slot.max_block_size().or(default_block) {
            Some(n) => n,
            None => {
                return Err(SimError::Config(ConfigError::UnsizedSignal {
                    signal: slot.name().to_string(),
                    producer,
                }))
            }
        };
        let samp_intvl = slot.samp_intvl().unwrap_or(default_intvl);
        slot.size_by_producer(block_size).map_err(|existing| {
            SimError::Config(ConfigError::IncompatibleBlockSize {
                model: producer.clone(),
                signal: slot.name().to_string(),
                detail: format!("source block size {block_size} conflicts with {existing}"),
            })
        })?;
        slot.time_by_producer(samp_intvl).map_err(|existing| {
            SimError::Config(ConfigError::IncompatibleBlockSize {
                model: producer.clone(),
                signal: slot.name().to_string(),
                detail: format!("source sample interval {samp_intvl} conflicts with {existing}"),
            })
        })?;
        Ok(SourceFormat {
            block_size,
            samp_intvl,
        })
    }

    /// Build an `IncompatibleBlockSize` error naming this model and `signal`.
    pub fn incompatible<T: Sample>(&self, signal: Signal<T>, detail: impl Into<String>) -> SimError {
        SimError::Config(ConfigError::IncompatibleBlockSize {
            model: self.name.to_string(),
            signal: self
                .signals
                .get(signal.id().0)
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| signal.id().to_string()),
            detail: detail.into(),
        })
    }
}

/// Context for [`PracSimModel::execute`].
///
/// Views borrow the context immutably, so a model can hold read views of its
/// inputs and write views of its outputs at the same time.
pub struct ExecContext<'a> {
    name: &'a str,
    inputs: &'a [SignalId],
    outputs: &'a [SignalId],
    signals: &'a [SignalSlot],
    cycle: u64,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(
        name: &'a str,
        inputs: &'a [SignalId],
        outputs: &'a [SignalId],
        signals: &'a [SignalSlot],
        cycle: u64,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs,
            signals,
            cycle,
        }
    }

    /// Zero-based index of the cycle being executed.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Qualified instance name.
    pub fn name(&self) -> &str {
        self.name
    }

    fn input_slot(&self, id: SignalId) -> Result<&'a SignalSlot, SimError> {
        if !self.inputs.contains(&id) {
            return Err(self.undeclared(id));
        }
        self.signals
            .get(id.0)
            .ok_or(SimError::Config(ConfigError::UnknownSignal(id.0)))
    }

    fn output_slot(&self, id: SignalId) -> Result<&'a SignalSlot, SimError> {
        if !self.outputs.contains(&id) {
            return Err(self.undeclared(id));
        }
        self.signals
            .get(id.0)
            .ok_or(SimError::Config(ConfigError::UnknownSignal(id.0)))
    }

    fn undeclared(&self, id: SignalId) -> SimError {
        SimError::UndeclaredAccess {
            model: self.name.to_string(),
            signal: self
                .signals
                .get(id.0)
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    /// The valid samples of an input for this cycle.
    pub fn read_view<T: Sample>(&self, signal: Signal<T>) -> Result<Ref<'a, [T]>, SimError> {
        let slot = self.input_slot(signal.id())?;
        debug_assert!(
            slot.produced_in(self.cycle),
            "signal {} read before its producer ran in cycle {}",
            slot.name(),
            self.cycle
        );
        slot.read_view::<T>()
    }

    /// The full buffer of an output.
    pub fn write_view<T: Sample>(&self, signal: Signal<T>) -> Result<RefMut<'a, [T]>, SimError> {
        self.output_slot(signal.id())?.write_view::<T>()
    }

    /// Valid length of a declared input (or of an output already set this cycle).
    pub fn valid_length<T: Sample>(&self, signal: Signal<T>) -> Result<usize, SimError> {
        let slot = self
            .input_slot(signal.id())
            .or_else(|_| self.output_slot(signal.id()))?;
        Ok(slot.valid_length())
    }

    /// Maximum block size of a declared port.
    pub fn max_block_size<T: Sample>(&self, signal: Signal<T>) -> Result<usize, SimError> {
        let slot = self
            .input_slot(signal.id())
            .or_else(|_| self.output_slot(signal.id()))?;
        Ok(slot.max_block_size().unwrap_or(0))
    }

    /// Report how many samples of an output are valid this cycle.
    pub fn set_valid_length<T: Sample>(&self, signal: Signal<T>, n: usize) -> Result<(), SimError> {
        self.output_slot(signal.id())?.set_valid_length(n, self.cycle)
    }

    /// Build a `ModelFault` error naming this model.
    pub fn fault(&self, detail: impl Into<String>) -> SimError {
        SimError::ModelFault {
            model: self.name.to_string(),
            detail: detail.into(),
        }
    }
}
