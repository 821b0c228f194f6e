//! Graph module: the explicit model registry and its one-shot finalization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::config::SimConfig;
use crate::error::{ConfigError, SimError};
use crate::invariant_ppt::{
    assert_invariant, BLOCK_SIZES_RESOLVED, BUFFERS_ALLOCATED, MODELS_CONSTRUCTED,
    SIGNAL_HAS_PRODUCER, SIGNAL_SINGLE_PRODUCER,
};
use crate::model::{InitContext, ModelId, Ports, PracSimModel};
use crate::plan::ExecutionPlan;
use crate::rt::Simulation;
use crate::signal::{Sample, Signal, SignalId, SignalSlot};
use num_complex::Complex32;
use tracing::{debug, info, warn};

/// A constructed model with its frozen port declarations.
pub(crate) struct ModelEntry {
    pub(crate) name: String,
    pub(crate) outer: Option<ModelId>,
    pub(crate) inputs: Vec<SignalId>,
    pub(crate) outputs: Vec<SignalId>,
    pub(crate) model: Box<dyn PracSimModel>,
}

/// Registry of all signals and models of one simulation.
///
/// Signals are created first, then models are added in construction order
/// (which is also the tie-break order of the schedule). [`finalize`](Self::finalize)
/// freezes the topology, orders the models, initializes them and hands back a
/// runnable [`Simulation`].
pub struct ModelGraph {
    config: SimConfig,
    signals: Vec<SignalSlot>,
    names: Vec<String>,
    /// None for models whose construction failed.
    models: Vec<Option<ModelEntry>>,
}

impl ModelGraph {
    /// An empty graph with default configuration.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// An empty graph with explicit configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self {
            config,
            signals: Vec::new(),
            names: Vec::new(),
            models: Vec::new(),
        }
    }

    /// The configuration the simulation will run with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Create a signal of element type `T`. The buffer is allocated at finalize.
    pub fn signal<T: Sample>(&mut self, name: &str) -> Signal<T> {
        let id = SignalId(self.signals.len());
        self.signals.push(SignalSlot::new(id, name, T::empty_store()));
        Signal::new(id)
    }

    /// Create a bit signal.
    pub fn bit_signal(&mut self, name: &str) -> Signal<bool> {
        self.signal(name)
    }

    /// Create a byte signal.
    pub fn byte_signal(&mut self, name: &str) -> Signal<u8> {
        self.signal(name)
    }

    /// Create an integer signal.
    pub fn int_signal(&mut self, name: &str) -> Signal<i32> {
        self.signal(name)
    }

    /// Create a real-valued signal.
    pub fn float_signal(&mut self, name: &str) -> Signal<f32> {
        self.signal(name)
    }

    /// Create a complex-valued signal.
    pub fn complex_signal(&mut self, name: &str) -> Signal<Complex32> {
        self.signal(name)
    }

    /// Pin a signal's sample interval and maximum block size.
    pub fn anchor<T: Sample>(
        &mut self,
        signal: Signal<T>,
        samp_intvl: f64,
        block_size: usize,
    ) -> Result<(), ConfigError> {
        let slot = self
            .signals
            .get_mut(signal.id().0)
            .ok_or(ConfigError::UnknownSignal(signal.id().0))?;
        let invalid = |parameter: &str, detail: &str| ConfigError::InvalidParameter {
            model: format!("anchor({})", slot.name()),
            parameter: parameter.to_string(),
            detail: detail.to_string(),
        };
        if block_size == 0 {
            return Err(invalid("block_size", "must be positive"));
        }
        if !(samp_intvl.is_finite() && samp_intvl > 0.0) {
            return Err(invalid("samp_intvl", "must be positive and finite"));
        }
        if slot.is_anchored() {
            return Err(invalid("anchor", "signal is already anchored"));
        }
        slot.anchor(samp_intvl, block_size);
        debug!(signal = slot.name(), samp_intvl, block_size, "signal anchored");
        Ok(())
    }

    /// Construct and register a model.
    ///
    /// `build` receives the port declaration handle; every input and output
    /// must be declared inside it. If `build` fails the model's slot stays
    /// empty and [`finalize`](Self::finalize) will refuse the graph.
    pub fn add_model<M, F>(
        &mut self,
        name: &str,
        outer: Option<ModelId>,
        build: F,
    ) -> Result<ModelId, SimError>
    where
        M: PracSimModel + 'static,
        F: FnOnce(&mut Ports<'_>) -> Result<M, SimError>,
    {
        let id = ModelId(self.models.len());
        let qualified = match outer {
            Some(o) => match self.names.get(o.0) {
                Some(parent) => format!("{parent}.{name}"),
                None => {
                    return Err(ConfigError::InvalidParameter {
                        model: name.to_string(),
                        parameter: "outer".to_string(),
                        detail: format!("no model with id {o}"),
                    }
                    .into())
                }
            },
            None => name.to_string(),
        };
        self.names.push(qualified);
        self.models.push(None);

        let mut ports = Ports::new(id, &self.names[id.0], &self.names, &mut self.signals);
        let built = build(&mut ports);
        let (inputs, outputs) = ports.into_ports();
        let model = built?;

        debug!(
            model = %self.names[id.0],
            kind = model.model_name(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "model constructed"
        );
        self.models[id.0] = Some(ModelEntry {
            name: self.names[id.0].clone(),
            outer,
            inputs,
            outputs,
            model: Box::new(model),
        });
        Ok(id)
    }

    /// Number of models added, including failed constructions.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Qualified diagnostic name of a model.
    pub fn model_name(&self, id: ModelId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    /// The model that encloses `id`, if any.
    pub fn outer_model(&self, id: ModelId) -> Option<ModelId> {
        self.models.get(id.0)?.as_ref()?.outer
    }

    /// All signal slots in creation order.
    pub fn signals(&self) -> &[SignalSlot] {
        &self.signals
    }

    /// Look up a signal slot.
    pub fn signal_slot(&self, id: SignalId) -> Option<&SignalSlot> {
        self.signals.get(id.0)
    }

    fn name_of(&self, id: ModelId) -> String {
        self.model_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    /// Check producer/consumer wiring and construction completeness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for slot in &self.signals {
            if let (Some(first), Some(&second)) =
                (slot.producer(), slot.rejected_producers().first())
            {
                return Err(ConfigError::DuplicateProducer {
                    signal: slot.name().to_string(),
                    first: self.name_of(first),
                    second: self.name_of(second),
                });
            }
            if slot.producer().is_none() && !slot.consumers().is_empty() {
                return Err(ConfigError::MissingProducer {
                    signal: slot.name().to_string(),
                    consumers: slot.consumers().iter().map(|&c| self.name_of(c)).collect(),
                });
            }
        }
        assert_invariant(
            SIGNAL_SINGLE_PRODUCER,
            self.signals.iter().all(|s| s.rejected_producers().is_empty()),
            "no signal has more than one producer",
            Some("validate"),
        );
        assert_invariant(
            SIGNAL_HAS_PRODUCER,
            self.signals
                .iter()
                .all(|s| s.producer().is_some() || s.consumers().is_empty()),
            "every consumed signal is produced",
            Some("validate"),
        );

        for (i, entry) in self.models.iter().enumerate() {
            let Some(entry) = entry else {
                return Err(ConfigError::IncompleteModel {
                    model: self.name_of(ModelId(i)),
                });
            };
            if let Some(&looped) = entry.inputs.iter().find(|s| entry.outputs.contains(s)) {
                return Err(ConfigError::SelfLoop {
                    model: entry.name.clone(),
                    signal: self.signals[looped.0].name().to_string(),
                });
            }
        }
        assert_invariant(
            MODELS_CONSTRUCTED,
            self.models.iter().all(Option::is_some),
            "every registered model finished construction",
            Some("validate"),
        );

        for slot in &self.signals {
            if slot.producer().is_none() {
                warn!(signal = slot.name(), "signal is neither produced nor consumed");
            }
        }
        Ok(())
    }

    /// Freeze the topology, compute the execution order, initialize every
    /// model (propagating block sizes) and allocate signal buffers.
    ///
    /// Nothing executes if this fails.
    pub fn finalize(mut self) -> Result<Simulation, SimError> {
        self.config.validate()?;
        self.validate()?;
        let plan = ExecutionPlan::compile(&self)?;
        info!(
            models = self.models.len(),
            signals = self.signals.len(),
            order = ?plan.order.iter().map(|&id| self.name_of(id)).collect::<Vec<_>>(),
            "execution order computed"
        );

        let mut models: Vec<ModelEntry> = self.models.into_iter().flatten().collect();
        for &id in &plan.order {
            let entry = &mut models[id.0];
            let mut ctx = InitContext::new(
                &entry.name,
                &entry.inputs,
                &entry.outputs,
                &mut self.signals,
                &self.config,
            );
            entry.model.initialize(&mut ctx)?;
            resolve_outputs(entry, &mut self.signals, &self.config)?;
        }

        for slot in self.signals.iter_mut().filter(|s| s.producer().is_some()) {
            slot.allocate()?;
            debug!(
                signal = slot.name(),
                kind = %slot.kind(),
                block_size = slot.max_block_size(),
                samp_intvl = slot.samp_intvl(),
                "signal buffer allocated"
            );
        }
        assert_invariant(
            BLOCK_SIZES_RESOLVED,
            self.signals
                .iter()
                .all(|s| s.producer().is_none() || s.max_block_size().is_some()),
            "every produced signal has a block size",
            Some("finalize"),
        );
        assert_invariant(
            BUFFERS_ALLOCATED,
            self.signals.iter().all(|s| {
                s.producer().is_none() || Some(s.allocated_len()) == s.max_block_size()
            }),
            "buffers sized to maximum block size",
            Some("finalize"),
        );

        Ok(Simulation::new(plan, models, self.signals, self.config))
    }
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Give every output the model did not format itself the common format of its
/// inputs, or the configured source defaults when it has none.
///
/// An anchored output must hold a whole input block and run at the inputs'
/// sample interval unless the model set its format explicitly.
fn resolve_outputs(
    entry: &ModelEntry,
    signals: &mut [SignalSlot],
    config: &SimConfig,
) -> Result<(), ConfigError> {
    let incompatible = |signal: &str, detail: String| ConfigError::IncompatibleBlockSize {
        model: entry.name.clone(),
        signal: signal.to_string(),
        detail,
    };

    let mut block_sizes = entry
        .inputs
        .iter()
        .filter_map(|id| signals[id.0].max_block_size().map(|n| (id, n)));
    let common_block = match block_sizes.next() {
        None => None,
        Some((first_id, first)) => match block_sizes.find(|&(_, n)| n != first) {
            None => Some(Ok(first)),
            Some((other_id, other)) => Some(Err(format!(
                "inputs disagree: {}={}, {}={}",
                signals[first_id.0].name(),
                first,
                signals[other_id.0].name(),
                other
            ))),
        },
    };

    let mut intervals = entry
        .inputs
        .iter()
        .filter_map(|id| signals[id.0].samp_intvl().map(|t| (id, t)));
    let common_intvl = match intervals.next() {
        None => None,
        Some((first_id, first)) => {
            if let Some((other_id, other)) =
                intervals.find(|&(_, t)| !same_interval(first, t))
            {
                return Err(incompatible(
                    signals[other_id.0].name(),
                    format!(
                        "sample intervals disagree: {}={}, {}={}",
                        signals[first_id.0].name(),
                        first,
                        signals[other_id.0].name(),
                        other
                    ),
                ));
            }
            Some(first)
        }
    };

    for out in &entry.outputs {
        let slot = &mut signals[out.0];
        if !slot.is_sized_by_producer() {
            match (slot.max_block_size(), &common_block) {
                (_, Some(Err(detail))) => return Err(incompatible(slot.name(), detail.clone())),
                (Some(anchored), Some(Ok(n))) if anchored < *n => {
                    return Err(incompatible(
                        slot.name(),
                        format!("anchored at {anchored}, inputs carry {n} per cycle"),
                    ));
                }
                (Some(_), _) => {}
                (None, common) => {
                    let block_size = match (common, entry.inputs.is_empty()) {
                        (Some(Ok(n)), _) => *n,
                        (None, true) => match config.default_block_size {
                            Some(n) => n,
                            None => {
                                return Err(ConfigError::UnsizedSignal {
                                    signal: slot.name().to_string(),
                                    producer: entry.name.clone(),
                                })
                            }
                        },
                        _ => {
                            return Err(ConfigError::UnsizedSignal {
                                signal: slot.name().to_string(),
                                producer: entry.name.clone(),
                            })
                        }
                    };
                    slot.fix_block_size(block_size).map_err(|existing| {
                        incompatible(
                            slot.name(),
                            format!("propagated {block_size}, already fixed at {existing}"),
                        )
                    })?;
                    debug!(
                        signal = slot.name(),
                        producer = %entry.name,
                        block_size,
                        "block size propagated"
                    );
                }
            }
        }
        if !slot.is_timed_by_producer() {
            let samp_intvl = common_intvl.unwrap_or(config.default_samp_intvl);
            match slot.samp_intvl() {
                Some(anchored) if common_intvl.is_some() && !same_interval(anchored, samp_intvl) => {
                    return Err(incompatible(
                        slot.name(),
                        format!("anchored at interval {anchored}, inputs run at {samp_intvl}"),
                    ));
                }
                Some(_) => {}
                None => slot.fix_samp_intvl(samp_intvl).map_err(|existing| {
                    incompatible(
                        slot.name(),
                        format!("sample interval {samp_intvl} conflicts with {existing}"),
                    )
                })?,
            }
        }
    }
    Ok(())
}

fn same_interval(a: f64, b: f64) -> bool {
    (a - b).abs() <= a.abs() * 1e-9
}
