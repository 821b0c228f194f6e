//! RT module: the cycle loop of a finalized simulation.

// IMPORTANT: Do not call the PPT invariant log from this module; it takes a lock.
// Steady-state cycles must not allocate either, so only trace-level logging
// with borrowed fields appears inside the loop.

use crate::config::SimConfig;
use crate::error::{ConfigError, SimError};
use crate::graph::ModelEntry;
use crate::model::{ExecContext, ExecStatus, ModelId};
use crate::plan::ExecutionPlan;
use crate::signal::{Sample, Signal, SignalSlot};
use std::cell::Ref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, trace, warn};

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Zero-based cycle index
    pub cycle: u64,
    /// Models that reported a partial production
    pub partial: usize,
    /// True if some source reported exhaustion
    pub exhausted: bool,
}

/// Totals over a [`Simulation::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Cycles executed
    pub cycles: u64,
    /// Partial productions summed over all cycles
    pub partial_productions: u64,
    /// True if the run saw a source exhaust
    pub exhausted: bool,
}

/// A finalized, runnable simulation.
pub struct Simulation {
    plan: ExecutionPlan,
    models: Vec<ModelEntry>,
    signals: Vec<SignalSlot>,
    config: SimConfig,
    cycle: u64,
    current: Option<ModelId>,
    poisoned: bool,
}

impl Simulation {
    pub(crate) fn new(
        plan: ExecutionPlan,
        models: Vec<ModelEntry>,
        signals: Vec<SignalSlot>,
        config: SimConfig,
    ) -> Self {
        Self {
            plan,
            models,
            signals,
            config,
            cycle: 0,
            current: None,
            poisoned: false,
        }
    }

    /// The compiled plan.
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Execution order.
    pub fn order(&self) -> &[ModelId] {
        &self.plan.order
    }

    /// Number of completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Qualified name of a model.
    pub fn model_name(&self, id: ModelId) -> Option<&str> {
        self.models.get(id.0).map(|m| m.name.as_str())
    }

    /// True once a failed step has stopped the simulation.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Execute every model once, in order.
    ///
    /// Any error stops the simulation: later calls return [`SimError::Poisoned`].
    pub fn step(&mut self) -> Result<CycleReport, SimError> {
        if self.poisoned {
            return Err(SimError::Poisoned);
        }
        let result = self.execute_cycle();
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// Like [`step`](Self::step), but a panicking model is reported as
    /// [`SimError::ModelPanicked`] instead of unwinding into the caller.
    pub fn step_contained(&mut self) -> Result<CycleReport, SimError> {
        if self.poisoned {
            return Err(SimError::Poisoned);
        }
        let result = catch_unwind(AssertUnwindSafe(|| self.execute_cycle()));
        match result {
            Ok(report) => {
                if report.is_err() {
                    self.poisoned = true;
                }
                report
            }
            Err(_) => {
                self.poisoned = true;
                let model = self
                    .current
                    .and_then(|id| self.model_name(id))
                    .unwrap_or("<unknown>")
                    .to_string();
                warn!(model = %model, cycle = self.cycle, "model panicked, simulation stopped");
                Err(SimError::ModelPanicked {
                    model,
                    cycle: self.cycle,
                })
            }
        }
    }

    fn execute_cycle(&mut self) -> Result<CycleReport, SimError> {
        let cycle = self.cycle;
        let mut report = CycleReport {
            cycle,
            partial: 0,
            exhausted: false,
        };
        for &id in &self.plan.order {
            self.current = Some(id);
            let entry = &mut self.models[id.0];
            let mut ctx = ExecContext::new(
                &entry.name,
                &entry.inputs,
                &entry.outputs,
                &self.signals,
                cycle,
            );
            let status = entry.model.execute(&mut ctx)?;

            if let Some(missing) = entry
                .outputs
                .iter()
                .find(|out| !self.signals[out.0].produced_in(cycle))
            {
                return Err(SimError::ValidLengthNotSet {
                    model: entry.name.clone(),
                    signal: self.signals[missing.0].name().to_string(),
                });
            }
            match status {
                ExecStatus::Complete => {}
                ExecStatus::Partial => report.partial += 1,
                ExecStatus::Exhausted => report.exhausted = true,
            }
            trace!(model = entry.name.as_str(), cycle, status = ?status, "executed");
        }
        self.current = None;
        self.cycle += 1;
        Ok(report)
    }

    /// Run up to `cycles` cycles.
    ///
    /// With `stop_on_exhaustion` set the run ends after the first cycle in which
    /// a source reports exhaustion.
    pub fn run(&mut self, cycles: u64) -> Result<RunSummary, SimError> {
        let mut summary = RunSummary::default();
        for _ in 0..cycles {
            let report = self.step()?;
            summary.cycles += 1;
            summary.partial_productions += report.partial as u64;
            if let Some(every) = self.config.progress_interval {
                if self.cycle % every == 0 {
                    info!(cycle = self.cycle, "simulation progress");
                }
            }
            if report.exhausted {
                summary.exhausted = true;
                if self.config.stop_on_exhaustion {
                    info!(cycle = report.cycle, "source exhausted, stopping");
                    break;
                }
            }
        }
        Ok(summary)
    }

    /// Run the configured number of cycles.
    pub fn run_configured(&mut self) -> Result<RunSummary, SimError> {
        let summary = self.run(self.config.cycles)?;
        info!(
            cycles = summary.cycles,
            partial = summary.partial_productions,
            exhausted = summary.exhausted,
            "run complete"
        );
        Ok(summary)
    }

    fn slot(&self, id: crate::signal::SignalId) -> Result<&SignalSlot, SimError> {
        self.signals
            .get(id.0)
            .ok_or(SimError::Config(ConfigError::UnknownSignal(id.0)))
    }

    /// Valid samples of a signal as left by the last cycle.
    pub fn read_view<T: Sample>(&self, signal: Signal<T>) -> Result<Ref<'_, [T]>, SimError> {
        self.slot(signal.id())?.read_view::<T>()
    }

    /// Valid length of a signal as left by the last cycle.
    pub fn valid_length<T: Sample>(&self, signal: Signal<T>) -> Result<usize, SimError> {
        Ok(self.slot(signal.id())?.valid_length())
    }

    /// Maximum block size resolved at finalize.
    pub fn block_size<T: Sample>(&self, signal: Signal<T>) -> Result<usize, SimError> {
        Ok(self.slot(signal.id())?.max_block_size().unwrap_or(0))
    }

    /// Sample interval resolved at finalize.
    pub fn samp_intvl<T: Sample>(&self, signal: Signal<T>) -> Result<f64, SimError> {
        Ok(self
            .slot(signal.id())?
            .samp_intvl()
            .unwrap_or(self.config.default_samp_intvl))
    }

    /// Signal bookkeeping, by untyped id.
    pub fn signal_slot(&self, id: crate::signal::SignalId) -> Option<&SignalSlot> {
        self.signals.get(id.0)
    }

    /// Tear every model down in execution order.
    ///
    /// All models get their teardown even if one fails; the first error is returned.
    pub fn teardown(mut self) -> Result<(), SimError> {
        let mut first_err = None;
        for &id in &self.plan.order {
            let entry = &mut self.models[id.0];
            if let Err(e) = entry.model.teardown() {
                warn!(model = %entry.name, error = %e, "teardown failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        info!(cycles = self.cycle, "simulation torn down");
        first_err.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("order", &self.plan.order)
            .field("models", &self.models.iter().map(|m| &m.name).collect::<Vec<_>>())
            .field("signals", &self.signals.len())
            .field("cycle", &self.cycle)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModelGraph;
    use crate::model::{PracSimModel, Ports};

    struct Counter {
        out: Signal<i32>,
        next: i32,
        stop_after: Option<i32>,
    }

    impl PracSimModel for Counter {
        fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
            let mut w = ctx.write_view(self.out)?;
            for v in w.iter_mut() {
                *v = self.next;
                self.next += 1;
            }
            ctx.set_valid_length(self.out, w.len())?;
            match self.stop_after {
                Some(n) if self.next >= n => Ok(ExecStatus::Exhausted),
                _ => Ok(ExecStatus::Complete),
            }
        }
    }

    // never sets its output's valid length
    struct Lazy {
        input: Signal<i32>,
    }

    impl PracSimModel for Lazy {
        fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
            let _ = ctx.read_view(self.input)?;
            Ok(ExecStatus::Complete)
        }
    }

    struct Bomb {
        input: Signal<i32>,
    }

    impl PracSimModel for Bomb {
        fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<ExecStatus, SimError> {
            let r = ctx.read_view(self.input)?;
            if r[0] >= 8 {
                panic!("bomb went off");
            }
            Ok(ExecStatus::Complete)
        }
    }

    fn counter(ports: &mut Ports<'_>, out: Signal<i32>, stop_after: Option<i32>) -> Result<Counter, SimError> {
        ports.declare_as_output(out)?;
        Ok(Counter {
            out,
            next: 0,
            stop_after,
        })
    }

    #[test]
    fn rt_counter_advances_each_cycle() {
        let mut graph = ModelGraph::new();
        let sig = graph.int_signal("count");
        graph.anchor(sig, 1.0, 4).unwrap();
        graph.add_model("counter", None, |p| counter(p, sig, None)).unwrap();
        let mut sim = graph.finalize().unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(&*sim.read_view(sig).unwrap(), &[4, 5, 6, 7]);
        assert_eq!(sim.cycle(), 2);
    }

    #[test]
    fn rt_missing_valid_length_is_an_error() {
        let mut graph = ModelGraph::new();
        let a = graph.int_signal("a");
        let b = graph.int_signal("b");
        graph.anchor(a, 1.0, 4).unwrap();
        graph.add_model("counter", None, |p| counter(p, a, None)).unwrap();
        graph
            .add_model("lazy", None, |p| {
                p.declare_as_input(a)?;
                p.declare_as_output(b)?;
                Ok(Lazy { input: a })
            })
            .unwrap();
        let mut sim = graph.finalize().unwrap();
        let err = sim.step().unwrap_err();
        assert!(matches!(err, SimError::ValidLengthNotSet { ref model, .. } if model == "lazy"));
        assert!(sim.is_poisoned());
        assert!(matches!(sim.step(), Err(SimError::Poisoned)));
    }

    #[test]
    fn rt_contained_panic_names_model_and_cycle() {
        let mut graph = ModelGraph::new();
        let a = graph.int_signal("a");
        graph.anchor(a, 1.0, 4).unwrap();
        graph.add_model("counter", None, |p| counter(p, a, None)).unwrap();
        graph
            .add_model("bomb", None, |p| {
                p.declare_as_input(a)?;
                Ok(Bomb { input: a })
            })
            .unwrap();
        let mut sim = graph.finalize().unwrap();
        sim.step_contained().unwrap();
        sim.step_contained().unwrap();
        let err = sim.step_contained().unwrap_err();
        assert!(matches!(err, SimError::ModelPanicked { ref model, cycle: 2 } if model == "bomb"));
        assert!(matches!(sim.step_contained(), Err(SimError::Poisoned)));
    }

    #[test]
    fn rt_run_stops_on_exhaustion() {
        let mut graph = ModelGraph::new();
        let sig = graph.int_signal("count");
        graph.anchor(sig, 1.0, 2).unwrap();
        graph.add_model("counter", None, |p| counter(p, sig, Some(6))).unwrap();
        let mut sim = graph.finalize().unwrap();
        let summary = sim.run(100).unwrap();
        assert_eq!(summary.cycles, 3);
        assert!(summary.exhausted);
        sim.teardown().unwrap();
    }

    #[test]
    fn rt_debug_lists_models() {
        let mut graph = ModelGraph::new();
        let sig = graph.int_signal("count");
        graph.anchor(sig, 1.0, 2).unwrap();
        graph.add_model("counter", None, |p| counter(p, sig, None)).unwrap();
        let sim = graph.finalize().unwrap();
        let debug_str = format!("{:?}", sim);
        assert!(debug_str.contains("counter"));
    }
}
