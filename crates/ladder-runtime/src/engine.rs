//! Scan-cycle controller.
//!
//! [`Engine`] owns every table of one ladder program: rungs, sections, the
//! function-block registry, and the Variable Store it runs against. One call
//! to [`Engine::refresh_all_sections`] is one scan cycle:
//!
//! 1. Advance timers by the elapsed time
//! 2. Scan every main ladder section, in declared order
//! 3. Latch edge-contact samples for the next cycle
//! 4. Record the cycle duration
//!
//! Structural faults abandon the faulty section only. Resource-exhaustion
//! faults stop the cycle and move the engine to FAULT.

use crate::evaluator::sample_edges;
use crate::faults::FaultLog;
use crate::registry::Registry;
use crate::rung::Rung;
use crate::scheduler::{FaultSeverity, ScanFault, SectionScheduler};
use crate::section::{Language, Program, Section};
use ladder_arith::ArithExpr;
use ladder_common::config::EngineConfig;
use ladder_common::error::{LadderError, LadderResult};
use ladder_common::metrics::CycleMetrics;
use ladder_common::state::{EngineState, StateMachine};
use ladder_common::vars::{MemoryStore, VariableStore};
use ladder_stdlib::{Counter, Timer};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Result of one scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Wall-clock time spent in the cycle.
    pub duration: Duration,
    /// Main sections scanned to completion.
    pub sections_scanned: usize,
    /// Faults recorded during the cycle.
    pub faults: usize,
    /// Engine state after the cycle.
    pub state: EngineState,
}

/// A ladder program with its runtime context.
#[derive(Debug)]
pub struct Engine<S = MemoryStore> {
    config: EngineConfig,
    pub(crate) program: Program,
    pub(crate) registry: Registry,
    pub(crate) store: S,
    state: StateMachine,
    scheduler: SectionScheduler,
    faults: FaultLog,
    metrics: CycleMetrics,
    cycle_count: u64,
    last_duration: Duration,
}

impl Engine<MemoryStore> {
    /// Create an engine with an in-memory Variable Store sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    pub fn new(config: EngineConfig) -> LadderResult<Self> {
        let store = MemoryStore::new(&config.sizes);
        Self::with_store(config, store)
    }
}

impl<S: VariableStore> Engine<S> {
    /// Create an engine running against an external Variable Store.
    ///
    /// All tables are allocated here; the engine starts in BOOT.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    pub fn with_store(config: EngineConfig, store: S) -> LadderResult<Self> {
        validate_config(&config)?;
        info!(
            rungs = config.sizes.rungs,
            sections = config.sizes.sections,
            counters = config.sizes.counters,
            timers = config.sizes.timers,
            "Initializing ladder engine"
        );

        let mut engine = Self {
            program: Program::new(&config.sizes),
            registry: Registry::new(&config.sizes),
            store,
            state: StateMachine::new(),
            scheduler: SectionScheduler::new(config.max_jumps_per_cycle),
            faults: FaultLog::new(config.metrics.fault_log_size),
            metrics: CycleMetrics::new(config.metrics.histogram_size, config.cycle_time),
            cycle_count: 0,
            last_duration: Duration::ZERO,
            config,
        };
        engine.reset();
        Ok(engine)
    }

    /// Clear every dynamic field, keeping structure and configuration.
    ///
    /// Element states, counter values and timer accumulators return to
    /// neutral; edge contacts re-latch the current variable values.
    pub fn reset(&mut self) {
        self.program.clear_dynamic();
        self.registry.reset_runtime();
        self.scheduler.begin_cycle();
        self.latch_edges();
        self.registry.publish(&mut self.store);
        debug!("Engine dynamic state reset");
    }

    /// Enter RUN (from BOOT or STOP).
    ///
    /// # Errors
    ///
    /// Returns an error from FAULT (acknowledge first) or RUN.
    pub fn start(&mut self) -> LadderResult<()> {
        self.state.transition(EngineState::Run)?;
        info!(cycle = self.cycle_count, "Engine running");
        Ok(())
    }

    /// Enter STOP from RUN (or from BOOT).
    ///
    /// # Errors
    ///
    /// Returns an error from FAULT or STOP.
    pub fn stop(&mut self) -> LadderResult<()> {
        self.state.transition(EngineState::Stop)?;
        info!(cycle = self.cycle_count, "Engine stopped");
        Ok(())
    }

    /// Leave FAULT for STOP.
    ///
    /// # Errors
    ///
    /// Returns an error unless the engine is in FAULT.
    pub fn acknowledge_fault(&mut self) -> LadderResult<()> {
        if self.state.state() != EngineState::Fault {
            return Err(LadderError::InvalidStateTransition {
                from: self.state.state().to_string(),
                to: EngineState::Stop.to_string(),
            });
        }
        self.state.transition(EngineState::Stop)?;
        info!("Fault acknowledged");
        Ok(())
    }

    /// Run one scan cycle.
    ///
    /// `elapsed` is the time since the previous cycle and feeds the timers.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError::NotRunning`] outside RUN. Scan faults are not
    /// errors: they are recorded in the fault log and counted in the report.
    pub fn refresh_all_sections(&mut self, elapsed: Duration) -> LadderResult<CycleReport> {
        let state = self.state.state();
        if !state.is_running() {
            return Err(LadderError::NotRunning(state.to_string()));
        }

        let started = Instant::now();
        self.cycle_count += 1;
        let cycle = self.cycle_count;

        self.registry.advance_timers(elapsed);
        self.scheduler.begin_cycle();

        let mut sections_scanned = 0;
        let mut faults = 0;
        for index in 0..self.program.sections.len() {
            let section = &self.program.sections[index];
            if !section.used || !section.is_main() || section.language != Language::Ladder {
                continue;
            }
            match self.scheduler.scan_section(
                index,
                &mut self.program,
                &mut self.registry,
                &mut self.store,
            ) {
                Ok(()) => sections_scanned += 1,
                Err(fault) => {
                    faults += 1;
                    if self.record_fault(cycle, fault) == FaultSeverity::ResourceExhaustion {
                        break;
                    }
                }
            }
        }

        self.latch_edges();

        let duration = started.elapsed();
        self.metrics.record(duration);
        self.last_duration = duration;
        trace!(
            cycle,
            duration_us = duration.as_micros(),
            sections_scanned,
            "Cycle complete"
        );

        Ok(CycleReport {
            cycle,
            duration,
            sections_scanned,
            faults,
            state: self.state.state(),
        })
    }

    /// Scan a single section outside the cycle (commissioning aid).
    ///
    /// Faults are recorded like in a cycle, but the lifecycle state is not
    /// checked, timers are not advanced and edge samples are not latched.
    ///
    /// # Errors
    ///
    /// Returns the scan fault, if any.
    pub fn scan_section(&mut self, section: usize) -> Result<(), ScanFault> {
        self.scheduler.begin_cycle();
        let result = self.scheduler.scan_section(
            section,
            &mut self.program,
            &mut self.registry,
            &mut self.store,
        );
        if let Err(fault) = &result {
            self.record_fault(self.cycle_count, fault.clone());
        }
        result
    }

    fn record_fault(&mut self, cycle: u64, fault: ScanFault) -> FaultSeverity {
        let severity = fault.severity();
        self.faults.record(cycle, fault);
        if severity == FaultSeverity::ResourceExhaustion {
            self.state.enter_fault();
        }
        severity
    }

    fn latch_edges(&mut self) {
        for rung in self.program.rungs.iter_mut().filter(|r| r.used) {
            sample_edges(rung, &self.store);
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state.state()
    }

    /// Variable Store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable Variable Store, e.g. to copy physical inputs in between cycles.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Rung in slot `index`, used or not.
    #[must_use]
    pub fn rung(&self, index: usize) -> Option<&Rung> {
        self.program.rungs.get(index)
    }

    /// Section in slot `index`, used or not.
    #[must_use]
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.program.sections.get(index)
    }

    /// Used rungs of a section, in chain order.
    #[must_use]
    pub fn section_rungs(&self, section: usize) -> Vec<usize> {
        self.program.chain(section)
    }

    /// Counter in slot `index`.
    #[must_use]
    pub fn counter(&self, index: usize) -> Option<&Counter> {
        self.registry.counters.get(index)
    }

    /// Timer in slot `index`.
    #[must_use]
    pub fn timer(&self, index: usize) -> Option<&Timer> {
        self.registry.timers.get(index)
    }

    /// Expression in slot `index`.
    #[must_use]
    pub fn expression(&self, index: usize) -> Option<&ArithExpr> {
        self.registry.exprs.get(index).and_then(Option::as_ref)
    }

    /// Fault log.
    #[must_use]
    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }

    /// Mutable fault log, e.g. to drain it.
    pub fn faults_mut(&mut self) -> &mut FaultLog {
        &mut self.faults
    }

    /// Cycle duration statistics.
    #[must_use]
    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    /// Cycles executed since creation.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Duration of the last cycle.
    #[must_use]
    pub fn last_duration(&self) -> Duration {
        self.last_duration
    }
}

fn validate_config(config: &EngineConfig) -> LadderResult<()> {
    if config.sizes.rungs == 0 || config.sizes.sections == 0 {
        return Err(LadderError::Config(
            "at least one rung and one section are required".into(),
        ));
    }
    if config.cycle_time.is_zero() {
        return Err(LadderError::Config("cycle time must be positive".into()));
    }
    Ok(())
}
