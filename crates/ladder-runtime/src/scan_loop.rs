//! Fixed-period scan loop.
//!
//! Scans and edits share one coarse lock ([`SharedEngine`]), so an edit
//! never lands in the middle of a cycle. The loop measures the real time
//! between scans and hands it to the timers.

use crate::engine::{CycleReport, Engine};
use ladder_common::error::{LadderError, LadderResult};
use ladder_common::state::EngineState;
use ladder_common::vars::{MemoryStore, VariableStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// An engine behind the edit/scan lock.
#[derive(Debug)]
pub struct SharedEngine<S = MemoryStore>(Arc<Mutex<Engine<S>>>);

impl<S> Clone for SharedEngine<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S: VariableStore> SharedEngine<S> {
    /// Wrap an engine.
    pub fn new(engine: Engine<S>) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    /// Run one cycle under the lock.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError::NotRunning`] outside RUN.
    pub fn scan(&self, elapsed: Duration) -> LadderResult<CycleReport> {
        self.lock().refresh_all_sections(elapsed)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Engine<S>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.lock().state()
    }

    // A panic inside an edit leaves the engine consistent: every edit
    // validates before mutating.
    fn lock(&self) -> MutexGuard<'_, Engine<S>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs cycles at the configured period until stopped.
#[derive(Debug)]
pub struct ScanLoop<S = MemoryStore> {
    engine: SharedEngine<S>,
    period: Duration,
    max_overrun: Duration,
    stop: Arc<AtomicBool>,
}

impl<S: VariableStore + Send + 'static> ScanLoop<S> {
    /// Build a loop timed from the engine's configuration.
    pub fn new(engine: SharedEngine<S>) -> Self {
        let (period, max_overrun) = engine.edit(|e| (e.config().cycle_time, e.config().max_overrun));
        Self {
            engine,
            period,
            max_overrun,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that makes the loop exit after the current cycle.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Scan until the stop flag is raised or the engine leaves RUN.
    /// Returns the number of cycles run.
    ///
    /// # Errors
    ///
    /// Propagates scan errors other than [`LadderError::NotRunning`], which
    /// ends the loop normally.
    pub fn run(&self) -> LadderResult<u64> {
        info!(period_us = self.period.as_micros(), "Scan loop started");
        let mut cycles = 0;
        let mut last = Instant::now();
        let mut deadline = last + self.period;

        while !self.stop.load(Ordering::Acquire) {
            let now = Instant::now();
            let elapsed = now - last;
            last = now;

            let report = match self.engine.scan(elapsed) {
                Ok(report) => report,
                Err(LadderError::NotRunning(state)) => {
                    info!(%state, "Engine not running, scan loop exiting");
                    break;
                }
                Err(e) => return Err(e),
            };
            cycles += 1;
            self.check_overrun(&report);

            if !report.state.is_running() {
                warn!(state = %report.state, cycle = report.cycle, "Engine left RUN, scan loop exiting");
                break;
            }

            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
                deadline += self.period;
            } else {
                // Late: restart the schedule instead of bursting to catch up
                deadline = now + self.period;
            }
        }

        info!(cycles, "Scan loop stopped");
        Ok(cycles)
    }

    fn check_overrun(&self, report: &CycleReport) {
        let Some(overrun) = report.duration.checked_sub(self.period) else {
            return;
        };
        if overrun.is_zero() {
            return;
        }
        if overrun > self.max_overrun {
            error!(
                cycle = report.cycle,
                execution_us = report.duration.as_micros(),
                deadline_us = self.period.as_micros(),
                overrun_us = overrun.as_micros(),
                "Critical scan overrun"
            );
        } else {
            warn!(
                cycle = report.cycle,
                execution_us = report.duration.as_micros(),
                deadline_us = self.period.as_micros(),
                "Scan overrun (within tolerance)"
            );
        }
    }

    /// Run the loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self) -> LadderResult<ScanLoopHandle> {
        let stop = self.stop_flag();
        let handle = thread::Builder::new()
            .name("ladder-scan".into())
            .spawn(move || self.run())
            .map_err(|e| LadderError::Config(format!("failed to spawn scan thread: {e}")))?;
        debug!("Scan thread spawned");
        Ok(ScanLoopHandle {
            stop,
            handle: Some(handle),
        })
    }
}

/// Handle to a scan loop running on its own thread.
#[derive(Debug)]
pub struct ScanLoopHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<LadderResult<u64>>>,
}

impl ScanLoopHandle {
    /// True once the loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Raise the stop flag and wait for the loop; returns the cycle count.
    ///
    /// # Errors
    ///
    /// Returns the loop's error, or an error if the thread panicked.
    pub fn stop_and_join(mut self) -> LadderResult<u64> {
        self.stop.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| LadderError::Config("scan thread panicked".into()))?,
            None => Ok(0),
        }
    }
}

impl Drop for ScanLoopHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
