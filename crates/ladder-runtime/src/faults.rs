//! Scan fault log.
//!
//! A pre-allocated ring buffer of the most recent scan faults. Recording
//! never allocates; the oldest event is overwritten once the buffer is full.
//! Every recorded fault is also emitted through `tracing`: structural
//! faults at WARN, resource-exhaustion faults at ERROR.

use crate::scheduler::{FaultSeverity, ScanFault};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Default number of fault events retained.
pub const DEFAULT_FAULT_LOG_SIZE: usize = 64;

/// One recorded fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEvent {
    /// Scan cycle in which the fault occurred.
    pub cycle: u64,
    /// What went wrong.
    pub fault: ScanFault,
}

/// Fixed-capacity log of scan faults.
#[derive(Debug, Clone)]
pub struct FaultLog {
    events: Box<[Option<FaultEvent>]>,
    write_pos: usize,
    len: usize,
    total: u64,
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new(DEFAULT_FAULT_LOG_SIZE)
    }
}

impl FaultLog {
    /// Create a log retaining up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: vec![None; capacity].into_boxed_slice(),
            write_pos: 0,
            len: 0,
            total: 0,
        }
    }

    /// Record and log a fault.
    pub fn record(&mut self, cycle: u64, fault: ScanFault) {
        match fault.severity() {
            FaultSeverity::Structural => warn!(cycle, %fault, "scan fault, section abandoned"),
            FaultSeverity::ResourceExhaustion => {
                error!(cycle, %fault, "scan fault, engine stopped");
            }
        }

        self.events[self.write_pos] = Some(FaultEvent { cycle, fault });
        self.write_pos = (self.write_pos + 1) % self.events.len();
        self.len = (self.len + 1).min(self.events.len());
        self.total += 1;
    }

    /// Retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FaultEvent> {
        let cap = self.events.len();
        let start = (self.write_pos + cap - self.len) % cap;
        (0..self.len).filter_map(move |i| self.events[(start + i) % cap].as_ref())
    }

    /// Up to `count` most recent events, newest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&FaultEvent> {
        let mut events: Vec<_> = self.iter().collect();
        events.reverse();
        events.truncate(count);
        events
    }

    /// Most recent event.
    #[must_use]
    pub fn last(&self) -> Option<&FaultEvent> {
        self.recent(1).into_iter().next()
    }

    /// Remove and return every retained event, oldest first.
    pub fn drain(&mut self) -> Vec<FaultEvent> {
        let drained: Vec<FaultEvent> = self.iter().cloned().collect();
        self.events.iter_mut().for_each(|e| *e = None);
        self.write_pos = 0;
        self.len = 0;
        drained
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no event is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Faults recorded since creation, including overwritten and drained ones.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Capacity of the ring buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.events.len()
    }
}
