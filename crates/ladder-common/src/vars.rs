//! Variable Store addressing.
//!
//! Every access from the engine is re-resolved through `(kind, index)`;
//! nothing holds a raw location across cycles. The store itself is an
//! external collaborator behind the [`VariableStore`] trait. [`MemoryStore`]
//! is the plain in-process implementation used by default and in tests.

use crate::config::TableSizes;
use crate::error::LadderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class of a variable in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    /// Memory bit (%B).
    MemBit,
    /// Physical input (%I).
    PhysInput,
    /// Physical output (%Q).
    PhysOutput,
    /// Sequential step activity (%X).
    StepActivity,
    /// Timer output (%TMn.Q).
    TimerDone,
    /// Timer running (%TMn.R).
    TimerRunning,
    /// Counter reached preset (%Cn.D).
    CounterDone,
    /// Counter underflow (%Cn.E).
    CounterEmpty,
    /// Counter overflow (%Cn.F).
    CounterFull,
    /// Memory word (%W).
    MemWord,
    /// Counter preset (%Cn.P).
    CounterPreset,
    /// Counter current value (%Cn.V).
    CounterValue,
    /// Timer preset in base units (%TMn.P).
    TimerPreset,
    /// Timer current value in base units (%TMn.V).
    TimerValue,
}

impl VarKind {
    /// Every kind, in ordinal order.
    pub const ALL: [VarKind; 14] = [
        VarKind::MemBit,
        VarKind::PhysInput,
        VarKind::PhysOutput,
        VarKind::StepActivity,
        VarKind::TimerDone,
        VarKind::TimerRunning,
        VarKind::CounterDone,
        VarKind::CounterEmpty,
        VarKind::CounterFull,
        VarKind::MemWord,
        VarKind::CounterPreset,
        VarKind::CounterValue,
        VarKind::TimerPreset,
        VarKind::TimerValue,
    ];

    /// True for the boolean classes.
    #[must_use]
    pub fn is_bool(self) -> bool {
        !self.is_word()
    }

    /// True for the word classes.
    #[must_use]
    pub fn is_word(self) -> bool {
        matches!(
            self,
            Self::MemWord
                | Self::CounterPreset
                | Self::CounterValue
                | Self::TimerPreset
                | Self::TimerValue
        )
    }

    /// Number of addressable entries of this kind for the given sizes.
    #[must_use]
    pub fn capacity(self, sizes: &TableSizes) -> usize {
        match self {
            Self::MemBit => sizes.bits,
            Self::PhysInput => sizes.phys_inputs,
            Self::PhysOutput => sizes.phys_outputs,
            Self::StepActivity => sizes.steps,
            Self::MemWord => sizes.words,
            Self::TimerDone | Self::TimerRunning | Self::TimerPreset | Self::TimerValue => {
                sizes.timers
            }
            Self::CounterDone
            | Self::CounterEmpty
            | Self::CounterFull
            | Self::CounterPreset
            | Self::CounterValue => sizes.counters,
        }
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

/// A typed address into the Variable Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarAddr {
    /// Variable class.
    pub kind: VarKind,
    /// Index within the class.
    pub index: usize,
}

impl VarAddr {
    /// Build an address.
    #[must_use]
    pub const fn new(kind: VarKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for VarAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = self.index;
        match self.kind {
            VarKind::MemBit => write!(f, "%B{i}"),
            VarKind::PhysInput => write!(f, "%I{i}"),
            VarKind::PhysOutput => write!(f, "%Q{i}"),
            VarKind::StepActivity => write!(f, "%X{i}"),
            VarKind::MemWord => write!(f, "%W{i}"),
            VarKind::TimerDone => write!(f, "%TM{i}.Q"),
            VarKind::TimerRunning => write!(f, "%TM{i}.R"),
            VarKind::TimerPreset => write!(f, "%TM{i}.P"),
            VarKind::TimerValue => write!(f, "%TM{i}.V"),
            VarKind::CounterDone => write!(f, "%C{i}.D"),
            VarKind::CounterEmpty => write!(f, "%C{i}.E"),
            VarKind::CounterFull => write!(f, "%C{i}.F"),
            VarKind::CounterPreset => write!(f, "%C{i}.P"),
            VarKind::CounterValue => write!(f, "%C{i}.V"),
        }
    }
}

impl FromStr for VarAddr {
    type Err = LadderError;

    /// Parse `%B3`, `%W10`, `%C0.V`, `%TM2.Q`, ... (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LadderError::InvalidAddress(s.to_string());
        let upper = s.trim().to_ascii_uppercase();
        let body = upper.strip_prefix('%').ok_or_else(invalid)?;

        let (prefix, rest) = if let Some(rest) = body.strip_prefix("TM") {
            ("TM", rest)
        } else {
            let split = body.char_indices().nth(1).map_or(body.len(), |(i, _)| i);
            body.split_at(split)
        };

        let (number, attribute) = match rest.split_once('.') {
            Some((n, a)) => (n, Some(a)),
            None => (rest, None),
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index: usize = number.parse().map_err(|_| invalid())?;

        let kind = match (prefix, attribute) {
            ("B", None) => VarKind::MemBit,
            ("I", None) => VarKind::PhysInput,
            ("Q", None) => VarKind::PhysOutput,
            ("X", None) => VarKind::StepActivity,
            ("W", None) => VarKind::MemWord,
            ("TM", Some("Q")) => VarKind::TimerDone,
            ("TM", Some("R")) => VarKind::TimerRunning,
            ("TM", Some("P")) => VarKind::TimerPreset,
            ("TM", Some("V")) => VarKind::TimerValue,
            ("C", Some("D")) => VarKind::CounterDone,
            ("C", Some("E")) => VarKind::CounterEmpty,
            ("C", Some("F")) => VarKind::CounterFull,
            ("C", Some("P")) => VarKind::CounterPreset,
            ("C", Some("V")) => VarKind::CounterValue,
            _ => return Err(invalid()),
        };
        Ok(VarAddr::new(kind, index))
    }
}

/// Non-blocking typed access to the variable memory.
pub trait VariableStore {
    /// Read a variable; boolean classes read as 0 or 1.
    fn read(&self, kind: VarKind, index: usize) -> i32;

    /// Write a variable.
    fn write(&mut self, kind: VarKind, index: usize, value: i32);

    /// Read a boolean view of a variable.
    fn read_bool(&self, kind: VarKind, index: usize) -> bool {
        self.read(kind, index) != 0
    }

    /// Write a boolean as 0/1.
    fn write_bool(&mut self, kind: VarKind, index: usize, value: bool) {
        self.write(kind, index, i32::from(value));
    }

    /// Read through an address.
    fn read_addr(&self, addr: VarAddr) -> i32 {
        self.read(addr.kind, addr.index)
    }

    /// Write through an address.
    fn write_addr(&mut self, addr: VarAddr, value: i32) {
        self.write(addr.kind, addr.index, value);
    }
}

/// Fixed-size in-memory variable store, one table per [`VarKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    tables: Vec<Box<[i32]>>,
}

impl MemoryStore {
    /// Allocate every table at the configured size, zero-filled.
    #[must_use]
    pub fn new(sizes: &TableSizes) -> Self {
        let tables = VarKind::ALL
            .iter()
            .map(|kind| vec![0; kind.capacity(sizes)].into_boxed_slice())
            .collect();
        Self { tables }
    }

    /// Number of entries of `kind`.
    #[must_use]
    pub fn len(&self, kind: VarKind) -> usize {
        self.tables[kind.ordinal()].len()
    }

    /// Zero every variable.
    pub fn clear(&mut self) {
        for table in &mut self.tables {
            table.fill(0);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&TableSizes::default())
    }
}

impl VariableStore for MemoryStore {
    fn read(&self, kind: VarKind, index: usize) -> i32 {
        self.tables[kind.ordinal()].get(index).copied().unwrap_or(0)
    }

    fn write(&mut self, kind: VarKind, index: usize, value: i32) {
        let value = if kind.is_bool() { i32::from(value != 0) } else { value };
        match self.tables[kind.ordinal()].get_mut(index) {
            Some(slot) => *slot = value,
            None => tracing::trace!(?kind, index, "write outside variable table ignored"),
        }
    }
}
