//! Function-block registry.
//!
//! Counters, timers and arithmetic expressions live in fixed-capacity
//! tables addressed by slot index, independent of rung position. A slot is
//! owned by at most one live element; allocation happens on placement and
//! release on erase.

use ladder_arith::ArithExpr;
use ladder_common::config::TableSizes;
use ladder_common::error::{LadderError, LadderResult};
use ladder_common::vars::{VarKind, VariableStore};
use ladder_stdlib::{Counter, Timer};
use std::time::Duration;

/// Location of the live cell owning a block slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    /// Rung index.
    pub rung: usize,
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot<T> {
    item: T,
    owner: Option<CellRef>,
}

/// One fixed-capacity table of blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTable<T> {
    what: &'static str,
    slots: Vec<Slot<T>>,
}

impl<T: Default> BlockTable<T> {
    fn new(what: &'static str, capacity: usize) -> Self {
        Self {
            what,
            slots: (0..capacity).map(|_| Slot { item: T::default(), owner: None }).collect(),
        }
    }

    /// Claim the first free slot for `owner`, initialised to `item`.
    pub fn allocate(&mut self, owner: CellRef, item: T) -> LadderResult<usize> {
        let index = self
            .slots
            .iter()
            .position(|s| s.owner.is_none())
            .ok_or(LadderError::NoFreeSlot(self.what))?;
        self.slots[index] = Slot { item, owner: Some(owner) };
        Ok(index)
    }

    /// Claim a specific slot (used when loading a project).
    pub fn claim(&mut self, index: usize, owner: CellRef) -> LadderResult<()> {
        let slot = self.slot_mut(index)?;
        if let Some(existing) = slot.owner {
            return Err(LadderError::Project(format!(
                "{} {index} owned by both rung {} ({}, {}) and rung {} ({}, {})",
                self.what, existing.rung, existing.x, existing.y, owner.rung, owner.x, owner.y
            )));
        }
        slot.owner = Some(owner);
        Ok(())
    }

    /// Free a slot and reset its content.
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Slot { item: T::default(), owner: None };
        }
    }
}

impl<T> BlockTable<T> {
    fn slot_mut(&mut self, index: usize) -> LadderResult<&mut Slot<T>> {
        let capacity = self.slots.len();
        self.slots.get_mut(index).ok_or(LadderError::OutOfRange {
            what: self.what,
            index,
            capacity,
        })
    }

    /// Block in slot `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).map(|s| &s.item)
    }

    /// Mutable block in slot `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).map(|s| &mut s.item)
    }

    /// Owned block in slot `index`, or a configuration error.
    pub fn owned_mut(&mut self, index: usize) -> LadderResult<&mut T> {
        let what = self.what;
        let slot = self.slot_mut(index)?;
        if slot.owner.is_none() {
            return Err(LadderError::Config(format!("{what} {index} is not allocated")));
        }
        Ok(&mut slot.item)
    }

    /// Live cell owning slot `index`.
    #[must_use]
    pub fn owner(&self, index: usize) -> Option<CellRef> {
        self.slots.get(index).and_then(|s| s.owner)
    }

    /// Table capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate allocated `(index, block)` pairs.
    pub fn iter_owned(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.owner.is_some())
            .map(|(i, s)| (i, &s.item))
    }

    fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().map(|s| &mut s.item)
    }
}

/// All function-block tables of one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    /// Counter table.
    pub counters: BlockTable<Counter>,
    /// Timer table.
    pub timers: BlockTable<Timer>,
    /// Compare/Operate expression table.
    pub exprs: BlockTable<Option<ArithExpr>>,
}

impl Registry {
    /// Allocate empty tables.
    #[must_use]
    pub fn new(sizes: &TableSizes) -> Self {
        Self {
            counters: BlockTable::new("counter", sizes.counters),
            timers: BlockTable::new("timer", sizes.timers),
            exprs: BlockTable::new("arithmetic expression", sizes.arithm_exprs),
        }
    }

    /// Feed elapsed scan time to every timer.
    pub fn advance_timers(&mut self, elapsed: Duration) {
        for timer in self.timers.items_mut() {
            timer.advance(elapsed);
        }
    }

    /// Clear counter and timer runtime state, keeping their configuration.
    pub fn reset_runtime(&mut self) {
        for counter in self.counters.items_mut() {
            counter.reset();
        }
        for timer in self.timers.items_mut() {
            timer.reset();
        }
    }

    /// Publish every counter and timer to the Variable Store.
    pub fn publish<S: VariableStore + ?Sized>(&self, store: &mut S) {
        for (index, counter) in self.counters.slots.iter().enumerate() {
            publish_counter(store, index, &counter.item);
        }
        for (index, timer) in self.timers.slots.iter().enumerate() {
            publish_timer(store, index, &timer.item);
        }
    }
}

/// Write a counter's preset, value and flags to the store.
pub fn publish_counter<S: VariableStore + ?Sized>(store: &mut S, index: usize, counter: &Counter) {
    let out = counter.outputs();
    store.write(VarKind::CounterValue, index, counter.value());
    store.write(VarKind::CounterPreset, index, counter.preset());
    store.write_bool(VarKind::CounterDone, index, out.done);
    store.write_bool(VarKind::CounterEmpty, index, out.empty);
    store.write_bool(VarKind::CounterFull, index, out.full);
}

/// Write a timer's preset, value and flags to the store.
pub fn publish_timer<S: VariableStore + ?Sized>(store: &mut S, index: usize, timer: &Timer) {
    let out = timer.outputs();
    store.write(VarKind::TimerValue, index, timer.value());
    store.write(VarKind::TimerPreset, index, timer.preset());
    store.write_bool(VarKind::TimerDone, index, out.done);
    store.write_bool(VarKind::TimerRunning, index, out.running);
}
