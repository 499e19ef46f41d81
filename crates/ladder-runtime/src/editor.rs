//! Editing operations.
//!
//! Every edit is validated before anything is changed and reports
//! configuration faults to the caller; the running scan never sees a
//! half-applied edit. Function-block slots are allocated first-free when a
//! block is placed and released when it is erased, including when its rung
//! or section is deleted.

use crate::element::{Element, ElementKind, Operand};
use crate::engine::Engine;
use crate::registry::{publish_counter, publish_timer, CellRef};
use crate::rung::{Rung, OUTPUT_COLUMN, RUNG_HEIGHT, RUNG_WIDTH};
use crate::section::{Language, Section};
use ladder_arith::{ArithError, ArithExpr, CompareExpr, OperateExpr};
use ladder_common::error::{LadderError, LadderResult};
use ladder_common::vars::{VarAddr, VarKind, VariableStore};
use ladder_stdlib::{Counter, TimeBase, Timer, TimerMode, COUNTER_MAX};
use tracing::{debug, info};

fn expression_error(e: &ArithError) -> LadderError {
    LadderError::Expression(e.to_string())
}

fn placement(x: usize, y: usize, reason: impl Into<String>) -> LadderError {
    LadderError::Placement { x, y, reason: reason.into() }
}

impl<S: VariableStore> Engine<S> {
    // ---- sections ----

    /// Create a section holding one empty rung; returns its index.
    ///
    /// # Errors
    ///
    /// Fails when no section or rung slot is free, or when `subroutine_id`
    /// is already used by another section.
    pub fn add_section(
        &mut self,
        name: &str,
        language: Language,
        subroutine_id: Option<u32>,
    ) -> LadderResult<usize> {
        if let Some(id) = subroutine_id {
            if self.program.find_subroutine(id).is_some() {
                return Err(LadderError::Config(format!("subroutine SR{id} already defined")));
            }
        }
        let index = self.program.free_section().ok_or(LadderError::NoFreeSlot("section"))?;
        let rung = self.program.free_rung().ok_or(LadderError::NoFreeSlot("rung"))?;

        self.program.rungs[rung] = Rung::new();
        self.program.sections[index] = Section {
            used: true,
            name: name.to_string(),
            language,
            subroutine_id,
            first_rung: rung,
            last_rung: rung,
        };
        info!(section = index, name, ?subroutine_id, "Section added");
        Ok(index)
    }

    /// Delete a section with all its rungs and their blocks.
    ///
    /// # Errors
    ///
    /// Fails if the section is not in use.
    pub fn delete_section(&mut self, section: usize) -> LadderResult<()> {
        self.check_section(section)?;
        for rung in self.program.chain(section) {
            self.clear_rung(rung);
        }
        self.program.sections[section] = Section::default();
        info!(section, "Section deleted");
        Ok(())
    }

    // ---- rungs ----

    /// Insert an empty rung after `rung` in `section`; returns its index.
    ///
    /// # Errors
    ///
    /// Fails if `rung` is not in the section's chain or no rung slot is free.
    pub fn insert_rung_after(&mut self, section: usize, rung: usize) -> LadderResult<usize> {
        self.check_chain_member(section, rung)?;
        let new = self.program.free_rung().ok_or(LadderError::NoFreeSlot("rung"))?;
        let next = self.program.rungs[rung].next;

        self.program.rungs[new] = Rung {
            prev: Some(rung),
            next,
            ..Rung::new()
        };
        self.program.rungs[rung].next = Some(new);
        if let Some(next) = next {
            self.program.rungs[next].prev = Some(new);
        }
        let sec = &mut self.program.sections[section];
        if sec.last_rung == rung {
            sec.last_rung = new;
        }
        debug!(section, after = rung, rung = new, "Rung inserted");
        Ok(new)
    }

    /// Insert an empty rung before `rung` in `section`; returns its index.
    ///
    /// # Errors
    ///
    /// Fails if `rung` is not in the section's chain or no rung slot is free.
    pub fn insert_rung_before(&mut self, section: usize, rung: usize) -> LadderResult<usize> {
        self.check_chain_member(section, rung)?;
        let new = self.program.free_rung().ok_or(LadderError::NoFreeSlot("rung"))?;
        let prev = self.program.rungs[rung].prev;

        self.program.rungs[new] = Rung {
            prev,
            next: Some(rung),
            ..Rung::new()
        };
        self.program.rungs[rung].prev = Some(new);
        if let Some(prev) = prev {
            self.program.rungs[prev].next = Some(new);
        }
        let sec = &mut self.program.sections[section];
        if sec.first_rung == rung {
            sec.first_rung = new;
        }
        debug!(section, before = rung, rung = new, "Rung inserted");
        Ok(new)
    }

    /// Remove a rung from its section, releasing its blocks.
    ///
    /// # Errors
    ///
    /// Fails if `rung` is not in the section's chain or is its only rung.
    pub fn delete_rung(&mut self, section: usize, rung: usize) -> LadderResult<()> {
        self.check_chain_member(section, rung)?;
        let sec = &self.program.sections[section];
        if sec.first_rung == rung && sec.last_rung == rung {
            return Err(LadderError::Config(format!(
                "rung {rung} is the only rung of section {section}"
            )));
        }

        let Rung { prev, next, .. } = self.program.rungs[rung];
        if let Some(prev) = prev {
            self.program.rungs[prev].next = next;
        }
        if let Some(next) = next {
            self.program.rungs[next].prev = prev;
        }
        let sec = &mut self.program.sections[section];
        if sec.first_rung == rung {
            sec.first_rung = next.unwrap_or(rung);
        }
        if sec.last_rung == rung {
            sec.last_rung = prev.unwrap_or(rung);
        }
        self.clear_rung(rung);
        debug!(section, rung, "Rung deleted");
        Ok(())
    }

    /// Set a rung's label and comment.
    ///
    /// # Errors
    ///
    /// Fails if the rung is not in use.
    pub fn set_label_comment(&mut self, rung: usize, label: &str, comment: &str) -> LadderResult<()> {
        let r = self.used_rung_mut(rung)?;
        r.label = label.to_string();
        r.comment = comment.to_string();
        Ok(())
    }

    // ---- single-cell elements ----

    /// Place a single-cell element, replacing whatever single-cell element
    /// was there. Placing [`ElementKind::Free`] erases the cell.
    ///
    /// # Errors
    ///
    /// Fails on out-of-grid cells, cells covered by a block, outputs outside
    /// the last column (or non-outputs inside it), and operands that do not
    /// suit the kind.
    pub fn place_element(
        &mut self,
        rung: usize,
        x: usize,
        y: usize,
        kind: ElementKind,
        operand: Operand,
    ) -> LadderResult<()> {
        if kind == ElementKind::Free {
            return self.erase_element(rung, x, y);
        }
        if kind.is_block() || kind == ElementKind::Unusable {
            return Err(placement(x, y, format!("{kind:?} must be placed as a block")));
        }
        self.check_column(x, y, kind)?;
        let operand = self.check_operand(x, y, kind, operand)?;

        let cell = self.used_rung_mut(rung)?.grid.get_mut(x, y).ok_or_else(|| out_of_grid(x, y))?;
        if cell.kind.is_block() || cell.kind == ElementKind::Unusable {
            return Err(placement(x, y, "cell is covered by a block"));
        }
        *cell = Element {
            connected_with_top: cell.connected_with_top,
            ..Element::new(kind, operand)
        };
        debug!(rung, x, y, ?kind, "Element placed");
        Ok(())
    }

    /// Set or clear the index variable of a contact or coil.
    ///
    /// # Errors
    ///
    /// Fails if the cell does not hold a variable operand.
    pub fn set_index_operand(
        &mut self,
        rung: usize,
        x: usize,
        y: usize,
        index: Option<VarAddr>,
    ) -> LadderResult<()> {
        if let Some(addr) = index {
            if !addr.kind.is_word() {
                return Err(LadderError::InvalidAddress(format!("{addr} is not a word variable")));
            }
            self.check_var(addr)?;
        }
        let cell = self.used_rung_mut(rung)?.grid.get_mut(x, y).ok_or_else(|| out_of_grid(x, y))?;
        if !matches!(cell.operand, Operand::Var(_)) {
            return Err(placement(x, y, "element has no variable operand"));
        }
        cell.index_operand = index;
        Ok(())
    }

    /// Set or clear the vertical link joining `(x, y)` to the cell above.
    ///
    /// # Errors
    ///
    /// Fails out of the grid, when linking row 0 upwards, or when linking
    /// below the top row of a block.
    pub fn set_vertical_link(&mut self, rung: usize, x: usize, y: usize, connected: bool) -> LadderResult<()> {
        if connected && y == 0 {
            return Err(placement(x, y, "row 0 has no cell above"));
        }
        let grid = &mut self.used_rung_mut(rung)?.grid;
        if connected && grid.is_inner_block_row(x, y) {
            return Err(placement(x, y, "cell is inside a block"));
        }
        let cell = grid.get_mut(x, y).ok_or_else(|| out_of_grid(x, y))?;
        cell.connected_with_top = connected;
        Ok(())
    }

    /// Erase the element at `(x, y)`. Erasing any cell of a block erases the
    /// whole block and releases its slot. Vertical links are kept.
    ///
    /// # Errors
    ///
    /// Fails out of the grid or on an unused rung.
    pub fn erase_element(&mut self, rung: usize, x: usize, y: usize) -> LadderResult<()> {
        let cell = *self.used_rung(rung)?.grid.get(x, y).ok_or_else(|| out_of_grid(x, y))?;
        if cell.kind.is_block() || cell.kind == ElementKind::Unusable {
            self.erase_block(rung, cell.operand);
        } else {
            let target = self.program.rungs[rung].grid.cell_mut(x, y);
            *target = Element {
                connected_with_top: target.connected_with_top,
                ..Element::default()
            };
        }
        debug!(rung, x, y, "Element erased");
        Ok(())
    }

    // ---- blocks ----

    /// Place a counter whose live (top-right) cell is `(x, y)`; returns its slot.
    ///
    /// # Errors
    ///
    /// Fails on a bad footprint, a preset outside `0..=COUNTER_MAX`, or when
    /// no counter slot is free.
    pub fn place_counter(&mut self, rung: usize, x: usize, y: usize, preset: i32) -> LadderResult<usize> {
        check_counter_preset(preset)?;
        self.check_footprint(rung, x, y, ElementKind::Counter)?;
        let slot = self
            .registry
            .counters
            .allocate(CellRef { rung, x, y }, Counter::new(preset))?;
        self.fill_footprint(rung, x, y, ElementKind::Counter, Operand::Counter(slot));
        if let Some(counter) = self.registry.counters.get(slot) {
            publish_counter(&mut self.store, slot, counter);
        }
        info!(rung, x, y, slot, preset, "Counter placed");
        Ok(slot)
    }

    /// Place a timer whose live (top-right) cell is `(x, y)`; returns its slot.
    ///
    /// # Errors
    ///
    /// Fails on a bad footprint, a negative preset, or when no timer slot
    /// is free.
    pub fn place_timer(
        &mut self,
        rung: usize,
        x: usize,
        y: usize,
        preset: i32,
        base: TimeBase,
        mode: TimerMode,
    ) -> LadderResult<usize> {
        check_timer_preset(preset)?;
        self.check_footprint(rung, x, y, ElementKind::Timer)?;
        let slot = self
            .registry
            .timers
            .allocate(CellRef { rung, x, y }, Timer::new(preset, base, mode))?;
        self.fill_footprint(rung, x, y, ElementKind::Timer, Operand::Timer(slot));
        if let Some(timer) = self.registry.timers.get(slot) {
            publish_timer(&mut self.store, slot, timer);
        }
        info!(rung, x, y, slot, preset, ?base, ?mode, "Timer placed");
        Ok(slot)
    }

    /// Place a compare block whose live (right) cell is `(x, y)`; returns
    /// its expression slot.
    ///
    /// # Errors
    ///
    /// Fails on a bad footprint, an invalid expression, or when no
    /// expression slot is free.
    pub fn place_compare(&mut self, rung: usize, x: usize, y: usize, text: &str) -> LadderResult<usize> {
        let expr = CompareExpr::parse(text).map_err(|e| expression_error(&e))?;
        self.place_arith(rung, x, y, ElementKind::Compare, ArithExpr::Compare(expr))
    }

    /// Place an operate block whose live (right) cell is `(x, y)`, which
    /// must be in the last column; returns its expression slot.
    ///
    /// # Errors
    ///
    /// Fails on a bad footprint, an invalid expression, or when no
    /// expression slot is free.
    pub fn place_operate(&mut self, rung: usize, x: usize, y: usize, text: &str) -> LadderResult<usize> {
        let expr = OperateExpr::parse(text).map_err(|e| expression_error(&e))?;
        self.place_arith(rung, x, y, ElementKind::Operate, ArithExpr::Operate(expr))
    }

    fn place_arith(
        &mut self,
        rung: usize,
        x: usize,
        y: usize,
        kind: ElementKind,
        expr: ArithExpr,
    ) -> LadderResult<usize> {
        expr.validate(&self.config().sizes).map_err(|e| expression_error(&e))?;
        self.check_footprint(rung, x, y, kind)?;
        let text = expr.text().to_string();
        let slot = self.registry.exprs.allocate(CellRef { rung, x, y }, Some(expr))?;
        self.fill_footprint(rung, x, y, kind, Operand::Arith(slot));
        info!(rung, x, y, slot, expr = %text, "{kind:?} block placed");
        Ok(slot)
    }

    /// Change a counter's preset, keeping its value.
    ///
    /// # Errors
    ///
    /// Fails if the slot is not allocated or the preset is out of range.
    pub fn configure_counter(&mut self, slot: usize, preset: i32) -> LadderResult<()> {
        check_counter_preset(preset)?;
        self.registry.counters.owned_mut(slot)?.set_preset(preset);
        if let Some(counter) = self.registry.counters.get(slot) {
            publish_counter(&mut self.store, slot, counter);
        }
        info!(slot, preset, "Counter configured");
        Ok(())
    }

    /// Reconfigure a timer, clearing its runtime state.
    ///
    /// # Errors
    ///
    /// Fails if the slot is not allocated or the preset is negative.
    pub fn configure_timer(&mut self, slot: usize, preset: i32, base: TimeBase, mode: TimerMode) -> LadderResult<()> {
        check_timer_preset(preset)?;
        self.registry.timers.owned_mut(slot)?.configure(preset, base, mode);
        if let Some(timer) = self.registry.timers.get(slot) {
            publish_timer(&mut self.store, slot, timer);
        }
        info!(slot, preset, ?base, ?mode, "Timer configured");
        Ok(())
    }

    /// Replace the expression of a compare or operate block.
    ///
    /// The new text must be of the same form as the block it belongs to.
    ///
    /// # Errors
    ///
    /// Fails if the slot is not allocated or the text does not parse or
    /// validate; the previous expression is kept in that case.
    pub fn set_expression(&mut self, slot: usize, text: &str) -> LadderResult<()> {
        let sizes = self.config().sizes.clone();
        let current = self.registry.exprs.owned_mut(slot)?;
        let expr = match current {
            Some(ArithExpr::Compare(_)) => CompareExpr::parse(text).map(ArithExpr::Compare),
            Some(ArithExpr::Operate(_)) => OperateExpr::parse(text).map(ArithExpr::Operate),
            None => return Err(LadderError::Config(format!("expression slot {slot} is empty"))),
        }
        .map_err(|e| expression_error(&e))?;
        expr.validate(&sizes).map_err(|e| expression_error(&e))?;
        info!(slot, expr = expr.text(), "Expression changed");
        *current = Some(expr);
        Ok(())
    }

    // ---- helpers ----

    fn check_section(&self, section: usize) -> LadderResult<()> {
        match self.program.sections.get(section) {
            None => Err(LadderError::OutOfRange {
                what: "section",
                index: section,
                capacity: self.program.sections.len(),
            }),
            Some(s) if !s.used => Err(LadderError::Config(format!("section {section} is not in use"))),
            Some(_) => Ok(()),
        }
    }

    fn check_chain_member(&self, section: usize, rung: usize) -> LadderResult<()> {
        self.check_section(section)?;
        if self.program.chain(section).contains(&rung) {
            Ok(())
        } else {
            Err(LadderError::Config(format!("rung {rung} is not in section {section}")))
        }
    }

    fn used_rung(&self, rung: usize) -> LadderResult<&Rung> {
        match self.program.rungs.get(rung) {
            None => Err(LadderError::OutOfRange {
                what: "rung",
                index: rung,
                capacity: self.program.rungs.len(),
            }),
            Some(r) if !r.used => Err(LadderError::Config(format!("rung {rung} is not in use"))),
            Some(r) => Ok(r),
        }
    }

    fn used_rung_mut(&mut self, rung: usize) -> LadderResult<&mut Rung> {
        self.used_rung(rung)?;
        Ok(&mut self.program.rungs[rung])
    }

    pub(crate) fn check_column(&self, x: usize, y: usize, kind: ElementKind) -> LadderResult<()> {
        if x >= RUNG_WIDTH || y >= RUNG_HEIGHT {
            return Err(out_of_grid(x, y));
        }
        match (kind.is_output(), x == OUTPUT_COLUMN) {
            (true, false) => Err(placement(x, y, format!("{kind:?} must be in the last column"))),
            (false, true) => Err(placement(x, y, "the last column only holds outputs")),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_var(&self, addr: VarAddr) -> LadderResult<()> {
        let capacity = addr.kind.capacity(&self.config().sizes);
        if addr.index >= capacity {
            return Err(LadderError::OutOfRange {
                what: "variable",
                index: addr.index,
                capacity,
            });
        }
        Ok(())
    }

    pub(crate) fn check_operand(&self, x: usize, y: usize, kind: ElementKind, operand: Operand) -> LadderResult<Operand> {
        match (kind, operand) {
            (ElementKind::HorizontalLink, _) => Ok(Operand::None),
            (k, Operand::Var(addr)) if k.is_contact() => {
                if !addr.kind.is_bool() {
                    return Err(LadderError::InvalidAddress(format!("{addr} is not a bit variable")));
                }
                self.check_var(addr)?;
                Ok(operand)
            }
            (k, Operand::Var(addr)) if k.is_coil() => {
                if !matches!(addr.kind, VarKind::MemBit | VarKind::PhysOutput | VarKind::StepActivity) {
                    return Err(LadderError::InvalidAddress(format!("{addr} cannot be written by a coil")));
                }
                self.check_var(addr)?;
                Ok(operand)
            }
            (ElementKind::CoilJump, Operand::Rung(target)) => {
                if target >= self.program.rungs.len() {
                    return Err(LadderError::OutOfRange {
                        what: "rung",
                        index: target,
                        capacity: self.program.rungs.len(),
                    });
                }
                Ok(operand)
            }
            (ElementKind::CoilCall, Operand::Subroutine(_)) => Ok(operand),
            _ => Err(placement(x, y, format!("{operand:?} is not a valid operand for {kind:?}"))),
        }
    }

    fn check_footprint(&self, rung: usize, x: usize, y: usize, kind: ElementKind) -> LadderResult<()> {
        let (width, height) = kind.footprint();
        if x >= RUNG_WIDTH || y + height > RUNG_HEIGHT || x + 1 < width {
            return Err(placement(x, y, format!("{kind:?} does not fit in the grid")));
        }
        self.check_column(x, y, kind)?;
        let grid = &self.used_rung(rung)?.grid;
        for cx in x + 1 - width..=x {
            for cy in y..y + height {
                let cell = grid.cell(cx, cy);
                if cell.kind.is_block() || cell.kind == ElementKind::Unusable {
                    return Err(placement(cx, cy, "overlaps another block"));
                }
            }
        }
        Ok(())
    }

    fn fill_footprint(&mut self, rung: usize, x: usize, y: usize, kind: ElementKind, operand: Operand) {
        let (width, height) = kind.footprint();
        let grid = &mut self.program.rungs[rung].grid;
        for cx in x + 1 - width..=x {
            for cy in y..y + height {
                let cell = grid.cell_mut(cx, cy);
                let cell_kind = if (cx, cy) == (x, y) { kind } else { ElementKind::Unusable };
                *cell = Element {
                    connected_with_top: cell.connected_with_top && cy == y,
                    ..Element::new(cell_kind, operand)
                };
            }
        }
    }

    /// Clear a block's footprint and release its slot.
    fn erase_block(&mut self, rung: usize, operand: Operand) {
        let (owner, kind) = match operand {
            Operand::Counter(slot) => {
                let owner = self.registry.counters.owner(slot);
                self.registry.counters.release(slot);
                (owner, ElementKind::Counter)
            }
            Operand::Timer(slot) => {
                let owner = self.registry.timers.owner(slot);
                self.registry.timers.release(slot);
                (owner, ElementKind::Timer)
            }
            Operand::Arith(slot) => {
                let owner = self.registry.exprs.owner(slot);
                let kind = self.program.rungs[rung]
                    .grid
                    .iter()
                    .find(|(_, _, e)| e.kind.is_block() && e.operand == operand)
                    .map_or(ElementKind::Compare, |(_, _, e)| e.kind);
                self.registry.exprs.release(slot);
                (owner, kind)
            }
            _ => return,
        };
        let Some(owner) = owner.filter(|o| o.rung == rung) else {
            return;
        };
        let (width, height) = kind.footprint();
        let grid = &mut self.program.rungs[rung].grid;
        for cx in owner.x + 1 - width..=owner.x {
            for cy in owner.y..(owner.y + height).min(RUNG_HEIGHT) {
                let cell = grid.cell_mut(cx, cy);
                if cell.operand == operand {
                    *cell = Element {
                        connected_with_top: cell.connected_with_top,
                        ..Element::default()
                    };
                }
            }
        }
    }

    /// Release every block owned by `rung` and mark it unused.
    fn clear_rung(&mut self, rung: usize) {
        let blocks: Vec<Operand> = self.program.rungs[rung]
            .grid
            .iter()
            .filter(|(_, _, e)| e.kind.is_block())
            .map(|(_, _, e)| e.operand)
            .collect();
        for operand in blocks {
            self.erase_block(rung, operand);
        }
        self.program.rungs[rung] = Rung::default();
    }
}

fn out_of_grid(x: usize, y: usize) -> LadderError {
    placement(x, y, format!("outside the {RUNG_WIDTH}x{RUNG_HEIGHT} grid"))
}

fn check_counter_preset(preset: i32) -> LadderResult<()> {
    if (0..=COUNTER_MAX).contains(&preset) {
        Ok(())
    } else {
        Err(LadderError::Config(format!("counter preset {preset} outside 0..={COUNTER_MAX}")))
    }
}

fn check_timer_preset(preset: i32) -> LadderResult<()> {
    if preset >= 0 {
        Ok(())
    } else {
        Err(LadderError::Config(format!("timer preset {preset} is negative")))
    }
}
