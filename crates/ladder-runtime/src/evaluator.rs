//! Rung evaluator: power flow through one grid.
//!
//! Cells are visited column by column, left to right, and top to bottom
//! inside a column. Each cell first computes its power-on-left, then applies
//! its instruction. Evaluation reads and writes the Variable Store and the
//! function-block registry; it never fails; expression errors are logged
//! and the block conducts nothing for that scan.

use crate::element::{ElementKind, Operand};
use crate::registry::{publish_counter, publish_timer, Registry};
use crate::rung::{Grid, Rung, RUNG_HEIGHT, RUNG_WIDTH};
use ladder_arith::ArithExpr;
use ladder_common::vars::VariableStore;
use ladder_stdlib::CounterInputs;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Control transfer requested by a rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpOrCall {
    /// Continue the section at this rung.
    Jump(usize),
    /// Run subroutine SRn, then come back.
    Call(u32),
}

/// Power arriving at the left side of `(x, y)`.
///
/// Column 0 sits on the left rail. Elsewhere the left neighbour's output
/// counts, plus the outputs left of every row reachable through an unbroken
/// run of vertical links on column `x`.
#[must_use]
pub fn power_on_left(grid: &Grid, x: usize, y: usize) -> bool {
    if x == 0 {
        return true;
    }
    if x >= RUNG_WIDTH || y >= RUNG_HEIGHT {
        return false;
    }
    let left = x - 1;
    if grid.cell(left, y).output {
        return true;
    }

    let mut row = y;
    while row > 0 && grid.cell(x, row).connected_with_top {
        row -= 1;
        if grid.cell(left, row).output {
            return true;
        }
    }

    let mut row = y;
    while row + 1 < RUNG_HEIGHT && grid.cell(x, row + 1).connected_with_top {
        row += 1;
        if grid.cell(left, row).output {
            return true;
        }
    }
    false
}

/// Evaluate one rung.
///
/// Returns a jump as soon as a powered jump coil is met; the rest of the
/// grid is not evaluated. A powered call coil is remembered (the first one
/// wins) and returned once the whole grid has been evaluated.
pub fn evaluate<S: VariableStore + ?Sized>(
    rung: &mut Rung,
    store: &mut S,
    registry: &mut Registry,
) -> Option<JumpOrCall> {
    let grid = &mut rung.grid;
    let mut call = None;

    for x in 0..RUNG_WIDTH {
        for y in 0..RUNG_HEIGHT {
            let element = *grid.cell(x, y);
            match element.kind {
                ElementKind::Free => {
                    let cell = grid.cell_mut(x, y);
                    cell.input = false;
                    cell.state = false;
                    cell.output = false;
                }
                // Written by the block's live cell.
                ElementKind::Unusable => {}
                kind if kind.is_contact() => {
                    let power = power_on_left(grid, x, y);
                    let value = element
                        .var_addr(store)
                        .is_some_and(|addr| store.read_addr(addr) != 0);
                    let state = match kind {
                        ElementKind::ContactInverted => !value,
                        ElementKind::ContactRising => value && !element.prev_sample,
                        ElementKind::ContactFalling => !value && element.prev_sample,
                        _ => value,
                    };
                    set_dynamic(grid, x, y, power, state, state && power);
                }
                ElementKind::HorizontalLink => {
                    let power = power_on_left(grid, x, y);
                    set_dynamic(grid, x, y, power, power, power);
                }
                kind if kind.is_coil() => {
                    let power = power_on_left(grid, x, y);
                    if let Some(addr) = element.var_addr(store) {
                        match kind {
                            ElementKind::Coil => store.write_addr(addr, i32::from(power)),
                            ElementKind::CoilInverted => store.write_addr(addr, i32::from(!power)),
                            ElementKind::CoilSet if power => store.write_addr(addr, 1),
                            ElementKind::CoilReset if power => store.write_addr(addr, 0),
                            _ => {}
                        }
                    }
                    set_dynamic(grid, x, y, power, power, power);
                }
                ElementKind::CoilJump => {
                    let power = power_on_left(grid, x, y);
                    set_dynamic(grid, x, y, power, power, power);
                    if let (true, Operand::Rung(target)) = (power, element.operand) {
                        return Some(JumpOrCall::Jump(target));
                    }
                }
                ElementKind::CoilCall => {
                    let power = power_on_left(grid, x, y);
                    set_dynamic(grid, x, y, power, power, power);
                    if let (true, None, Operand::Subroutine(id)) = (power, call, element.operand) {
                        call = Some(id);
                    }
                }
                ElementKind::Counter => eval_counter(grid, x, y, element.operand, store, registry),
                ElementKind::Timer => eval_timer(grid, x, y, element.operand, store, registry),
                ElementKind::Compare => eval_compare(grid, x, y, element.operand, store, registry),
                ElementKind::Operate => eval_operate(grid, x, y, element.operand, store, registry),
                _ => {}
            }
        }
    }
    call.map(JumpOrCall::Call)
}

/// Latch the current value of every edge contact's variable.
///
/// Run once at the end of each scan so the next scan compares against it.
pub fn sample_edges<S: VariableStore + ?Sized>(rung: &mut Rung, store: &S) {
    for (_, _, element) in rung.grid.iter_mut() {
        if element.kind.is_edge_contact() {
            element.prev_sample = element
                .var_addr(store)
                .is_some_and(|addr| store.read_addr(addr) != 0);
        }
    }
}

fn set_dynamic(grid: &mut Grid, x: usize, y: usize, input: bool, state: bool, output: bool) {
    let cell = grid.cell_mut(x, y);
    cell.input = input;
    cell.state = state;
    cell.output = output;
}

/// Power entering a block row, recorded on the block's left column.
fn block_input(grid: &mut Grid, left: usize, y: usize) -> bool {
    if y >= RUNG_HEIGHT {
        return false;
    }
    let power = power_on_left(grid, left, y);
    grid.cell_mut(left, y).input = power;
    power
}

fn set_block_output(grid: &mut Grid, x: usize, y: usize, output: bool) {
    if y < RUNG_HEIGHT {
        let cell = grid.cell_mut(x, y);
        cell.state = output;
        cell.output = output;
    }
}

fn eval_counter<S: VariableStore + ?Sized>(
    grid: &mut Grid,
    x: usize,
    y: usize,
    operand: Operand,
    store: &mut S,
    registry: &mut Registry,
) {
    let Operand::Counter(slot) = operand else { return };
    let left = x.saturating_sub(1);
    let inputs = CounterInputs {
        reset: block_input(grid, left, y),
        preset: block_input(grid, left, y + 1),
        count_up: block_input(grid, left, y + 2),
        count_down: block_input(grid, left, y + 3),
    };
    let Some(counter) = registry.counters.get_mut(slot) else { return };
    let out = counter.call(inputs);
    publish_counter(store, slot, counter);

    grid.cell_mut(x, y).input = inputs.reset;
    set_block_output(grid, x, y, out.empty);
    set_block_output(grid, x, y + 1, out.done);
    set_block_output(grid, x, y + 2, out.full);
    set_block_output(grid, x, y + 3, false);
}

fn eval_timer<S: VariableStore + ?Sized>(
    grid: &mut Grid,
    x: usize,
    y: usize,
    operand: Operand,
    store: &mut S,
    registry: &mut Registry,
) {
    let Operand::Timer(slot) = operand else { return };
    let input = block_input(grid, x.saturating_sub(1), y);
    let Some(timer) = registry.timers.get_mut(slot) else { return };
    let out = timer.call(input);
    publish_timer(store, slot, timer);

    grid.cell_mut(x, y).input = input;
    set_block_output(grid, x, y, out.done);
    set_block_output(grid, x, y + 1, false);
}

fn eval_compare<S: VariableStore + ?Sized>(
    grid: &mut Grid,
    x: usize,
    y: usize,
    operand: Operand,
    store: &mut S,
    registry: &Registry,
) {
    let Operand::Arith(slot) = operand else { return };
    let power = block_input(grid, x.saturating_sub(2), y);
    let result = match registry.exprs.get(slot) {
        Some(Some(ArithExpr::Compare(expr))) if power => match expr.evaluate(store) {
            Ok(result) => result,
            Err(e) => {
                warn!(slot, expr = expr.text(), error = %e, "compare expression failed");
                false
            }
        },
        _ => false,
    };
    set_dynamic(grid, x, y, power, result, result && power);
}

fn eval_operate<S: VariableStore + ?Sized>(
    grid: &mut Grid,
    x: usize,
    y: usize,
    operand: Operand,
    store: &mut S,
    registry: &Registry,
) {
    let Operand::Arith(slot) = operand else { return };
    let power = block_input(grid, x.saturating_sub(2), y);
    if power {
        if let Some(Some(ArithExpr::Operate(expr))) = registry.exprs.get(slot) {
            if let Err(e) = expr.execute(store) {
                warn!(slot, expr = expr.text(), error = %e, "operate expression failed");
            }
        }
    }
    set_dynamic(grid, x, y, power, power, power);
}
