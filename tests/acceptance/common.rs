//! Program-building helpers shared by the acceptance scenarios.

#![allow(dead_code)] // Not every scenario uses every helper

use ladder_common::{EngineConfig, VarAddr, VarKind};
use ladder_runtime::{CycleReport, ElementKind, Engine, Language, Operand, OUTPUT_COLUMN};
use std::time::Duration;

/// Scan period used by the scenarios.
pub const CYCLE: Duration = Duration::from_millis(10);

/// Default engine configuration with a tight jump bound.
pub fn config() -> EngineConfig {
    EngineConfig {
        max_jumps_per_cycle: 100,
        ..EngineConfig::default()
    }
}

pub fn var(kind: VarKind, index: usize) -> Operand {
    Operand::Var(VarAddr::new(kind, index))
}

/// Fresh engine holding one main section; returns it with its first rung.
pub fn engine_with_main() -> (Engine, usize, usize) {
    let mut engine = Engine::new(config()).unwrap();
    let section = engine.add_section("main", Language::Ladder, None).unwrap();
    let rung = engine.section_rungs(section)[0];
    (engine, section, rung)
}

/// Horizontal links on row `y`, columns `from..to`.
pub fn wire(engine: &mut Engine, rung: usize, y: usize, from: usize, to: usize) {
    for x in from..to {
        engine
            .place_element(rung, x, y, ElementKind::HorizontalLink, Operand::None)
            .unwrap();
    }
}

/// `contact(input)` at column 0 wired to `coil(output)` in the last column.
pub fn contact_to_coil(
    engine: &mut Engine,
    rung: usize,
    y: usize,
    contact: ElementKind,
    input: Operand,
    coil: ElementKind,
    output: Operand,
) {
    engine.place_element(rung, 0, y, contact, input).unwrap();
    wire(engine, rung, y, 1, OUTPUT_COLUMN);
    engine.place_element(rung, OUTPUT_COLUMN, y, coil, output).unwrap();
}

/// Unconditional output element on row `y`.
pub fn powered_output(engine: &mut Engine, rung: usize, y: usize, kind: ElementKind, operand: Operand) {
    wire(engine, rung, y, 0, OUTPUT_COLUMN);
    engine.place_element(rung, OUTPUT_COLUMN, y, kind, operand).unwrap();
}

/// Operate block on row 5 adding one to `%W<word>` every time the rung runs.
pub fn count_runs(engine: &mut Engine, rung: usize, word: usize) {
    wire(engine, rung, 5, 0, OUTPUT_COLUMN - 2);
    engine
        .place_operate(rung, OUTPUT_COLUMN, 5, &format!("%W{word} := %W{word} + 1"))
        .unwrap();
}

pub fn scan(engine: &mut Engine) -> CycleReport {
    engine.refresh_all_sections(CYCLE).unwrap()
}

pub fn word(engine: &Engine, index: usize) -> i32 {
    use ladder_common::VariableStore;
    engine.store().read(VarKind::MemWord, index)
}
