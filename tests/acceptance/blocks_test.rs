//! Counters, timers and arithmetic blocks inside rungs.

use super::common::{engine_with_main, scan, var, wire, word};
use ladder_common::{VarKind, VariableStore};
use ladder_runtime::{ElementKind, Engine, OUTPUT_COLUMN};
use ladder_stdlib::{TimeBase, TimerMode, COUNTER_MAX};
use std::time::Duration;

/// Counter live at (2, 0): %B0 resets, %B1 presets, %B2 counts up, %B3 down.
fn counter_rung(preset: i32) -> (Engine, usize) {
    let (mut engine, _, rung) = engine_with_main();
    for (y, bit) in [(0, 0), (1, 1), (2, 2), (3, 3)] {
        engine
            .place_element(rung, 0, y, ElementKind::Contact, var(VarKind::MemBit, bit))
            .unwrap();
    }
    let slot = engine.place_counter(rung, 2, 0, preset).unwrap();
    (engine, slot)
}

fn drive(engine: &mut Engine, bits: [i32; 4]) {
    for (index, value) in bits.into_iter().enumerate() {
        engine.store_mut().write(VarKind::MemBit, index, value);
    }
    scan(engine);
}

fn counter_flags(engine: &Engine, slot: usize) -> (i32, bool, bool, bool) {
    let store = engine.store();
    (
        store.read(VarKind::CounterValue, slot),
        store.read_bool(VarKind::CounterEmpty, slot),
        store.read_bool(VarKind::CounterDone, slot),
        store.read_bool(VarKind::CounterFull, slot),
    )
}

#[test]
fn test_counter_counts_edges_and_presets() {
    let (mut engine, slot) = counter_rung(3);
    engine.start().unwrap();

    for _ in 0..3 {
        drive(&mut engine, [0, 0, 1, 0]);
        drive(&mut engine, [0, 0, 0, 0]);
    }
    assert_eq!(counter_flags(&engine, slot), (3, false, true, false));

    drive(&mut engine, [0, 0, 0, 1]);
    assert_eq!(counter_flags(&engine, slot).0, 2);

    drive(&mut engine, [1, 0, 0, 0]);
    assert_eq!(counter_flags(&engine, slot).0, 0);
    drive(&mut engine, [0, 1, 0, 0]);
    assert_eq!(counter_flags(&engine, slot), (3, false, true, false));
}

#[test]
fn test_counter_wraps_up_with_full_for_one_cycle() {
    let (mut engine, slot) = counter_rung(COUNTER_MAX);
    engine.start().unwrap();

    drive(&mut engine, [0, 1, 0, 0]);
    assert_eq!(counter_flags(&engine, slot), (COUNTER_MAX, false, true, false));

    drive(&mut engine, [0, 0, 1, 0]);
    assert_eq!(counter_flags(&engine, slot), (0, false, false, true));
    drive(&mut engine, [0, 0, 1, 0]);
    assert_eq!(counter_flags(&engine, slot), (0, false, false, false));
    drive(&mut engine, [0, 0, 0, 0]);
    assert_eq!(counter_flags(&engine, slot), (0, false, false, false));
}

#[test]
fn test_counter_wraps_down_with_empty_for_one_cycle() {
    let (mut engine, slot) = counter_rung(5);
    engine.start().unwrap();

    drive(&mut engine, [0, 0, 0, 1]);
    assert_eq!(counter_flags(&engine, slot), (COUNTER_MAX, true, false, false));
    drive(&mut engine, [0, 0, 0, 0]);
    assert_eq!(counter_flags(&engine, slot), (COUNTER_MAX, false, false, false));
}

/// %I0 → timer live at (2, 0) → %Q0.
fn timer_rung(preset: i32, base: TimeBase, mode: TimerMode) -> (Engine, usize) {
    let (mut engine, _, rung) = engine_with_main();
    engine
        .place_element(rung, 0, 0, ElementKind::Contact, var(VarKind::PhysInput, 0))
        .unwrap();
    let slot = engine.place_timer(rung, 2, 0, preset, base, mode).unwrap();
    wire(&mut engine, rung, 0, 3, OUTPUT_COLUMN);
    engine
        .place_element(rung, OUTPUT_COLUMN, 0, ElementKind::Coil, var(VarKind::PhysOutput, 0))
        .unwrap();
    engine.start().unwrap();
    (engine, slot)
}

fn step(engine: &mut Engine, input: i32, elapsed: Duration) -> bool {
    engine.store_mut().write(VarKind::PhysInput, 0, input);
    engine.refresh_all_sections(elapsed).unwrap();
    engine.store().read_bool(VarKind::PhysOutput, 0)
}

#[test]
fn test_on_delay_done_after_preset_elapsed() {
    let (mut engine, slot) = timer_rung(5, TimeBase::HundredMillis, TimerMode::OnDelay);
    let tick = Duration::from_millis(100);

    // Input first seen in cycle 1; 500 ms have elapsed by cycle 6
    let outputs: Vec<bool> = (0..7).map(|_| step(&mut engine, 1, tick)).collect();
    assert_eq!(outputs, [false, false, false, false, false, true, true]);
    assert!(engine.store().read_bool(VarKind::TimerDone, slot));
    assert_eq!(engine.store().read(VarKind::TimerValue, slot), 5);

    assert!(!step(&mut engine, 0, tick));
    assert_eq!(engine.store().read(VarKind::TimerValue, slot), 0);
}

#[test]
fn test_on_delay_reset_midway() {
    let (mut engine, slot) = timer_rung(5, TimeBase::HundredMillis, TimerMode::OnDelay);
    let tick = Duration::from_millis(100);

    for _ in 0..4 {
        assert!(!step(&mut engine, 1, tick));
    }
    assert_eq!(engine.store().read(VarKind::TimerValue, slot), 3);
    assert!(!step(&mut engine, 0, tick));
    assert_eq!(engine.store().read(VarKind::TimerValue, slot), 0);

    // Starts over from zero
    let outputs: Vec<bool> = (0..6).map(|_| step(&mut engine, 1, tick)).collect();
    assert_eq!(outputs, [false, false, false, false, false, true]);
}

#[test]
fn test_timer_accumulates_sub_base_time() {
    // 1 s base, 300 ms scans: done once 2 s of scan time have accumulated
    let (mut engine, _) = timer_rung(2, TimeBase::Seconds, TimerMode::OnDelay);
    let tick = Duration::from_millis(300);

    let outputs: Vec<bool> = (0..9).map(|_| step(&mut engine, 1, tick)).collect();
    let first_done = outputs.iter().position(|&q| q).unwrap();
    // Cycle 1 starts the timer; 7 more scans bring 2.1 s
    assert_eq!(first_done, 7);
}

#[test]
fn test_off_delay_holds_output_after_release() {
    let (mut engine, _) = timer_rung(2, TimeBase::HundredMillis, TimerMode::OffDelay);
    let tick = Duration::from_millis(100);

    assert!(step(&mut engine, 1, tick));
    let outputs: Vec<bool> = (0..4).map(|_| step(&mut engine, 0, tick)).collect();
    assert_eq!(outputs, [true, true, false, false]);
}

#[test]
fn test_pulse_is_not_retriggerable() {
    let (mut engine, _) = timer_rung(3, TimeBase::HundredMillis, TimerMode::Pulse);
    let tick = Duration::from_millis(100);

    let inputs = [1, 0, 1, 0, 0, 0, 1];
    let outputs: Vec<bool> = inputs.iter().map(|&i| step(&mut engine, i, tick)).collect();
    assert_eq!(outputs, [true, true, true, false, false, false, true]);
}

#[test]
fn test_compare_drives_coil_and_operate_scales() {
    let (mut engine, _, rung) = engine_with_main();
    engine.place_compare(rung, 2, 0, "%W0 > 10 AND %W0 < 20").unwrap();
    wire(&mut engine, rung, 0, 3, OUTPUT_COLUMN);
    engine
        .place_element(rung, OUTPUT_COLUMN, 0, ElementKind::Coil, var(VarKind::PhysOutput, 0))
        .unwrap();
    wire(&mut engine, rung, 1, 0, OUTPUT_COLUMN - 2);
    engine
        .place_operate(rung, OUTPUT_COLUMN, 1, "%W1 := MAXI(%W0 * 3 - 1, 0)")
        .unwrap();
    engine.start().unwrap();

    for (w0, q0, w1) in [(5, false, 14), (15, true, 44), (20, false, 59), (-4, false, 0)] {
        engine.store_mut().write(VarKind::MemWord, 0, w0);
        scan(&mut engine);
        assert_eq!(engine.store().read_bool(VarKind::PhysOutput, 0), q0, "%W0 = {w0}");
        assert_eq!(word(&engine, 1), w1);
    }
}

#[test]
fn test_operate_reads_counter_registers() {
    let (mut engine, slot) = counter_rung(4);
    let rung = engine.section_rungs(0)[0];
    wire(&mut engine, rung, 5, 0, OUTPUT_COLUMN - 2);
    engine
        .place_operate(rung, OUTPUT_COLUMN, 5, &format!("%W0 := %C{slot}.P - %C{slot}.V"))
        .unwrap();
    engine.start().unwrap();

    drive(&mut engine, [0, 0, 1, 0]);
    assert_eq!(word(&engine, 0), 3);
}

#[test]
fn test_division_by_zero_keeps_scanning() {
    let (mut engine, _, rung) = engine_with_main();
    engine.place_compare(rung, 2, 0, "%W0 / %W1 > 1").unwrap();
    wire(&mut engine, rung, 0, 3, OUTPUT_COLUMN);
    engine
        .place_element(rung, OUTPUT_COLUMN, 0, ElementKind::Coil, var(VarKind::PhysOutput, 0))
        .unwrap();
    engine.start().unwrap();
    engine.store_mut().write(VarKind::MemWord, 0, 10);

    let report = scan(&mut engine);
    assert_eq!(report.faults, 0);
    assert!(!engine.store().read_bool(VarKind::PhysOutput, 0));

    engine.store_mut().write(VarKind::MemWord, 1, 2);
    scan(&mut engine);
    assert!(engine.store().read_bool(VarKind::PhysOutput, 0));
}

#[test]
fn test_block_slots_exhaust_and_recycle() {
    let (mut engine, section, rung) = engine_with_main();
    let capacity = engine.config().sizes.counters;
    let mut rungs = vec![rung];
    for _ in 1..capacity {
        rungs.push(engine.insert_rung_after(section, *rungs.last().unwrap()).unwrap());
    }
    for &r in &rungs {
        engine.place_counter(r, 1, 0, 1).unwrap();
    }
    let extra = engine.insert_rung_after(section, rung).unwrap();
    assert!(engine.place_counter(extra, 1, 0, 1).is_err());

    engine.erase_element(rungs[3], 0, 2).unwrap();
    assert_eq!(engine.place_counter(extra, 1, 0, 1).unwrap(), 3);
}
