//! Project save/load and configuration files.

use super::common::{config, count_runs, engine_with_main, scan, var, wire};
use ladder_common::{EngineConfig, VarKind, VariableStore};
use ladder_runtime::{ElementKind, Engine, Language, Operand, Project, ProjectError, OUTPUT_COLUMN};
use ladder_stdlib::{TimeBase, TimerMode};
use std::time::Duration;

/// Several rungs, a subroutine, one counter, one timer, compare and operate.
fn populated_engine() -> Engine {
    let (mut engine, main, r0) = engine_with_main();

    // r0: %I0 counts up, %I1 resets; counter done drives %Q0
    engine
        .place_element(r0, 0, 0, ElementKind::Contact, var(VarKind::PhysInput, 1))
        .unwrap();
    engine
        .place_element(r0, 0, 2, ElementKind::ContactRising, var(VarKind::PhysInput, 0))
        .unwrap();
    engine.place_counter(r0, 2, 0, 3).unwrap();
    wire(&mut engine, r0, 1, 3, OUTPUT_COLUMN);
    engine
        .place_element(r0, OUTPUT_COLUMN, 1, ElementKind::Coil, var(VarKind::PhysOutput, 0))
        .unwrap();
    engine.set_label_comment(r0, "count", "parts counter").unwrap();

    // r1: %I2 through an on-delay timer to %Q1
    let r1 = engine.insert_rung_after(main, r0).unwrap();
    engine
        .place_element(r1, 0, 0, ElementKind::Contact, var(VarKind::PhysInput, 2))
        .unwrap();
    engine
        .place_timer(r1, 2, 0, 3, TimeBase::HundredMillis, TimerMode::OnDelay)
        .unwrap();
    wire(&mut engine, r1, 0, 3, OUTPUT_COLUMN);
    engine
        .place_element(r1, OUTPUT_COLUMN, 0, ElementKind::Coil, var(VarKind::PhysOutput, 1))
        .unwrap();

    // r2: compare on the counter and the timer drives %Q2, then calls SR1
    let r2 = engine.insert_rung_after(main, r1).unwrap();
    engine
        .place_compare(r2, 2, 0, "(%C0.V >= 2 OR %TM0.V > 1) AND %W5[%W4] <> $FF")
        .unwrap();
    wire(&mut engine, r2, 0, 3, OUTPUT_COLUMN);
    engine
        .place_element(r2, OUTPUT_COLUMN, 0, ElementKind::CoilInverted, var(VarKind::PhysOutput, 2))
        .unwrap();
    wire(&mut engine, r2, 1, 0, OUTPUT_COLUMN);
    engine
        .place_element(r2, OUTPUT_COLUMN, 1, ElementKind::CoilCall, Operand::Subroutine(1))
        .unwrap();

    let sr = engine.add_section("scale", Language::Ladder, Some(1)).unwrap();
    let s0 = engine.section_rungs(sr)[0];
    wire(&mut engine, s0, 0, 0, OUTPUT_COLUMN - 2);
    engine
        .place_operate(s0, OUTPUT_COLUMN, 0, "%W0 := %C0.V * 100 + %TM0.V")
        .unwrap();
    count_runs(&mut engine, s0, 1);
    engine
}

#[test]
fn test_round_trip_behaves_identically() {
    let mut original = populated_engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.json");
    original.save_project(&path).unwrap();
    let mut loaded = Engine::load_project(&path, config()).unwrap();

    original.start().unwrap();
    loaded.start().unwrap();
    let inputs = [[0, 0, 1], [1, 0, 1], [0, 0, 1], [1, 0, 1], [0, 0, 1], [1, 1, 1], [0, 0, 1]];
    for (cycle, [i0, i1, i2]) in inputs.into_iter().enumerate() {
        for engine in [&mut original, &mut loaded] {
            engine.store_mut().write(VarKind::PhysInput, 0, i0);
            engine.store_mut().write(VarKind::PhysInput, 1, i1);
            engine.store_mut().write(VarKind::PhysInput, 2, i2);
            engine.refresh_all_sections(Duration::from_millis(100)).unwrap();
        }
        assert_eq!(original.store(), loaded.store(), "cycle {cycle}");
        assert_eq!(original.counter(0), loaded.counter(0));
        assert_eq!(original.timer(0), loaded.timer(0));
    }
    // The program did something observable
    assert_eq!(original.store().read(VarKind::MemWord, 1), 7);
    assert!(original.store().read_bool(VarKind::PhysOutput, 1));
}

#[test]
fn test_load_starts_from_neutral_state() {
    let mut engine = populated_engine();
    engine.start().unwrap();
    for i0 in [1, 0, 1] {
        engine.store_mut().write(VarKind::PhysInput, 0, i0);
        scan(&mut engine);
    }
    assert_eq!(engine.counter(0).unwrap().value(), 2);

    let project = engine.to_project();
    let loaded = Engine::from_project(config(), &project).unwrap();
    assert_eq!(loaded.counter(0).unwrap().value(), 0);
    assert_eq!(loaded.counter(0).unwrap().preset(), 3);
    assert_eq!(loaded.timer(0).unwrap().mode(), TimerMode::OnDelay);
    assert_eq!(loaded.rung(0).unwrap().label, "count");
    assert!(loaded
        .rung(0)
        .unwrap()
        .grid
        .iter()
        .all(|(_, _, e)| !e.input && !e.output && !e.state));
}

#[test]
fn test_project_json_is_readable() {
    let project = populated_engine().to_project();
    let json = project.to_json().unwrap();
    assert!(json.contains(r#""compare": "(%C0.V >= 2 OR %TM0.V > 1) AND %W5[%W4] <> $FF""#));
    assert!(json.contains(r#""mode": "on_delay""#));
    assert_eq!(Project::from_json(&json).unwrap(), project);
}

#[test]
fn test_load_rejects_project_bigger_than_tables() {
    let project = populated_engine().to_project();
    let mut small = config();
    small.sizes.counters = 0;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.json");
    project.to_file(&path).unwrap();

    let result = Engine::load_project(&path, small);
    assert!(matches!(result, Err(ProjectError::Invalid(_))));
}

#[test]
fn test_load_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.json");
    std::fs::write(&path, r#"{"version": 1, "rungs": [{"index": "zero"}]}"#).unwrap();
    assert!(matches!(
        Engine::load_project(&path, config()),
        Err(ProjectError::Json(_))
    ));
}

#[test]
fn test_engine_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(
        &path,
        r#"
            cycle_time = "20ms"
            max_jumps_per_cycle = 10

            [sizes]
            rungs = 8
            sections = 2
        "#,
    )
    .unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    let mut engine = Engine::new(config).unwrap();
    assert_eq!(engine.config().cycle_time, Duration::from_millis(20));
    engine.add_section("a", Language::Ladder, None).unwrap();
    engine.add_section("b", Language::Ladder, None).unwrap();
    assert!(engine.add_section("c", Language::Ladder, None).is_err());
}
