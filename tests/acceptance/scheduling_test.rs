//! Section scheduling: jumps, subroutine calls and fault isolation.

use super::common::{config, count_runs, engine_with_main, powered_output, scan, var, wire, word, CYCLE};
use ladder_common::{EngineState, LadderError, VarKind, VariableStore};
use ladder_runtime::{ElementKind, Engine, FaultSeverity, Language, Operand, ScanFault, CALL_STACK_DEPTH};

fn call(engine: &mut Engine, rung: usize, subroutine: u32) {
    powered_output(engine, rung, 0, ElementKind::CoilCall, Operand::Subroutine(subroutine));
}

fn jump(engine: &mut Engine, rung: usize, target: usize) {
    powered_output(engine, rung, 0, ElementKind::CoilJump, Operand::Rung(target));
}

#[test]
fn test_call_resumes_after_calling_rung() {
    let (mut engine, main, a0) = engine_with_main();
    let a1 = engine.insert_rung_after(main, a0).unwrap();
    let a2 = engine.insert_rung_after(main, a1).unwrap();
    count_runs(&mut engine, a0, 0);
    count_runs(&mut engine, a1, 1);
    call(&mut engine, a1, 1);
    count_runs(&mut engine, a2, 2);
    // Runs after the subroutine: sees its counts from this cycle
    wire(&mut engine, a2, 1, 0, 7);
    engine.place_operate(a2, 9, 1, "%W20 := %W10 + %W11").unwrap();

    let sr = engine.add_section("sr1", Language::Ladder, Some(1)).unwrap();
    let b0 = engine.section_rungs(sr)[0];
    let b1 = engine.insert_rung_after(sr, b0).unwrap();
    count_runs(&mut engine, b0, 10);
    count_runs(&mut engine, b1, 11);
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.faults, 0);
    assert_eq!(report.sections_scanned, 1);
    for (w, expected) in [(0, 1), (1, 1), (2, 1), (10, 1), (11, 1), (20, 2)] {
        assert_eq!(word(&engine, w), expected, "%W{w}");
    }

    scan(&mut engine);
    for w in [0, 1, 2, 10, 11] {
        assert_eq!(word(&engine, w), 2, "%W{w}");
    }
}

#[test]
fn test_call_on_last_rung_finishes_section() {
    let (mut engine, main, a0) = engine_with_main();
    call(&mut engine, a0, 7);
    count_runs(&mut engine, a0, 0);
    let sr = engine.add_section("sr7", Language::Ladder, Some(7)).unwrap();
    let rung = engine.section_rungs(sr)[0];
    count_runs(&mut engine, rung, 1);
    let other = engine.add_section("second main", Language::Ladder, None).unwrap();
    let rung = engine.section_rungs(other)[0];
    count_runs(&mut engine, rung, 2);
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.faults, 0);
    assert_eq!(report.sections_scanned, 2);
    assert_eq!([word(&engine, 0), word(&engine, 1), word(&engine, 2)], [1, 1, 1]);
    assert_eq!(engine.section(main).unwrap().last_rung, a0);
}

#[test]
fn test_nested_calls_unwind_in_order() {
    // main → SR1 → SR2; SR1's last rung calls SR2, so SR2 returns straight to main
    let (mut engine, main, a0) = engine_with_main();
    call(&mut engine, a0, 1);
    let a1 = engine.insert_rung_after(main, a0).unwrap();
    engine.place_operate(a1, 9, 5, "%W0 := %W1 * 10 + %W2").unwrap();
    wire(&mut engine, a1, 5, 0, 7);

    let sr1 = engine.add_section("sr1", Language::Ladder, Some(1)).unwrap();
    let s1 = engine.section_rungs(sr1)[0];
    count_runs(&mut engine, s1, 1);
    call(&mut engine, s1, 2);
    let sr2 = engine.add_section("sr2", Language::Ladder, Some(2)).unwrap();
    let rung = engine.section_rungs(sr2)[0];
    count_runs(&mut engine, rung, 2);
    engine.start().unwrap();

    assert_eq!(scan(&mut engine).faults, 0);
    assert_eq!(word(&engine, 0), 11);
}

#[test]
fn test_undefined_subroutine_is_structural() {
    let (mut engine, main, a0) = engine_with_main();
    call(&mut engine, a0, 9);
    let a1 = engine.insert_rung_after(main, a0).unwrap();
    count_runs(&mut engine, a1, 0);
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.faults, 1);
    assert_eq!(report.state, EngineState::Run);
    assert_eq!(word(&engine, 0), 0);
    let fault = &engine.faults().last().unwrap().fault;
    assert_eq!(
        *fault,
        ScanFault::UndefinedSubroutine { section: main, rung: a0, subroutine: 9 }
    );
    assert_eq!(fault.severity(), FaultSeverity::Structural);
}

#[test]
fn test_jump_skips_rungs() {
    let (mut engine, main, a0) = engine_with_main();
    let a1 = engine.insert_rung_after(main, a0).unwrap();
    let a2 = engine.insert_rung_after(main, a1).unwrap();
    // %I0 enables the jump
    engine
        .place_element(a0, 0, 0, ElementKind::Contact, var(VarKind::PhysInput, 0))
        .unwrap();
    wire(&mut engine, a0, 0, 1, 9);
    engine
        .place_element(a0, 9, 0, ElementKind::CoilJump, Operand::Rung(a2))
        .unwrap();
    count_runs(&mut engine, a1, 1);
    count_runs(&mut engine, a2, 2);
    engine.start().unwrap();

    scan(&mut engine);
    assert_eq!([word(&engine, 1), word(&engine, 2)], [1, 1]);

    engine.store_mut().write(VarKind::PhysInput, 0, 1);
    scan(&mut engine);
    assert_eq!([word(&engine, 1), word(&engine, 2)], [1, 2]);
}

#[test]
fn test_jump_to_unused_rung_aborts_only_its_section() {
    let (mut engine, first, a0) = engine_with_main();
    let a1 = engine.insert_rung_after(first, a0).unwrap();
    jump(&mut engine, a0, 50);
    count_runs(&mut engine, a1, 0);
    let second = engine.add_section("second", Language::Ladder, None).unwrap();
    let rung = engine.section_rungs(second)[0];
    count_runs(&mut engine, rung, 1);
    engine.start().unwrap();

    for cycle in 1..=3 {
        let report = scan(&mut engine);
        assert_eq!(report.faults, 1);
        assert_eq!(report.sections_scanned, 1);
        assert_eq!(report.state, EngineState::Run);
        assert_eq!(word(&engine, 0), 0);
        assert_eq!(word(&engine, 1), cycle);
    }
    let event = engine.faults().last().unwrap();
    assert_eq!(event.cycle, 3);
    assert_eq!(
        event.fault,
        ScanFault::UndefinedJumpTarget { section: first, rung: a0, target: 50 }
    );
    assert_eq!(engine.faults().total(), 3);
}

#[test]
fn test_runaway_loop_stops_engine() {
    let (mut engine, _, a0) = engine_with_main();
    jump(&mut engine, a0, a0);
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.state, EngineState::Fault);
    assert!(matches!(
        engine.faults().last().unwrap().fault,
        ScanFault::RunawayLoop { limit: 100, .. }
    ));
    assert!(matches!(
        engine.refresh_all_sections(CYCLE),
        Err(LadderError::NotRunning(_))
    ));

    // FAULT must be acknowledged before running again
    assert!(engine.start().is_err());
    engine.acknowledge_fault().unwrap();
    assert_eq!(engine.state(), EngineState::Stop);
    engine.erase_element(a0, 9, 0).unwrap();
    engine.start().unwrap();
    assert_eq!(scan(&mut engine).faults, 0);
}

#[test]
fn test_jump_loop_within_bound_is_allowed() {
    // Loops back while %W0 < 5, using the jump budget without exhausting it
    let (mut engine, main, a0) = engine_with_main();
    count_runs(&mut engine, a0, 0);
    let a1 = engine.insert_rung_after(main, a0).unwrap();
    engine.place_compare(a1, 2, 0, "%W0 < 5").unwrap();
    wire(&mut engine, a1, 0, 3, 9);
    engine
        .place_element(a1, 9, 0, ElementKind::CoilJump, Operand::Rung(a0))
        .unwrap();
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.faults, 0);
    assert_eq!(word(&engine, 0), 5);
}

#[test]
fn test_recursive_call_overflows_stack() {
    let (mut engine, _, a0) = engine_with_main();
    call(&mut engine, a0, 1);
    let sr = engine.add_section("sr1", Language::Ladder, Some(1)).unwrap();
    let s0 = engine.section_rungs(sr)[0];
    count_runs(&mut engine, s0, 0);
    call(&mut engine, s0, 1);
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.state, EngineState::Fault);
    let fault = &engine.faults().last().unwrap().fault;
    assert!(matches!(fault, ScanFault::CallStackOverflow { subroutine: 1, .. }));
    assert_eq!(fault.severity(), FaultSeverity::ResourceExhaustion);
    // Main pushes one frame, the subroutine fills the rest
    assert_eq!(word(&engine, 0), i32::try_from(CALL_STACK_DEPTH).unwrap());
}

#[test]
fn test_subroutines_are_not_scanned_as_main() {
    let mut engine = Engine::new(config()).unwrap();
    let sr = engine.add_section("sr", Language::Ladder, Some(3)).unwrap();
    let rung = engine.section_rungs(sr)[0];
    count_runs(&mut engine, rung, 0);
    let seq = engine.add_section("grafcet", Language::Sequential, None).unwrap();
    let rung = engine.section_rungs(seq)[0];
    count_runs(&mut engine, rung, 1);
    engine.start().unwrap();

    let report = scan(&mut engine);
    assert_eq!(report.sections_scanned, 0);
    assert_eq!([word(&engine, 0), word(&engine, 1)], [0, 0]);
}
