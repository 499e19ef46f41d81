//! Threaded scan loop with edits between cycles.

use super::common::{config, contact_to_coil, var, wire};
use ladder_common::{EngineConfig, EngineState, VarKind, VariableStore};
use ladder_runtime::{ElementKind, Engine, Language, ScanLoop, SharedEngine, OUTPUT_COLUMN};
use ladder_stdlib::{TimeBase, TimerMode};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> EngineConfig {
    EngineConfig {
        cycle_time: Duration::from_millis(1),
        ..config()
    }
}

fn wait_for(shared: &SharedEngine, what: &str, mut check: impl FnMut(&Engine) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !shared.edit(|e| check(e)) {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_on_delay_measures_real_time() {
    let mut engine = Engine::new(fast_config()).unwrap();
    let main = engine.add_section("main", Language::Ladder, None).unwrap();
    let rung = engine.section_rungs(main)[0];
    engine
        .place_element(rung, 0, 0, ElementKind::Contact, var(VarKind::PhysInput, 0))
        .unwrap();
    engine
        .place_timer(rung, 2, 0, 50, TimeBase::Millis, TimerMode::OnDelay)
        .unwrap();
    wire(&mut engine, rung, 0, 3, OUTPUT_COLUMN);
    engine
        .place_element(rung, OUTPUT_COLUMN, 0, ElementKind::Coil, var(VarKind::PhysOutput, 0))
        .unwrap();
    engine.start().unwrap();

    let shared = SharedEngine::new(engine);
    let handle = ScanLoop::new(shared.clone()).spawn().unwrap();

    let pressed = Instant::now();
    shared.edit(|e| e.store_mut().write(VarKind::PhysInput, 0, 1));
    wait_for(&shared, "timer output", |e| e.store().read_bool(VarKind::PhysOutput, 0));
    assert!(pressed.elapsed() >= Duration::from_millis(50));

    let cycles = handle.stop_and_join().unwrap();
    assert!(cycles > 1);
    assert!(shared.edit(|e| e.metrics().total_cycles()) >= cycles);
}

#[test]
fn test_edits_apply_between_cycles() {
    let mut engine = Engine::new(fast_config()).unwrap();
    let main = engine.add_section("main", Language::Ladder, None).unwrap();
    engine.start().unwrap();
    let shared = SharedEngine::new(engine);
    let handle = ScanLoop::new(shared.clone()).spawn().unwrap();

    shared.edit(|e| {
        let rung = e.section_rungs(main)[0];
        e.store_mut().write(VarKind::PhysInput, 3, 1);
        contact_to_coil(
            e,
            rung,
            0,
            ElementKind::Contact,
            var(VarKind::PhysInput, 3),
            ElementKind::Coil,
            var(VarKind::PhysOutput, 3),
        );
    });
    wait_for(&shared, "new rung", |e| e.store().read_bool(VarKind::PhysOutput, 3));

    shared.edit(|e| e.store_mut().write(VarKind::PhysInput, 3, 0));
    wait_for(&shared, "input release", |e| !e.store().read_bool(VarKind::PhysOutput, 3));

    handle.stop_and_join().unwrap();
    assert_eq!(shared.state(), EngineState::Run);
}

#[test]
fn test_loop_ends_when_engine_stops() {
    let mut engine = Engine::new(fast_config()).unwrap();
    engine.add_section("main", Language::Ladder, None).unwrap();
    engine.start().unwrap();
    let shared = SharedEngine::new(engine);
    let handle = ScanLoop::new(shared.clone()).spawn().unwrap();

    wait_for(&shared, "first cycle", |e| e.cycle_count() > 0);
    shared.edit(Engine::stop).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "scan loop kept running");
        thread::sleep(Duration::from_millis(1));
    }
    let cycles = handle.stop_and_join().unwrap();
    assert_eq!(cycles, shared.edit(|e| e.cycle_count()));
}
