//! Power flow through contacts, wires and vertical links.

use super::common::{contact_to_coil, engine_with_main, scan, var, wire};
use ladder_common::{VarAddr, VarKind, VariableStore};
use ladder_runtime::{ElementKind, Operand, OUTPUT_COLUMN};

#[test]
fn test_empty_grid_is_idle_and_stable() {
    let (mut engine, _, rung) = engine_with_main();
    engine.start().unwrap();

    for _ in 0..3 {
        let report = scan(&mut engine);
        assert_eq!(report.faults, 0);
        assert_eq!(report.sections_scanned, 1);
        let grid = &engine.rung(rung).unwrap().grid;
        assert!(grid.iter().all(|(_, _, e)| !e.output && !e.input));
    }
}

#[test]
fn test_vertical_link_branches_one_row_only() {
    let (mut engine, _, rung) = engine_with_main();
    engine
        .place_element(rung, 0, 0, ElementKind::Contact, var(VarKind::PhysInput, 0))
        .unwrap();
    for y in 0..3 {
        wire(&mut engine, rung, y, 1, OUTPUT_COLUMN);
    }
    engine.set_vertical_link(rung, 1, 1, true).unwrap();
    engine.start().unwrap();

    engine.store_mut().write(VarKind::PhysInput, 0, 1);
    scan(&mut engine);
    let grid = &engine.rung(rung).unwrap().grid;
    assert!(grid.get(1, 0).unwrap().output);
    assert!(grid.get(1, 1).unwrap().output);
    assert!(grid.get(8, 1).unwrap().output);
    assert!(!grid.get(1, 2).unwrap().output);
    assert!(!grid.get(8, 2).unwrap().output);

    engine.store_mut().write(VarKind::PhysInput, 0, 0);
    scan(&mut engine);
    let grid = &engine.rung(rung).unwrap().grid;
    assert!(!grid.get(1, 1).unwrap().output);
}

#[test]
fn test_parallel_contacts_make_an_or() {
    // %I0 on row 0, %I1 on row 1, joined in column 1 and driving %Q0
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::Contact,
        var(VarKind::PhysInput, 0),
        ElementKind::Coil,
        var(VarKind::PhysOutput, 0),
    );
    engine
        .place_element(rung, 0, 1, ElementKind::Contact, var(VarKind::PhysInput, 1))
        .unwrap();
    engine.set_vertical_link(rung, 1, 1, true).unwrap();
    engine.start().unwrap();

    for (i0, i1, q0) in [(0, 0, false), (1, 0, true), (0, 1, true), (1, 1, true)] {
        engine.store_mut().write(VarKind::PhysInput, 0, i0);
        engine.store_mut().write(VarKind::PhysInput, 1, i1);
        scan(&mut engine);
        assert_eq!(engine.store().read_bool(VarKind::PhysOutput, 0), q0, "inputs {i0} {i1}");
    }
}

#[test]
fn test_series_contacts_make_an_and() {
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::Contact,
        var(VarKind::PhysInput, 0),
        ElementKind::Coil,
        var(VarKind::PhysOutput, 0),
    );
    engine
        .place_element(rung, 1, 0, ElementKind::ContactInverted, var(VarKind::PhysInput, 1))
        .unwrap();
    engine.start().unwrap();

    for (i0, i1, q0) in [(1, 0, true), (1, 1, false), (0, 0, false)] {
        engine.store_mut().write(VarKind::PhysInput, 0, i0);
        engine.store_mut().write(VarKind::PhysInput, 1, i1);
        scan(&mut engine);
        assert_eq!(engine.store().read_bool(VarKind::PhysOutput, 0), q0);
    }
}

#[test]
fn test_rising_contact_fires_once_per_transition() {
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::ContactRising,
        var(VarKind::MemBit, 0),
        ElementKind::Coil,
        var(VarKind::MemBit, 1),
    );
    engine.start().unwrap();

    let mut outputs = Vec::new();
    for input in [0, 1, 1, 1, 0, 1] {
        engine.store_mut().write(VarKind::MemBit, 0, input);
        scan(&mut engine);
        outputs.push(engine.store().read(VarKind::MemBit, 1));
    }
    assert_eq!(outputs, [0, 1, 0, 0, 0, 1]);
}

#[test]
fn test_falling_contact_fires_once_per_transition() {
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::ContactFalling,
        var(VarKind::MemBit, 0),
        ElementKind::Coil,
        var(VarKind::MemBit, 1),
    );
    engine.start().unwrap();

    let mut outputs = Vec::new();
    for input in [1, 1, 0, 0, 1, 0] {
        engine.store_mut().write(VarKind::MemBit, 0, input);
        scan(&mut engine);
        outputs.push(engine.store().read(VarKind::MemBit, 1));
    }
    assert_eq!(outputs, [0, 0, 1, 0, 0, 1]);
}

#[test]
fn test_set_and_reset_coils_latch() {
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::Contact,
        var(VarKind::PhysInput, 0),
        ElementKind::CoilSet,
        var(VarKind::PhysOutput, 0),
    );
    contact_to_coil(
        &mut engine,
        rung,
        1,
        ElementKind::Contact,
        var(VarKind::PhysInput, 1),
        ElementKind::CoilReset,
        var(VarKind::PhysOutput, 0),
    );
    engine.start().unwrap();

    let mut outputs = Vec::new();
    for (start, stop) in [(1, 0), (0, 0), (0, 1), (0, 0), (1, 0)] {
        engine.store_mut().write(VarKind::PhysInput, 0, start);
        engine.store_mut().write(VarKind::PhysInput, 1, stop);
        scan(&mut engine);
        outputs.push(engine.store().read_bool(VarKind::PhysOutput, 0));
    }
    assert_eq!(outputs, [true, true, false, false, true]);
}

#[test]
fn test_indexed_contact_follows_index_word() {
    // %B10[%W0] drives %Q0
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::Contact,
        var(VarKind::MemBit, 10),
        ElementKind::Coil,
        var(VarKind::PhysOutput, 0),
    );
    engine
        .set_index_operand(rung, 0, 0, Some(VarAddr::new(VarKind::MemWord, 0)))
        .unwrap();
    engine.start().unwrap();
    engine.store_mut().write(VarKind::MemBit, 13, 1);

    scan(&mut engine);
    assert!(!engine.store().read_bool(VarKind::PhysOutput, 0));

    engine.store_mut().write(VarKind::MemWord, 0, 3);
    scan(&mut engine);
    assert!(engine.store().read_bool(VarKind::PhysOutput, 0));
}

#[test]
fn test_erased_wire_breaks_the_rung() {
    let (mut engine, _, rung) = engine_with_main();
    contact_to_coil(
        &mut engine,
        rung,
        0,
        ElementKind::Contact,
        var(VarKind::PhysInput, 0),
        ElementKind::Coil,
        var(VarKind::PhysOutput, 0),
    );
    engine.start().unwrap();
    engine.store_mut().write(VarKind::PhysInput, 0, 1);
    scan(&mut engine);
    assert!(engine.store().read_bool(VarKind::PhysOutput, 0));

    engine.erase_element(rung, 4, 0).unwrap();
    scan(&mut engine);
    assert!(!engine.store().read_bool(VarKind::PhysOutput, 0));
    assert_eq!(engine.rung(rung).unwrap().grid.get(4, 0).unwrap().kind, ElementKind::Free);
    assert_eq!(engine.rung(rung).unwrap().grid.get(5, 0).unwrap().operand, Operand::None);
}
