//! Ladder logic scan-cycle engine.
//!
//! A program is a set of sections, each a chain of 10×6 rungs. Every scan
//! cycle evaluates the main sections in table order; rungs are evaluated
//! column by column, and jumps and subroutine calls redirect the scan within
//! a per-cycle bound. Counters, timers and Compare/Operate expressions live
//! in fixed-capacity tables owned by the cells that use them.
//!
//! ```
//! use ladder_common::{EngineConfig, VarAddr, VarKind, VariableStore};
//! use ladder_runtime::{ElementKind, Engine, Language, Operand, OUTPUT_COLUMN};
//! use std::time::Duration;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let main = engine.add_section("main", Language::Ladder, None).unwrap();
//! let rung = engine.section_rungs(main)[0];
//!
//! let input = Operand::Var(VarAddr::new(VarKind::PhysInput, 0));
//! engine.place_element(rung, 0, 0, ElementKind::Contact, input).unwrap();
//! for x in 1..OUTPUT_COLUMN {
//!     engine.place_element(rung, x, 0, ElementKind::HorizontalLink, Operand::None).unwrap();
//! }
//! let output = Operand::Var(VarAddr::new(VarKind::PhysOutput, 0));
//! engine.place_element(rung, OUTPUT_COLUMN, 0, ElementKind::Coil, output).unwrap();
//!
//! engine.start().unwrap();
//! engine.store_mut().write(VarKind::PhysInput, 0, 1);
//! engine.refresh_all_sections(Duration::from_millis(10)).unwrap();
//! assert!(engine.store().read_bool(VarKind::PhysOutput, 0));
//! ```

mod editor;
pub mod element;
pub mod engine;
pub mod evaluator;
pub mod faults;
pub mod project;
pub mod registry;
pub mod rung;
pub mod scan_loop;
pub mod scheduler;
pub mod section;

pub use element::{Element, ElementKind, Operand};
pub use engine::{CycleReport, Engine};
pub use evaluator::JumpOrCall;
pub use faults::{FaultEvent, FaultLog};
pub use project::{Project, ProjectError};
pub use registry::{BlockTable, CellRef, Registry};
pub use rung::{Grid, Rung, OUTPUT_COLUMN, RUNG_HEIGHT, RUNG_WIDTH};
pub use scan_loop::{ScanLoop, ScanLoopHandle, SharedEngine};
pub use scheduler::{FaultSeverity, ScanFault, CALL_STACK_DEPTH};
pub use section::{Language, Program, Section};
