//! Project persistence.
//!
//! A [`Project`] holds the structure of an engine and nothing dynamic:
//! rung chains with their non-free cells, sections, block configurations
//! and expression texts. It is stored as JSON. Loading validates every
//! index against the engine's table sizes and re-parses every expression;
//! runtime state always starts neutral.

use crate::element::{Element, ElementKind, Operand};
use crate::engine::Engine;
use crate::registry::{CellRef, Registry};
use crate::rung::{Grid, Rung, RUNG_HEIGHT, RUNG_WIDTH};
use crate::section::{Language, Program, Section};
use ladder_arith::ArithExpr;
use ladder_common::config::EngineConfig;
use ladder_common::error::{LadderError, LadderResult};
use ladder_common::vars::{MemoryStore, VarAddr, VariableStore};
use ladder_stdlib::{Counter, TimeBase, Timer, TimerMode, COUNTER_MAX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Current project format version.
pub const PROJECT_VERSION: u32 = 1;

/// Project persistence errors.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// File I/O error.
    #[error("failed to access project file {path}: {source}")]
    Io {
        /// Path to the project file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding error.
    #[error("malformed project: {0}")]
    Json(#[from] serde_json::Error),

    /// The project does not fit the engine or is inconsistent.
    #[error(transparent)]
    Invalid(#[from] LadderError),
}

/// One persisted grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Element kind.
    pub kind: ElementKind,
    /// Vertical link to the cell above.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub connected_with_top: bool,
    /// Variable, block slot, jump target or subroutine.
    #[serde(default)]
    pub operand: Operand,
    /// Word added to the operand index at scan time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_operand: Option<VarAddr>,
}

/// One persisted rung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RungRecord {
    /// Slot in the rung table.
    pub index: usize,
    /// Rung label.
    #[serde(default)]
    pub label: String,
    /// Free-text comment.
    #[serde(default)]
    pub comment: String,
    /// Previous rung of the chain.
    pub prev: Option<usize>,
    /// Next rung of the chain.
    pub next: Option<usize>,
    /// Non-free cells.
    #[serde(default)]
    pub cells: Vec<CellRecord>,
}

/// One persisted section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    /// Slot in the section table.
    pub index: usize,
    /// Section name.
    pub name: String,
    /// Programming language.
    #[serde(default)]
    pub language: Language,
    /// `None` for a main section.
    pub subroutine_id: Option<u32>,
    /// Head of the rung chain.
    pub first_rung: usize,
    /// Tail of the rung chain.
    pub last_rung: usize,
}

/// Counter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Counter slot.
    pub index: usize,
    /// Preset value.
    pub preset: i32,
}

/// Timer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Timer slot.
    pub index: usize,
    /// Preset in base units.
    pub preset: i32,
    /// Time base.
    pub base: TimeBase,
    /// On-delay, off-delay or pulse.
    pub mode: TimerMode,
}

/// Compare/Operate expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprRecord {
    /// Expression slot.
    pub index: usize,
    /// Expression, stored as its source text.
    pub expr: ArithExpr,
}

/// Persisted structure of a ladder program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Format version, see [`PROJECT_VERSION`].
    pub version: u32,
    /// Used sections.
    #[serde(default)]
    pub sections: Vec<SectionRecord>,
    /// Used rungs.
    #[serde(default)]
    pub rungs: Vec<RungRecord>,
    /// Allocated counters.
    #[serde(default)]
    pub counters: Vec<CounterRecord>,
    /// Allocated timers.
    #[serde(default)]
    pub timers: Vec<TimerRecord>,
    /// Allocated Compare/Operate expressions.
    #[serde(default)]
    pub expressions: Vec<ExprRecord>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            version: PROJECT_VERSION,
            sections: Vec::new(),
            rungs: Vec::new(),
            counters: Vec::new(),
            timers: Vec::new(),
            expressions: Vec::new(),
        }
    }
}

impl Project {
    /// Parse a project from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(content: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a project file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProjectError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Write a project file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<(), ProjectError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| ProjectError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl Engine<MemoryStore> {
    /// Build an engine from a project.
    ///
    /// # Errors
    ///
    /// Fails on an unusable configuration or an invalid project.
    pub fn from_project(config: EngineConfig, project: &Project) -> LadderResult<Self> {
        let mut engine = Self::new(config)?;
        engine.apply_project(project)?;
        Ok(engine)
    }

    /// Load a project file into a new engine.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, parsed or validated.
    pub fn load_project(path: &Path, config: EngineConfig) -> Result<Self, ProjectError> {
        let project = Project::from_file(path)?;
        let engine = Self::from_project(config, &project)?;
        info!(path = %path.display(), "Project loaded");
        Ok(engine)
    }
}

impl<S: VariableStore> Engine<S> {
    /// Snapshot the program structure.
    #[must_use]
    pub fn to_project(&self) -> Project {
        let sections = self
            .program
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.used)
            .map(|(index, s)| SectionRecord {
                index,
                name: s.name.clone(),
                language: s.language,
                subroutine_id: s.subroutine_id,
                first_rung: s.first_rung,
                last_rung: s.last_rung,
            })
            .collect();

        let rungs = self
            .program
            .rungs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.used)
            .map(|(index, r)| RungRecord {
                index,
                label: r.label.clone(),
                comment: r.comment.clone(),
                prev: r.prev,
                next: r.next,
                cells: r
                    .grid
                    .iter()
                    .filter(|(_, _, e)| e.is_persisted())
                    .map(|(x, y, e)| CellRecord {
                        x,
                        y,
                        kind: e.kind,
                        connected_with_top: e.connected_with_top,
                        operand: e.operand,
                        index_operand: e.index_operand,
                    })
                    .collect(),
            })
            .collect();

        let counters = self
            .registry
            .counters
            .iter_owned()
            .map(|(index, c)| CounterRecord { index, preset: c.preset() })
            .collect();
        let timers = self
            .registry
            .timers
            .iter_owned()
            .map(|(index, t)| TimerRecord {
                index,
                preset: t.preset(),
                base: t.base(),
                mode: t.mode(),
            })
            .collect();
        let expressions = self
            .registry
            .exprs
            .iter_owned()
            .filter_map(|(index, e)| e.clone().map(|expr| ExprRecord { index, expr }))
            .collect();

        Project {
            version: PROJECT_VERSION,
            sections,
            rungs,
            counters,
            timers,
            expressions,
        }
    }

    /// Save the program structure to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_project(&self, path: &Path) -> Result<(), ProjectError> {
        let project = self.to_project();
        project.to_file(path)?;
        info!(
            path = %path.display(),
            sections = project.sections.len(),
            rungs = project.rungs.len(),
            "Project saved"
        );
        Ok(())
    }

    /// Replace the program structure with `project` and reset all runtime
    /// state. On error the engine is left untouched.
    ///
    /// # Errors
    ///
    /// Fails if any index is outside the configured tables, a chain or an
    /// ownership is inconsistent, or an expression does not validate.
    pub fn apply_project(&mut self, project: &Project) -> LadderResult<()> {
        if project.version != PROJECT_VERSION {
            return Err(invalid(format!("unsupported project version {}", project.version)));
        }
        let sizes = self.config().sizes.clone();
        let mut program = Program::new(&sizes);
        let mut registry = Registry::new(&sizes);

        let mut counters = vec![false; sizes.counters];
        for rec in &project.counters {
            if !(0..=COUNTER_MAX).contains(&rec.preset) {
                return Err(invalid(format!("counter {} preset {} out of range", rec.index, rec.preset)));
            }
            mark_defined(&mut counters, "counter", rec.index)?;
            if let Some(slot) = registry.counters.get_mut(rec.index) {
                *slot = Counter::new(rec.preset);
            }
        }
        let mut timers = vec![false; sizes.timers];
        for rec in &project.timers {
            if rec.preset < 0 {
                return Err(invalid(format!("timer {} preset {} is negative", rec.index, rec.preset)));
            }
            mark_defined(&mut timers, "timer", rec.index)?;
            if let Some(slot) = registry.timers.get_mut(rec.index) {
                *slot = Timer::new(rec.preset, rec.base, rec.mode);
            }
        }
        let mut exprs = vec![false; sizes.arithm_exprs];
        for rec in &project.expressions {
            mark_defined(&mut exprs, "arithmetic expression", rec.index)?;
            rec.expr
                .validate(&sizes)
                .map_err(|e| invalid(format!("expression {}: {e}", rec.index)))?;
            if let Some(slot) = registry.exprs.get_mut(rec.index) {
                *slot = Some(rec.expr.clone());
            }
        }

        for rec in &project.rungs {
            let rung = program.rungs.get_mut(rec.index).ok_or(LadderError::OutOfRange {
                what: "rung",
                index: rec.index,
                capacity: sizes.rungs,
            })?;
            if rung.used {
                return Err(invalid(format!("rung {} defined twice", rec.index)));
            }
            *rung = Rung {
                label: rec.label.clone(),
                comment: rec.comment.clone(),
                prev: rec.prev,
                next: rec.next,
                ..Rung::new()
            };
            let mut seen = [[false; RUNG_HEIGHT]; RUNG_WIDTH];
            for cell in &rec.cells {
                let element = self.load_cell(rec.index, cell)?;
                if std::mem::replace(&mut seen[cell.x][cell.y], true) {
                    return Err(invalid(format!("rung {} cell ({}, {}) defined twice", rec.index, cell.x, cell.y)));
                }
                if element.kind.is_block() {
                    let owner = CellRef { rung: rec.index, x: cell.x, y: cell.y };
                    match element.operand {
                        Operand::Counter(slot) if defined(&counters, slot) => registry.counters.claim(slot, owner)?,
                        Operand::Timer(slot) if defined(&timers, slot) => registry.timers.claim(slot, owner)?,
                        Operand::Arith(slot) if defined(&exprs, slot) => {
                            check_expr_kind(&registry, slot, element.kind)?;
                            registry.exprs.claim(slot, owner)?;
                        }
                        operand => {
                            return Err(invalid(format!(
                                "rung {} ({}, {}) references undefined {operand:?}",
                                rec.index, cell.x, cell.y
                            )))
                        }
                    }
                }
                if let Some(target) = rung_cell(&mut program, rec.index, cell.x, cell.y) {
                    *target = element;
                }
            }
            check_footprints(rec.index, &program.rungs[rec.index].grid)?;
        }
        check_links(&program)?;

        for rec in &project.sections {
            let section = program.sections.get_mut(rec.index).ok_or(LadderError::OutOfRange {
                what: "section",
                index: rec.index,
                capacity: sizes.sections,
            })?;
            if section.used {
                return Err(invalid(format!("section {} defined twice", rec.index)));
            }
            *section = Section {
                used: true,
                name: rec.name.clone(),
                language: rec.language,
                subroutine_id: rec.subroutine_id,
                first_rung: rec.first_rung,
                last_rung: rec.last_rung,
            };
        }
        check_sections(&program)?;

        self.program = program;
        self.registry = registry;
        self.reset();
        info!(
            sections = project.sections.len(),
            rungs = project.rungs.len(),
            "Project applied"
        );
        Ok(())
    }

    /// Validate one persisted cell and turn it into an element.
    fn load_cell(&self, rung: usize, cell: &CellRecord) -> LadderResult<Element> {
        let (x, y, kind) = (cell.x, cell.y, cell.kind);
        if x >= RUNG_WIDTH || y >= RUNG_HEIGHT {
            return Err(invalid(format!("rung {rung} cell ({x}, {y}) outside the grid")));
        }
        let operand = match kind {
            ElementKind::Free | ElementKind::HorizontalLink => Operand::None,
            ElementKind::Unusable => match cell.operand {
                Operand::Counter(_) | Operand::Timer(_) | Operand::Arith(_) => cell.operand,
                _ => return Err(invalid(format!("rung {rung} ({x}, {y}) covered cell has no block"))),
            },
            k if k.is_block() => {
                let (width, height) = k.footprint();
                if x + 1 < width || y + height > RUNG_HEIGHT {
                    return Err(invalid(format!("rung {rung} {k:?} at ({x}, {y}) does not fit")));
                }
                self.check_column(x, y, k)?;
                match (k, cell.operand) {
                    (ElementKind::Counter, Operand::Counter(_))
                    | (ElementKind::Timer, Operand::Timer(_))
                    | (ElementKind::Compare | ElementKind::Operate, Operand::Arith(_)) => cell.operand,
                    _ => return Err(invalid(format!("rung {rung} {k:?} at ({x}, {y}) has a bad operand"))),
                }
            }
            k => {
                self.check_column(x, y, k)?;
                self.check_operand(x, y, k, cell.operand)?
            }
        };
        if let Some(index) = cell.index_operand {
            if !matches!(operand, Operand::Var(_)) || !index.kind.is_word() {
                return Err(invalid(format!("rung {rung} ({x}, {y}) has a bad index operand {index}")));
            }
            self.check_var(index)?;
        }
        Ok(Element {
            connected_with_top: cell.connected_with_top && y > 0,
            index_operand: cell.index_operand,
            ..Element::new(kind, operand)
        })
    }
}

fn invalid(reason: String) -> LadderError {
    LadderError::Project(reason)
}

fn mark_defined(defined: &mut [bool], what: &'static str, index: usize) -> LadderResult<()> {
    let capacity = defined.len();
    let seen = defined.get_mut(index).ok_or(LadderError::OutOfRange { what, index, capacity })?;
    if *seen {
        return Err(invalid(format!("{what} {index} defined twice")));
    }
    *seen = true;
    Ok(())
}

fn defined(table: &[bool], index: usize) -> bool {
    table.get(index).copied().unwrap_or(false)
}

fn check_expr_kind(registry: &Registry, slot: usize, kind: ElementKind) -> LadderResult<()> {
    match (registry.exprs.get(slot), kind) {
        (Some(Some(ArithExpr::Compare(_))), ElementKind::Compare)
        | (Some(Some(ArithExpr::Operate(_))), ElementKind::Operate) => Ok(()),
        _ => Err(invalid(format!("expression {slot} does not suit a {kind:?} block"))),
    }
}

fn rung_cell(program: &mut Program, rung: usize, x: usize, y: usize) -> Option<&mut Element> {
    program.rungs.get_mut(rung)?.grid.get_mut(x, y)
}

/// Every prev/next link must point at a used rung that links back.
fn check_links(program: &Program) -> LadderResult<()> {
    for (index, rung) in program.rungs.iter().enumerate().filter(|(_, r)| r.used) {
        if let Some(next) = rung.next {
            if !program.rung_used(next) || program.rungs[next].prev != Some(index) {
                return Err(invalid(format!("rung {index} links to {next}, which does not link back")));
            }
        }
        if let Some(prev) = rung.prev {
            if !program.rung_used(prev) || program.rungs[prev].next != Some(index) {
                return Err(invalid(format!("rung {index} links from {prev}, which does not link forward")));
            }
        }
    }
    Ok(())
}

/// Each block's footprint holds its live cell and its own placeholders,
/// with no vertical link below the top row; every placeholder belongs to a
/// block.
fn check_footprints(rung: usize, grid: &Grid) -> LadderResult<()> {
    let mut covered = [[false; RUNG_HEIGHT]; RUNG_WIDTH];
    for (x, y, block) in grid.iter().filter(|(_, _, e)| e.kind.is_block()) {
        let (width, height) = block.kind.footprint();
        for cx in x + 1 - width..=x {
            for cy in y..y + height {
                let cell = grid.get(cx, cy).ok_or_else(|| {
                    invalid(format!("rung {rung} {:?} at ({x}, {y}) does not fit", block.kind))
                })?;
                let expected = if (cx, cy) == (x, y) { block.kind } else { ElementKind::Unusable };
                if cell.kind != expected || cell.operand != block.operand {
                    return Err(invalid(format!(
                        "rung {rung} {:?} at ({x}, {y}) does not cover ({cx}, {cy})",
                        block.kind
                    )));
                }
                if std::mem::replace(&mut covered[cx][cy], true) {
                    return Err(invalid(format!("rung {rung} blocks overlap at ({cx}, {cy})")));
                }
                if cy > y && cell.connected_with_top {
                    return Err(invalid(format!("rung {rung} vertical link inside a block at ({cx}, {cy})")));
                }
            }
        }
    }
    match grid
        .iter()
        .find(|&(x, y, e)| e.kind == ElementKind::Unusable && !covered[x][y])
    {
        Some((x, y, _)) => Err(invalid(format!("rung {rung} ({x}, {y}) is covered by no block"))),
        None => Ok(()),
    }
}

/// Chains must run from first to last rung, every used rung must sit in
/// exactly one chain, and subroutine ids be unique.
fn check_sections(program: &Program) -> LadderResult<()> {
    let mut ids = Vec::new();
    let mut member: Vec<Option<usize>> = vec![None; program.rungs.len()];
    for (index, section) in program.sections.iter().enumerate().filter(|(_, s)| s.used) {
        let chain = program.chain(index);
        if chain.first() != Some(&section.first_rung) || chain.last() != Some(&section.last_rung) {
            return Err(invalid(format!(
                "section {index} chain does not run from rung {} to rung {}",
                section.first_rung, section.last_rung
            )));
        }
        for &rung in &chain {
            if let Some(other) = member[rung].replace(index) {
                return Err(invalid(format!("rung {rung} is in sections {other} and {index}")));
            }
        }
        if let Some(id) = section.subroutine_id {
            if ids.contains(&id) {
                return Err(invalid(format!("subroutine SR{id} defined twice")));
            }
            ids.push(id);
        }
    }
    match program
        .rungs
        .iter()
        .enumerate()
        .find(|&(rung, r)| r.used && member[rung].is_none())
    {
        Some((rung, _)) => Err(invalid(format!("rung {rung} belongs to no section"))),
        None => Ok(()),
    }
}
