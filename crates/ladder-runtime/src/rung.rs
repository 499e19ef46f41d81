//! Rungs: one fixed-size grid of elements plus chain links.

use crate::element::{Element, ElementKind};
use static_assertions::const_assert;

/// Columns per rung.
pub const RUNG_WIDTH: usize = 10;
/// Rows per rung.
pub const RUNG_HEIGHT: usize = 6;

// The largest block footprints must fit in the grid.
const_assert!(RUNG_WIDTH >= 3);
const_assert!(RUNG_HEIGHT >= 4);

/// Column holding coils and other output elements.
pub const OUTPUT_COLUMN: usize = RUNG_WIDTH - 1;

/// Element matrix of one rung, addressed as `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    columns: [[Element; RUNG_HEIGHT]; RUNG_WIDTH],
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            columns: [[Element::default(); RUNG_HEIGHT]; RUNG_WIDTH],
        }
    }
}

impl Grid {
    /// Cell at `(x, y)`, `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&Element> {
        self.columns.get(x).and_then(|column| column.get(y))
    }

    /// Mutable cell at `(x, y)`, `None` when out of bounds.
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Element> {
        self.columns.get_mut(x).and_then(|column| column.get_mut(y))
    }

    /// Cell at `(x, y)`; panics when out of bounds, so only use with loop indices.
    pub(crate) fn cell(&self, x: usize, y: usize) -> &Element {
        &self.columns[x][y]
    }

    pub(crate) fn cell_mut(&mut self, x: usize, y: usize) -> &mut Element {
        &mut self.columns[x][y]
    }

    /// Iterate `(x, y, element)` in evaluation order (column-major).
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Element)> {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(x, column)| column.iter().enumerate().map(move |(y, e)| (x, y, e)))
    }

    /// Mutable variant of [`Grid::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut Element)> {
        self.columns.iter_mut().enumerate().flat_map(|(x, column)| {
            column.iter_mut().enumerate().map(move |(y, e)| (x, y, e))
        })
    }

    /// True when `(x, y)` is covered by a block below the block's top row.
    /// A vertical link there would join two inputs of the same block.
    #[must_use]
    pub fn is_inner_block_row(&self, x: usize, y: usize) -> bool {
        let Some(cell) = self.get(x, y) else {
            return false;
        };
        if !cell.kind.is_block() && cell.kind != ElementKind::Unusable {
            return false;
        }
        self.iter()
            .find(|(_, _, e)| e.kind.is_block() && e.operand == cell.operand)
            .map_or(true, |(_, top, _)| y > top)
    }

    /// True if no cell holds an instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, _, e)| e.kind == ElementKind::Free)
    }
}

/// One ladder network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rung {
    /// Slot holds a live rung.
    pub used: bool,
    /// Label, used as a human-readable jump target name.
    pub label: String,
    /// Free text.
    pub comment: String,
    /// Previous rung in the section chain.
    pub prev: Option<usize>,
    /// Next rung in the section chain.
    pub next: Option<usize>,
    /// Elements.
    pub grid: Grid,
}

impl Rung {
    /// A used, empty, unlinked rung.
    #[must_use]
    pub fn new() -> Self {
        Self {
            used: true,
            ..Self::default()
        }
    }

    /// Clear every element's dynamic state.
    pub fn clear_dynamic(&mut self) {
        for (_, _, element) in self.grid.iter_mut() {
            element.clear_dynamic();
        }
    }
}
