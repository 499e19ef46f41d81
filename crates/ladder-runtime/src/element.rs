//! Cells of a rung grid.
//!
//! An [`Element`] is one typed instruction. Its static part (kind, vertical
//! link, operands) is edited and persisted; its dynamic part (`input`,
//! `state`, `output`, `prev_sample`) is recomputed every scan and never
//! persisted.

use ladder_common::vars::{VarAddr, VariableStore};
use serde::{Deserialize, Serialize};

/// Instruction held by a grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Empty cell; conducts nothing.
    #[default]
    Free,
    /// Placeholder cell covered by a multi-cell block.
    Unusable,
    /// Normally open contact.
    Contact,
    /// Normally closed contact.
    ContactInverted,
    /// Contact passing power for one scan on a 0 → 1 transition.
    ContactRising,
    /// Contact passing power for one scan on a 1 → 0 transition.
    ContactFalling,
    /// Plain wire.
    HorizontalLink,
    /// Counter block (live cell).
    Counter,
    /// Timer block (live cell).
    Timer,
    /// Compare block (live cell).
    Compare,
    /// Coil writing its input.
    Coil,
    /// Coil writing its inverted input.
    CoilInverted,
    /// Latch: writes 1 when powered.
    CoilSet,
    /// Unlatch: writes 0 when powered.
    CoilReset,
    /// Jump to another rung when powered.
    CoilJump,
    /// Call a subroutine section when powered.
    CoilCall,
    /// Operate block (live cell).
    Operate,
}

impl ElementKind {
    /// Contact variants.
    #[must_use]
    pub fn is_contact(self) -> bool {
        matches!(
            self,
            Self::Contact | Self::ContactInverted | Self::ContactRising | Self::ContactFalling
        )
    }

    /// Contacts that sample an edge against the cycle snapshot.
    #[must_use]
    pub fn is_edge_contact(self) -> bool {
        matches!(self, Self::ContactRising | Self::ContactFalling)
    }

    /// Coils writing a boolean variable.
    #[must_use]
    pub fn is_coil(self) -> bool {
        matches!(self, Self::Coil | Self::CoilInverted | Self::CoilSet | Self::CoilReset)
    }

    /// Elements that may only sit in the last column.
    #[must_use]
    pub fn is_output(self) -> bool {
        self.is_coil() || matches!(self, Self::CoilJump | Self::CoilCall | Self::Operate)
    }

    /// Multi-cell function blocks.
    #[must_use]
    pub fn is_block(self) -> bool {
        matches!(self, Self::Counter | Self::Timer | Self::Compare | Self::Operate)
    }

    /// Footprint as (width, height); the live cell is the top-right one.
    #[must_use]
    pub fn footprint(self) -> (usize, usize) {
        match self {
            Self::Counter => (2, 4),
            Self::Timer => (2, 2),
            Self::Compare | Self::Operate => (3, 1),
            _ => (1, 1),
        }
    }
}

/// What an element refers to, depending on its kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// No operand (free cells, links).
    #[default]
    None,
    /// Variable Store address (contacts, coils).
    Var(VarAddr),
    /// Counter slot.
    Counter(usize),
    /// Timer slot.
    Timer(usize),
    /// Arithmetic expression slot (compare, operate).
    Arith(usize),
    /// Target rung of a jump.
    Rung(usize),
    /// Subroutine number of a call.
    Subroutine(u32),
}

/// One cell of a rung grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Element {
    /// Instruction.
    pub kind: ElementKind,
    /// Vertical OR-link to the cell directly above.
    pub connected_with_top: bool,
    /// Primary operand.
    pub operand: Operand,
    /// Optional index variable added to the operand's index.
    pub index_operand: Option<VarAddr>,
    /// Power arriving from the left.
    pub input: bool,
    /// Local evaluation before power flow.
    pub state: bool,
    /// Power leaving the cell.
    pub output: bool,
    /// Variable value latched at the end of the previous scan (edge contacts).
    pub prev_sample: bool,
}

impl Element {
    /// A cell with the given kind and operand, neutral dynamic state.
    #[must_use]
    pub fn new(kind: ElementKind, operand: Operand) -> Self {
        Self {
            kind,
            operand,
            ..Self::default()
        }
    }

    /// Effective variable address, applying the index operand.
    ///
    /// `None` for elements whose operand is not a variable.
    pub fn var_addr<S: VariableStore + ?Sized>(&self, store: &S) -> Option<VarAddr> {
        let Operand::Var(addr) = self.operand else {
            return None;
        };
        Some(match self.index_operand {
            None => addr,
            Some(index) => {
                let offset = store.read_addr(index);
                let base = i64::try_from(addr.index).unwrap_or(i64::MAX);
                let effective = base.saturating_add(i64::from(offset)).max(0);
                VarAddr::new(addr.kind, usize::try_from(effective).unwrap_or(usize::MAX))
            }
        })
    }

    /// Clear the dynamic fields.
    pub fn clear_dynamic(&mut self) {
        self.input = false;
        self.state = false;
        self.output = false;
        self.prev_sample = false;
    }

    /// True if the static part differs from an empty cell.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.kind != ElementKind::Free || self.connected_with_top
    }
}
