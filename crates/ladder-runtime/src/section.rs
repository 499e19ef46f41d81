//! Sections and the rung/section tables.

use crate::rung::Rung;
use ladder_common::config::TableSizes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language a section is written in. Only ladder sections are scanned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Ladder diagram.
    #[default]
    Ladder,
    /// Sequential function chart; kept in the tables, not executed here.
    Sequential,
}

/// A named chain of rungs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// Slot holds a live section.
    pub used: bool,
    /// Display name.
    pub name: String,
    /// Section language.
    pub language: Language,
    /// `None` for a main program, `Some(n)` for subroutine SRn.
    pub subroutine_id: Option<u32>,
    /// First rung of the chain.
    pub first_rung: usize,
    /// Last rung of the chain.
    pub last_rung: usize,
}

impl Section {
    /// True for a main-program section.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.subroutine_id.is_none()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subroutine_id {
            None => write!(f, "{} (main)", self.name),
            Some(n) => write!(f, "{} (SR{n})", self.name),
        }
    }
}

/// Fixed-capacity rung and section tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Rung table.
    pub rungs: Vec<Rung>,
    /// Section table, in declared (execution) order.
    pub sections: Vec<Section>,
}

impl Program {
    /// Allocate empty tables.
    #[must_use]
    pub fn new(sizes: &TableSizes) -> Self {
        Self {
            rungs: vec![Rung::default(); sizes.rungs],
            sections: vec![Section::default(); sizes.sections],
        }
    }

    /// True if `index` names a used rung.
    #[must_use]
    pub fn rung_used(&self, index: usize) -> bool {
        self.rungs.get(index).is_some_and(|r| r.used)
    }

    /// First unused rung slot.
    #[must_use]
    pub fn free_rung(&self) -> Option<usize> {
        self.rungs.iter().position(|r| !r.used)
    }

    /// First unused section slot.
    #[must_use]
    pub fn free_section(&self) -> Option<usize> {
        self.sections.iter().position(|s| !s.used)
    }

    /// Section executing subroutine `id`.
    #[must_use]
    pub fn find_subroutine(&self, id: u32) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.used && s.subroutine_id == Some(id))
    }

    /// Rung indices of a section, following `next` from first to last.
    ///
    /// Stops early on a broken chain and never yields more rungs than the
    /// table holds.
    #[must_use]
    pub fn chain(&self, section: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let Some(section) = self.sections.get(section).filter(|s| s.used) else {
            return chain;
        };
        let mut current = Some(section.first_rung);
        while let Some(index) = current {
            if !self.rung_used(index) || chain.len() >= self.rungs.len() {
                break;
            }
            chain.push(index);
            if index == section.last_rung {
                break;
            }
            current = self.rungs[index].next;
        }
        chain
    }

    /// Section whose chain contains `rung`.
    #[must_use]
    pub fn section_of(&self, rung: usize) -> Option<usize> {
        (0..self.sections.len()).find(|&s| self.chain(s).contains(&rung))
    }

    /// Clear the dynamic state of every rung.
    pub fn clear_dynamic(&mut self) {
        for rung in &mut self.rungs {
            rung.clear_dynamic();
        }
    }
}
