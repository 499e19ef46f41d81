//! Arithmetic expressions for Compare and Operate blocks.
//!
//! Two forms are accepted:
//!
//! - a *compare* condition such as `%W0 > 10 AND %B3 = 1`, evaluated to a
//!   boolean by a Compare block;
//! - an *operate* assignment such as `%W1 := %W0 * 2 + 1`, executed by an
//!   Operate block.
//!
//! Operands are variable addresses (`%B`, `%I`, `%Q`, `%X`, `%W`, `%C0.V`,
//! `%TM1.P`, ...), decimal or `$`-prefixed hex literals, and indexed
//! references like `%W10[%W1]`.
//!
//! ```
//! use ladder_arith::{CompareExpr, OperateExpr};
//! use ladder_common::vars::{MemoryStore, VarKind, VariableStore};
//!
//! let mut store = MemoryStore::default();
//! let op = OperateExpr::parse("%W1 := 6 * 7").unwrap();
//! op.execute(&mut store).unwrap();
//! assert_eq!(store.read(VarKind::MemWord, 1), 42);
//!
//! let cmp = CompareExpr::parse("%W1 = 42").unwrap();
//! assert!(cmp.evaluate(&store).unwrap());
//! ```

#![warn(missing_docs)]

pub mod ast;
mod eval;
mod parser;

use ast::{Assignment, Condition};
use ladder_common::config::TableSizes;
use ladder_common::vars::{VarAddr, VarKind, VariableStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithError {
    /// The text does not match the expression grammar.
    #[error("parse error: {0}")]
    Parse(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A function was called without arguments.
    #[error("function called without arguments")]
    MissingArgument,

    /// The assignment target cannot be written: physical inputs are
    /// read-only and counter/timer variables are owned by their blocks.
    #[error("invalid assignment target: {0}")]
    InvalidTarget(VarAddr),

    /// A referenced variable lies outside the configured tables.
    #[error("variable {addr} out of range (capacity {capacity})")]
    OutOfRange {
        /// Offending address.
        addr: VarAddr,
        /// Table capacity for its kind.
        capacity: usize,
    },
}

/// A parsed Compare condition together with its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompareExpr {
    text: String,
    condition: Condition,
}

impl CompareExpr {
    /// Parse a compare condition.
    pub fn parse(text: &str) -> Result<Self, ArithError> {
        let condition =
            parser::parse_compare(text).map_err(|e| ArithError::Parse(format!("{e:#}")))?;
        Ok(Self { text: text.trim().to_string(), condition })
    }

    /// Source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed condition.
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Evaluate against the current variable values.
    pub fn evaluate<S: VariableStore + ?Sized>(&self, store: &S) -> Result<bool, ArithError> {
        self.condition.eval(store)
    }

    /// Check every referenced variable against the table sizes.
    pub fn validate(&self, sizes: &TableSizes) -> Result<(), ArithError> {
        let mut result = Ok(());
        self.condition.visit_vars(&mut |addr| check_addr(&mut result, addr, sizes));
        result
    }
}

impl TryFrom<String> for CompareExpr {
    type Error = ArithError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<CompareExpr> for String {
    fn from(expr: CompareExpr) -> Self {
        expr.text
    }
}

/// A parsed Operate assignment together with its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperateExpr {
    text: String,
    assignment: Assignment,
}

impl OperateExpr {
    /// Parse an operate assignment.
    pub fn parse(text: &str) -> Result<Self, ArithError> {
        let assignment =
            parser::parse_operate(text).map_err(|e| ArithError::Parse(format!("{e:#}")))?;
        let target = assignment.target.addr;
        if !matches!(
            target.kind,
            VarKind::MemBit | VarKind::MemWord | VarKind::PhysOutput | VarKind::StepActivity
        ) {
            return Err(ArithError::InvalidTarget(target));
        }
        Ok(Self { text: text.trim().to_string(), assignment })
    }

    /// Source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed assignment.
    #[must_use]
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Execute the assignment, returning the value written.
    pub fn execute<S: VariableStore + ?Sized>(&self, store: &mut S) -> Result<i32, ArithError> {
        self.assignment.execute(store)
    }

    /// Check every referenced variable against the table sizes.
    pub fn validate(&self, sizes: &TableSizes) -> Result<(), ArithError> {
        let mut result = Ok(());
        self.assignment.visit_vars(&mut |addr| check_addr(&mut result, addr, sizes));
        result
    }
}

impl TryFrom<String> for OperateExpr {
    type Error = ArithError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<OperateExpr> for String {
    fn from(expr: OperateExpr) -> Self {
        expr.text
    }
}

/// Either kind of expression, as stored in an arithmetic slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithExpr {
    /// Condition for a Compare block.
    Compare(CompareExpr),
    /// Assignment for an Operate block.
    Operate(OperateExpr),
}

impl ArithExpr {
    /// Source text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Compare(c) => c.text(),
            Self::Operate(o) => o.text(),
        }
    }

    /// Check every referenced variable against the table sizes.
    pub fn validate(&self, sizes: &TableSizes) -> Result<(), ArithError> {
        match self {
            Self::Compare(c) => c.validate(sizes),
            Self::Operate(o) => o.validate(sizes),
        }
    }
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

fn check_addr(result: &mut Result<(), ArithError>, addr: VarAddr, sizes: &TableSizes) {
    let capacity = addr.kind.capacity(sizes);
    if result.is_ok() && addr.index >= capacity {
        *result = Err(ArithError::OutOfRange { addr, capacity });
    }
}
