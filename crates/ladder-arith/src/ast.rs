//! Expression tree of Compare and Operate blocks.

use ladder_common::vars::VarAddr;
use serde::{Deserialize, Serialize};

/// A variable operand, optionally indexed by another variable.
///
/// `%W10[%W1]` reads `%W(10 + value of %W1)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarRef {
    /// Base address.
    pub addr: VarAddr,
    /// Variable whose value is added to the base index.
    pub index: Option<VarAddr>,
}

/// Integer expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal.
    Literal(i32),
    /// Variable read.
    Var(VarRef),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Built-in function call.
    Call {
        /// Function.
        func: Function,
        /// Arguments, at least one.
        args: Vec<Expr>,
    },
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Bitwise not.
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `MOD`
    Mod,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    /// Absolute value of the single argument.
    Abs,
    /// Smallest argument.
    Mini,
    /// Largest argument.
    Maxi,
    /// Integer average of the arguments.
    Moy,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Boolean condition of a Compare block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// `left op right`
    Compare {
        /// Left side.
        left: Expr,
        /// Operator.
        op: CmpOp,
        /// Right side.
        right: Expr,
    },
    /// Both conditions hold.
    And(Box<Condition>, Box<Condition>),
    /// Either condition holds.
    Or(Box<Condition>, Box<Condition>),
}

/// Statement of an Operate block: `target := value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Written variable.
    pub target: VarRef,
    /// Value expression.
    pub value: Expr,
}

impl Expr {
    /// Visit every variable address the expression reads, index variables included.
    pub fn visit_vars(&self, f: &mut impl FnMut(VarAddr)) {
        match self {
            Expr::Literal(_) => {}
            Expr::Var(var) => var.visit_vars(f),
            Expr::Unary { operand, .. } => operand.visit_vars(f),
            Expr::Binary { left, right, .. } => {
                left.visit_vars(f);
                right.visit_vars(f);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.visit_vars(f)),
        }
    }
}

impl VarRef {
    /// Visit the base and index addresses.
    pub fn visit_vars(&self, f: &mut impl FnMut(VarAddr)) {
        f(self.addr);
        if let Some(index) = self.index {
            f(index);
        }
    }
}

impl Condition {
    /// Visit every variable address the condition reads.
    pub fn visit_vars(&self, f: &mut impl FnMut(VarAddr)) {
        match self {
            Condition::Compare { left, right, .. } => {
                left.visit_vars(f);
                right.visit_vars(f);
            }
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.visit_vars(f);
                b.visit_vars(f);
            }
        }
    }
}

impl Assignment {
    /// Visit the target and every variable the value reads.
    pub fn visit_vars(&self, f: &mut impl FnMut(VarAddr)) {
        self.target.visit_vars(f);
        self.value.visit_vars(f);
    }
}
