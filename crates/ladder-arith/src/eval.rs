//! Integer evaluation against a [`VariableStore`].
//!
//! Arithmetic wraps on overflow like the 32-bit words it operates on;
//! only division and modulo by zero are errors.

use crate::ast::{Assignment, BinaryOp, CmpOp, Condition, Expr, Function, UnaryOp, VarRef};
use crate::ArithError;
use ladder_common::vars::{VarAddr, VariableStore};

impl VarRef {
    /// Resolve the effective address, applying the index variable if any.
    pub fn resolve<S: VariableStore + ?Sized>(&self, store: &S) -> VarAddr {
        match self.index {
            None => self.addr,
            Some(index) => {
                let base = i64::try_from(self.addr.index).unwrap_or(i64::MAX);
                let effective = base.saturating_add(i64::from(store.read_addr(index))).max(0);
                VarAddr::new(self.addr.kind, usize::try_from(effective).unwrap_or(usize::MAX))
            }
        }
    }
}

impl Expr {
    /// Evaluate to an integer.
    pub fn eval<S: VariableStore + ?Sized>(&self, store: &S) -> Result<i32, ArithError> {
        match self {
            Expr::Literal(n) => Ok(*n),
            Expr::Var(var) => Ok(store.read_addr(var.resolve(store))),
            Expr::Unary { op, operand } => {
                let v = operand.eval(store)?;
                Ok(match op {
                    UnaryOp::Neg => v.wrapping_neg(),
                    UnaryOp::Not => !v,
                })
            }
            Expr::Binary { left, op, right } => {
                let l = left.eval(store)?;
                let r = right.eval(store)?;
                apply_binary(*op, l, r)
            }
            Expr::Call { func, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(store))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_function(*func, &values)
            }
        }
    }
}

fn apply_binary(op: BinaryOp, l: i32, r: i32) -> Result<i32, ArithError> {
    Ok(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div if r == 0 => return Err(ArithError::DivisionByZero),
        BinaryOp::Div => l.wrapping_div(r),
        BinaryOp::Mod if r == 0 => return Err(ArithError::DivisionByZero),
        BinaryOp::Mod => l.wrapping_rem(r),
        BinaryOp::And => l & r,
        BinaryOp::Or => l | r,
        BinaryOp::Xor => l ^ r,
    })
}

fn apply_function(func: Function, values: &[i32]) -> Result<i32, ArithError> {
    let first = *values.first().ok_or(ArithError::MissingArgument)?;
    Ok(match func {
        Function::Abs => first.wrapping_abs(),
        Function::Mini => values.iter().copied().min().unwrap_or(first),
        Function::Maxi => values.iter().copied().max().unwrap_or(first),
        Function::Moy => {
            let sum: i64 = values.iter().copied().map(i64::from).sum();
            let count = i64::try_from(values.len()).unwrap_or(i64::MAX);
            i32::try_from(sum / count).unwrap_or(first)
        }
    })
}

impl Condition {
    /// Evaluate to a boolean; AND/OR short-circuit.
    pub fn eval<S: VariableStore + ?Sized>(&self, store: &S) -> Result<bool, ArithError> {
        match self {
            Condition::Compare { left, op, right } => {
                let l = left.eval(store)?;
                let r = right.eval(store)?;
                Ok(match op {
                    CmpOp::Eq => l == r,
                    CmpOp::Ne => l != r,
                    CmpOp::Lt => l < r,
                    CmpOp::Le => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::Ge => l >= r,
                })
            }
            Condition::And(a, b) => Ok(a.eval(store)? && b.eval(store)?),
            Condition::Or(a, b) => Ok(a.eval(store)? || b.eval(store)?),
        }
    }
}

impl Assignment {
    /// Evaluate the value and write it to the target; returns the written value.
    pub fn execute<S: VariableStore + ?Sized>(&self, store: &mut S) -> Result<i32, ArithError> {
        let value = self.value.eval(store)?;
        let target = self.target.resolve(store);
        store.write_addr(target, value);
        Ok(value)
    }
}
